//! Assetforged-DB: Attachment registry schema, migrations, and queries
//!
//! This crate provides the persistent attachment registry for assetforged
//! using SQLite with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use assetforged_common::Attachment;
//! use assetforged_db::pool::{init_pool, get_conn};
//! use assetforged_db::queries::attachments;
//!
//! let pool = init_pool("/var/lib/assetforged/assetforged.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let att = Attachment::new(None, "photo.jpg", "Holiday", "image/jpeg");
//! attachments::insert_attachment(&conn, &att).unwrap();
//! ```

pub mod migrations;
pub mod pool;
pub mod queries;
