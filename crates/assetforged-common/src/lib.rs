//! Assetforged-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across assetforged:
//!
//! - **Typed IDs**: `AttachmentId`, a type-safe UUID wrapper
//! - **Core Types**: the `Attachment` record shared by originals and variants
//! - **Error Handling**: the error taxonomy and result alias
//!
//! # Examples
//!
//! ```
//! use assetforged_common::{Attachment, AttachmentId, Error, Result};
//!
//! let source = Attachment::new(None, "photo.jpg", "Holiday", "image/jpeg");
//! let variant = Attachment::new(Some(source.id), "thumbnail", &source.title, &source.mime_type);
//! assert!(variant.is_variant_of(&source));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("attachment"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
