//! Database query operations.

pub mod attachments;
