//! Assetforged - derived-asset cache
//!
//! Generates variants of stored attachments through transformation
//! profiles, invalidates them lazily when their source changes, and serves
//! attachments with content-hash validators.

pub mod auth;
pub mod blob;
pub mod config;
pub mod delivery;
pub mod mime;
pub mod profiles;
pub mod registry;
pub mod server;
pub mod transform;
pub mod variants;

#[cfg(test)]
mod test_support;
