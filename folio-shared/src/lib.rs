//! # Folio Shared Library
//!
//! This crate contains the data model, storage operations and supporting
//! services used by the Folio API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their CRUD operations
//! - `auth`: Admin authentication (password hashing, JWT, request context)
//! - `db`: Connection pool and migrations
//! - `analytics`: Visitor tracking helpers and funnel arithmetic
//! - `mail`: Mail transports, notifications and campaign rendering/delivery
//! - `storage`: Upload storage on the local filesystem
//! - `slug`: URL slug generation for blog posts
//! - `redis`: Redis client used for rate limiting

pub mod analytics;
pub mod auth;
pub mod db;
pub mod mail;
pub mod models;
pub mod redis;
pub mod slug;
pub mod storage;

/// Current version of the Folio shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
