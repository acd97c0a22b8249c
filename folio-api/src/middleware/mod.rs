//! Middleware for the API server
//!
//! - `auth`: bearer token guard for admin routes
//! - `rate_limit`: per-IP token buckets for public submissions
//! - `security`: security response headers

pub mod auth;
pub mod rate_limit;
pub mod security;
