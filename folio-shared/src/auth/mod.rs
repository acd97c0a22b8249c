//! Admin authentication
//!
//! # Modules
//!
//! - [`password`]: Argon2id password hashing and strength rules
//! - [`jwt`]: Access/refresh token issue and validation
//! - [`middleware`]: Bearer-token extraction and the request auth context

pub mod jwt;
pub mod middleware;
pub mod password;
