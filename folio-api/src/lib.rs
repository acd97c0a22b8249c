//! # Folio API Server Library
//!
//! REST API behind the portfolio site and its admin dashboard.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration from environment variables
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Extractors using the API error envelope
//! - `middleware`: Auth guard, rate limiting, security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
