//! Redis integration
//!
//! Redis is optional. When configured, the API keeps its rate-limit buckets
//! there so limits hold across several API instances.

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
