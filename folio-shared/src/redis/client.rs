//! Redis client wrapper with reconnection and health checks
//!
//! Wraps `redis::aio::ConnectionManager`, which reconnects on its own after
//! a dropped connection. Cloning a [`RedisClient`] is cheap and shares the
//! underlying connection.
//!
//! ```no_run
//! use folio_shared::redis::{RedisClient, RedisConfig};
//!
//! # async fn example() -> Result<(), folio_shared::redis::RedisClientError> {
//! let client = RedisClient::connect(RedisConfig::new("redis://localhost:6379")).await?;
//! assert!(client.ping().await?);
//! # Ok(())
//! # }
//! ```

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    #[error("Redis command error: {0}")]
    CommandError(String),

    #[error("Redis configuration error: {0}")]
    ConfigError(String),

    #[error("Redis command timed out after {0}s")]
    Timeout(u64),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            RedisClientError::ConnectionError(err.to_string())
        } else {
            RedisClientError::CommandError(err.to_string())
        }
    }
}

/// Redis connection settings
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// `redis://[username:password@]host:port[/db]`
    pub url: String,

    /// Limit for establishing the initial connection
    pub connect_timeout_secs: u64,

    /// Limit for a single command
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout_secs: 5,
            command_timeout_secs: 2,
        }
    }
}

#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Opens the connection manager
    ///
    /// # Errors
    ///
    /// Fails on an invalid URL, or if Redis is unreachable within
    /// `connect_timeout_secs`.
    pub async fn connect(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e)))?;

        let manager = tokio::time::timeout(
            Duration::from_secs(config.connect_timeout_secs),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| RedisClientError::Timeout(config.connect_timeout_secs))??;

        info!(url = %sanitize_url(&config.url), "Connected to Redis");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// Sends PING; true when Redis answers PONG
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.connection();

        let pong: String = self
            .with_timeout(redis::cmd("PING").query_async(&mut conn))
            .await?;

        if pong == "PONG" {
            debug!("Redis health check: PONG received");
            Ok(true)
        } else {
            warn!(response = %pong, "Redis health check: unexpected response");
            Ok(false)
        }
    }

    /// Runs a Lua script with the configured command timeout
    pub async fn eval<T: redis::FromRedisValue>(
        &self,
        script: &redis::Script,
        keys: &[&str],
        args: &[String],
    ) -> Result<T, RedisClientError> {
        let mut conn = self.connection();
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(arg.as_str());
        }

        self.with_timeout(invocation.invoke_async(&mut conn)).await
    }

    /// A handle to the shared connection
    fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    async fn with_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, RedisError>>,
    ) -> Result<T, RedisClientError> {
        let secs = self.config.command_timeout_secs;
        tokio::time::timeout(Duration::from_secs(secs), fut)
            .await
            .map_err(|_| RedisClientError::Timeout(secs))?
            .map_err(RedisClientError::from)
    }
}

/// Masks credentials in a Redis URL for logging
pub fn sanitize_url(url: &str) -> String {
    if let (Some(scheme_end), Some(at_pos)) = (url.find("://"), url.rfind('@')) {
        if at_pos > scheme_end {
            return format!("{}***@{}", &url[..scheme_end + 3], &url[at_pos + 1..]);
        }
    }
    url.to_string()
}
