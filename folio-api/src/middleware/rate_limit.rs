//! Rate limiting for the public write endpoints
//!
//! Form submissions (consultations, contact, newsletter), analytics
//! tracking and admin sign-in are open to anonymous visitors, so they are
//! limited per client IP with a token bucket.
//!
//! # Limits
//!
//! - **Forms**: 10 requests/minute, burst of 5
//! - **Tracking**: 120 requests/minute, burst of 60
//! - **Auth**: 5 requests/minute, burst of 5 (login and token refresh)
//!
//! # Client address
//!
//! The bucket key is the socket peer address. `X-Forwarded-For` is only
//! read when `TRUST_PROXY` is set, and then only its right-most entry, which
//! is the hop appended by the proxy itself. Entries to the left of it are
//! whatever the client sent.
//!
//! # Storage
//!
//! With Redis configured, buckets live in Redis under
//! `ratelimit:{scope}:{ip}` (TTL 2 minutes) and are updated atomically by a
//! Lua script, so limits hold across API instances. Without Redis, or when a
//! Redis call fails, buckets are kept in process memory.
//!
//! # Headers
//!
//! - `X-RateLimit-Limit`: requests allowed per minute
//! - `X-RateLimit-Remaining`: tokens left after this request
//! - `Retry-After`: seconds to wait (429 responses only)

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use folio_shared::redis::RedisClient;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Buckets idle this long are full again and can be forgotten
const BUCKET_TTL_SECS: u64 = 120;

/// Hard cap on in-memory buckets
const MAX_LOCAL_BUCKETS: usize = 10_000;

/// Size the local map is cut back to once the cap is hit
const LOCAL_BUCKETS_AFTER_EVICTION: usize = MAX_LOCAL_BUCKETS * 3 / 4;

/// Token bucket parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Maximum requests per minute
    pub requests_per_minute: u32,

    /// Token refill rate (tokens per second)
    pub refill_rate: f64,

    /// Maximum tokens in bucket (burst capacity)
    pub bucket_capacity: u32,
}

/// Endpoint group sharing one bucket per client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateScope {
    Forms,
    Tracking,
    Auth,
}

impl RateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateScope::Forms => "forms",
            RateScope::Tracking => "tracking",
            RateScope::Auth => "auth",
        }
    }

    pub fn limit(&self) -> RateLimit {
        match self {
            RateScope::Forms => RateLimit {
                requests_per_minute: 10,
                refill_rate: 10.0 / 60.0,
                bucket_capacity: 5,
            },
            RateScope::Tracking => RateLimit {
                requests_per_minute: 120,
                refill_rate: 2.0,
                bucket_capacity: 60,
            },
            RateScope::Auth => RateLimit {
                requests_per_minute: 5,
                refill_rate: 5.0 / 60.0,
                bucket_capacity: 5,
            },
        }
    }
}

/// Token bucket state
#[derive(Debug, Clone)]
struct TokenBucket {
    /// Current number of tokens
    tokens: f64,

    /// Last refill timestamp (Unix seconds)
    last_refill: f64,
}

impl TokenBucket {
    /// Creates a full bucket
    fn new(capacity: u32, now: f64) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    /// Refills tokens based on elapsed time
    fn refill(&mut self, rate: f64, capacity: u32, now: f64) {
        let elapsed = (now - self.last_refill).max(0.0);
        self.tokens = (self.tokens + elapsed * rate).min(capacity as f64);
        self.last_refill = now;
    }

    /// Attempts to consume N tokens
    fn try_consume(&mut self, count: f64) -> bool {
        if self.tokens >= count {
            self.tokens -= count;
            true
        } else {
            false
        }
    }

    /// Seconds until N tokens are available
    fn seconds_until_available(&self, count: f64, rate: f64) -> u64 {
        let deficit = count - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub ok: bool,

    /// Tokens remaining
    pub remaining: u32,

    /// Seconds until a token is available (0 when allowed)
    pub retry_after: u64,
}

/// Atomic token bucket update; returns {allowed, remaining, retry_after}
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + (elapsed * refill_rate))

if tokens >= 1 then
    tokens = tokens - 1
    redis.call('HSET', key, 'tokens', tostring(tokens), 'last_refill', tostring(now))
    redis.call('EXPIRE', key, ttl)
    return {1, math.floor(tokens), 0}
else
    redis.call('HSET', key, 'tokens', tostring(tokens), 'last_refill', tostring(now))
    redis.call('EXPIRE', key, ttl)
    return {0, 0, math.ceil((1 - tokens) / refill_rate)}
end
"#;

/// Per-client token buckets, in Redis when available
pub struct RateLimiter {
    redis: Option<RedisClient>,
    script: redis::Script,
    local: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    /// Limiter keeping buckets in process memory
    pub fn in_memory() -> Self {
        Self {
            redis: None,
            script: redis::Script::new(TOKEN_BUCKET_SCRIPT),
            local: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter backed by Redis, falling back to memory on Redis errors
    pub fn with_redis(client: RedisClient) -> Self {
        Self {
            redis: Some(client),
            ..Self::in_memory()
        }
    }

    pub fn is_distributed(&self) -> bool {
        self.redis.is_some()
    }

    /// Consumes one token from the client's bucket for `scope`
    pub async fn check(&self, scope: RateScope, client: &str) -> RateLimitResult {
        let key = format!("ratelimit:{}:{}", scope.as_str(), client);
        let limit = scope.limit();
        let now = unix_now();

        if let Some(redis) = &self.redis {
            let args = [
                limit.bucket_capacity.to_string(),
                limit.refill_rate.to_string(),
                format!("{:.3}", now),
                BUCKET_TTL_SECS.to_string(),
            ];

            match redis.eval::<Vec<i64>>(&self.script, &[key.as_str()], &args).await {
                Ok(reply) if reply.len() == 3 => {
                    return RateLimitResult {
                        ok: reply[0] == 1,
                        remaining: reply[1].max(0) as u32,
                        retry_after: reply[2].max(0) as u64,
                    };
                }
                Ok(reply) => {
                    tracing::warn!(?reply, "Unexpected rate limit script reply");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Redis rate limit check failed, using local buckets");
                }
            }
        }

        self.check_local(&key, limit, now)
    }

    fn check_local(&self, key: &str, limit: RateLimit, now: f64) -> RateLimitResult {
        // A poisoned lock only means another request panicked mid-update
        let mut buckets = match self.local.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if buckets.len() >= MAX_LOCAL_BUCKETS && !buckets.contains_key(key) {
            evict_buckets(&mut buckets, now);
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(limit.bucket_capacity, now));
        bucket.refill(limit.refill_rate, limit.bucket_capacity, now);

        if bucket.try_consume(1.0) {
            RateLimitResult {
                ok: true,
                remaining: bucket.tokens.floor() as u32,
                retry_after: 0,
            }
        } else {
            RateLimitResult {
                ok: false,
                remaining: 0,
                retry_after: bucket.seconds_until_available(1.0, limit.refill_rate).max(1),
            }
        }
    }
}

/// Drops idle buckets, then the least recently used ones, until the map is
/// back to `LOCAL_BUCKETS_AFTER_EVICTION` entries
fn evict_buckets(buckets: &mut HashMap<String, TokenBucket>, now: f64) {
    buckets.retain(|_, b| now - b.last_refill < BUCKET_TTL_SECS as f64);

    let excess = buckets.len().saturating_sub(LOCAL_BUCKETS_AFTER_EVICTION);
    if excess == 0 {
        return;
    }

    let mut ages: Vec<f64> = buckets.values().map(|b| b.last_refill).collect();
    let (_, cutoff, _) = ages.select_nth_unstable_by(excess - 1, |a, b| a.total_cmp(b));
    let cutoff = *cutoff;

    let mut to_remove = excess;
    buckets.retain(|_, b| {
        if to_remove > 0 && b.last_refill <= cutoff {
            to_remove -= 1;
            false
        } else {
            true
        }
    });
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Right-most `X-Forwarded-For` entry across all header lines
fn last_forwarded_hop(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .last()
        .and_then(|hop| hop.parse().ok())
}

/// Client address used for rate limiting and visitor hashing
///
/// The socket peer, unless `trust_proxy` is set and the proxy recorded a
/// valid address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let forwarded = if trust_proxy {
        last_forwarded_hop(headers)
    } else {
        None
    };

    forwarded
        .or_else(|| peer.map(|addr| addr.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn enforce(
    state: &AppState,
    scope: RateScope,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let ip = state.client_ip(request.headers(), peer);

    let result = state.rate_limiter.check(scope, &ip).await;
    if !result.ok {
        tracing::warn!(ip = %ip, scope = scope.as_str(), "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: result.retry_after,
            message: format!(
                "Too many requests. Try again in {} seconds",
                result.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-ratelimit-limit",
        HeaderValue::from(scope.limit().requests_per_minute),
    );
    headers.insert("x-ratelimit-remaining", HeaderValue::from(result.remaining));

    Ok(response)
}

/// Middleware for public form submissions
pub async fn limit_forms(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, RateScope::Forms, request, next).await
}

/// Middleware for analytics tracking beacons
pub async fn limit_tracking(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, RateScope::Tracking, request, next).await
}

/// Middleware for admin login and token refresh
pub async fn limit_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(&state, RateScope::Auth, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_limits() {
        let forms = RateScope::Forms.limit();
        assert_eq!(forms.requests_per_minute, 10);
        assert_eq!(forms.bucket_capacity, 5);
        assert!((forms.refill_rate - 0.1667).abs() < 0.001);

        let tracking = RateScope::Tracking.limit();
        assert_eq!(tracking.requests_per_minute, 120);
        assert_eq!(tracking.refill_rate, 2.0);

        let auth = RateScope::Auth.limit();
        assert_eq!(auth.requests_per_minute, 5);
        assert_eq!(auth.bucket_capacity, 5);
    }

    #[test]
    fn test_token_bucket_consume() {
        let mut bucket = TokenBucket::new(10, 0.0);
        assert!(bucket.try_consume(1.0));
        assert_eq!(bucket.tokens, 9.0);
        assert!(bucket.try_consume(5.0));
        assert_eq!(bucket.tokens, 4.0);
        assert!(!bucket.try_consume(10.0));
        assert_eq!(bucket.tokens, 4.0); // Unchanged after failed attempt
    }

    #[test]
    fn test_token_bucket_refill_capped() {
        let mut bucket = TokenBucket {
            tokens: 5.0,
            last_refill: 100.0,
        };
        bucket.refill(1.0, 100, 110.0);
        assert_eq!(bucket.tokens, 15.0);

        bucket.refill(1.0, 20, 200.0);
        assert_eq!(bucket.tokens, 20.0);
        assert_eq!(bucket.last_refill, 200.0);
    }

    #[test]
    fn test_token_bucket_seconds_until_available() {
        let bucket = TokenBucket {
            tokens: 2.0,
            last_refill: 0.0,
        };

        // Need 5 tokens, have 2, rate is 1/sec -> need 3 seconds
        assert_eq!(bucket.seconds_until_available(5.0, 1.0), 3);
        assert_eq!(bucket.seconds_until_available(1.0, 1.0), 0);
    }

    #[test]
    fn test_local_limiter_blocks_after_burst() {
        let limiter = RateLimiter::in_memory();
        let limit = RateScope::Forms.limit();

        for i in 0..limit.bucket_capacity {
            let result = limiter.check_local("ratelimit:forms:1.2.3.4", limit, 1000.0);
            assert!(result.ok);
            assert_eq!(result.remaining, limit.bucket_capacity - i - 1);
        }

        let blocked = limiter.check_local("ratelimit:forms:1.2.3.4", limit, 1000.0);
        assert!(!blocked.ok);
        assert_eq!(blocked.retry_after, 6);

        // Other clients have their own bucket
        assert!(limiter.check_local("ratelimit:forms:5.6.7.8", limit, 1000.0).ok);

        // One token is back after the refill interval
        assert!(limiter.check_local("ratelimit:forms:1.2.3.4", limit, 1007.0).ok);
    }

    #[tokio::test]
    async fn test_check_without_redis() {
        let limiter = RateLimiter::in_memory();
        assert!(!limiter.is_distributed());
        assert!(limiter.check(RateScope::Tracking, "10.0.0.1").await.ok);
    }

    #[test]
    fn test_client_ip_uses_peer_by_default() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "192.168.1.5:4000".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer), false), "192.168.1.5");
        assert_eq!(client_ip(&headers, None, false), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_ip(&headers, Some(peer), false), "192.168.1.5");
    }

    #[test]
    fn test_client_ip_behind_proxy_takes_last_hop() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.2:4000".parse().unwrap();

        // The client controls everything left of the proxy's own entry
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.1.1.1, 2.2.2.2, 198.51.100.20"),
        );
        assert_eq!(client_ip(&headers, Some(peer), true), "198.51.100.20");

        headers.append("x-forwarded-for", HeaderValue::from_static("198.51.100.21"));
        assert_eq!(client_ip(&headers, Some(peer), true), "198.51.100.21");

        headers.insert("x-forwarded-for", HeaderValue::from_static("not-an-ip"));
        assert_eq!(client_ip(&headers, Some(peer), true), "10.0.0.2");

        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), "10.0.0.2");
    }

    #[test]
    fn test_local_buckets_are_capped() {
        let limiter = RateLimiter::in_memory();
        let limit = RateScope::Forms.limit();

        // Every bucket is recent, so none is idle enough to expire
        for i in 0..MAX_LOCAL_BUCKETS + 10 {
            let key = format!("ratelimit:forms:client-{}", i);
            assert!(limiter.check_local(&key, limit, 1000.0 + i as f64 * 0.001).ok);
        }

        let buckets = limiter.local.lock().unwrap();
        assert!(buckets.len() <= MAX_LOCAL_BUCKETS);
        assert!(buckets.len() > LOCAL_BUCKETS_AFTER_EVICTION);

        // Oldest entries go first
        assert!(!buckets.contains_key("ratelimit:forms:client-0"));
        let newest = format!("ratelimit:forms:client-{}", MAX_LOCAL_BUCKETS + 9);
        assert!(buckets.contains_key(&newest));
    }
}
