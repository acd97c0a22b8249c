//! Configuration management for the API server
//!
//! Configuration comes from environment variables (a `.env` file is loaded
//! in development) and is parsed into a typed [`Config`] once at startup.
//!
//! # Environment Variables
//!
//! | Variable | Default |
//! |---|---|
//! | `API_HOST` / `API_PORT` | `0.0.0.0` / `8080` |
//! | `CORS_ORIGINS` | `*` (comma-separated list) |
//! | `PRODUCTION` | `false` |
//! | `PUBLIC_URL` | `http://localhost:8080` |
//! | `SITE_URL` | `http://localhost:3000` |
//! | `REQUEST_TIMEOUT_SECS` | `30` |
//! | `TRUST_PROXY` | `false` (use `X-Forwarded-For` for client addresses) |
//! | `DATABASE_URL` | required |
//! | `DATABASE_MAX_CONNECTIONS` | `10` |
//! | `JWT_SECRET` | required, at least 32 characters |
//! | `ADMIN_EMAIL` / `ADMIN_PASSWORD` / `ADMIN_NAME` | unset |
//! | `SMTP_HOST` / `SMTP_PORT` / `SMTP_USERNAME` / `SMTP_PASSWORD` | unset / `587` |
//! | `MAIL_FROM` | `Folio <no-reply@localhost>` |
//! | `NOTIFY_EMAIL` | unset |
//! | `UPLOAD_DIR` | `./uploads` |
//! | `UPLOAD_MAX_BYTES` | `5242880` |
//! | `REDIS_URL` | unset |
//!
//! ```no_run
//! use folio_api::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Server will listen on {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::str::FromStr;

use anyhow::Context;
use folio_shared::mail::smtp::SmtpSettings;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// Admin account created on first start when no admin exists
    pub admin: Option<AdminBootstrap>,

    pub mail: MailConfig,
    pub uploads: UploadConfig,

    /// Enables Redis-backed rate limiting
    pub redis_url: Option<String>,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Enables HSTS
    pub production: bool,

    /// Public base URL of this API, used in tracking links
    pub public_url: String,

    /// Base URL of the website, used for unsubscribe links
    pub site_url: String,

    pub request_timeout_secs: u64,

    /// Behind a reverse proxy that appends to `X-Forwarded-For`
    pub trust_proxy: bool,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HS256 signing secret
    ///
    /// IMPORTANT: at least 32 characters. Generate with `openssl rand -hex 32`.
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// None logs messages instead of sending them
    pub smtp: Option<SmtpSettings>,

    pub from: String,

    /// Recipient of form submission notifications
    pub notify_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: String,
    pub max_bytes: usize,
}

pub const MIN_JWT_SECRET_LEN: usize = 32;
const DEFAULT_MAIL_FROM: &str = "Folio <no-reply@localhost>";
const DEFAULT_UPLOAD_MAX_BYTES: usize = 5 * 1024 * 1024;

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url =
            get("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LEN
            );
        }

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password,
                name: get("ADMIN_NAME"),
            }),
            _ => None,
        };

        let from = get("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string());
        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpSettings {
                host,
                port: parse_or(&get, "SMTP_PORT", 587)?,
                username: get("SMTP_USERNAME"),
                password: get("SMTP_PASSWORD"),
                from: from.clone(),
            }),
            None => None,
        };

        Ok(Self {
            api: ApiConfig {
                host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&get, "API_PORT", 8080)?,
                cors_origins,
                production: parse_or(&get, "PRODUCTION", false)?,
                public_url: base_url(get("PUBLIC_URL"), "http://localhost:8080"),
                site_url: base_url(get("SITE_URL"), "http://localhost:3000"),
                request_timeout_secs: parse_or(&get, "REQUEST_TIMEOUT_SECS", 30)?,
                trust_proxy: parse_or(&get, "TRUST_PROXY", false)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig { secret: jwt_secret },
            admin,
            mail: MailConfig {
                smtp,
                from,
                notify_email: get("NOTIFY_EMAIL"),
            },
            uploads: UploadConfig {
                dir: get("UPLOAD_DIR").unwrap_or_else(|| "./uploads".to_string()),
                max_bytes: parse_or(&get, "UPLOAD_MAX_BYTES", DEFAULT_UPLOAD_MAX_BYTES)?,
            },
            redis_url: get("REDIS_URL"),
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// True when any origin may call the API
    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}

fn base_url(value: Option<String>, default: &str) -> String {
    value
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}
