//! # Folio API Server
//!
//! Serves the portfolio REST API. Configured entirely through environment
//! variables (see `config`).
//!
//! ```bash
//! cargo run -p folio-api
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use folio_api::{
    app::{build_router, AppState},
    config::{AdminBootstrap, Config},
    middleware::rate_limit::RateLimiter,
    routes::campaigns::recover_stalled_sends,
};
use folio_shared::{
    auth::password::{hash_password, validate_password_strength},
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    mail::{smtp::SmtpMailer, LogMailer, Mailer},
    models::admin_user::{AdminUser, CreateAdminUser},
    redis::{RedisClient, RedisConfig},
};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "folio_api=debug,folio_shared=info,tower_http=info";

/// How often stalled campaign sends are looked for
const STALLED_SEND_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for in-flight campaign deliveries
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Creates the configured admin when the database has none
async fn bootstrap_admin(pool: &PgPool, admin: &AdminBootstrap) -> anyhow::Result<()> {
    if AdminUser::count(pool).await? > 0 {
        tracing::debug!("Admin account exists, skipping bootstrap");
        return Ok(());
    }

    validate_password_strength(&admin.password)
        .map_err(|reason| anyhow::anyhow!("ADMIN_PASSWORD is too weak: {}", reason))?;

    let created = AdminUser::create(
        pool,
        CreateAdminUser {
            email: admin.email.clone(),
            password_hash: hash_password(&admin.password)?,
            name: admin.name.clone(),
        },
    )
    .await?;

    tracing::info!(admin_id = %created.id, email = %created.email, "Bootstrap admin created");
    Ok(())
}

fn build_mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    match &config.mail.smtp {
        Some(settings) => {
            let mailer = SmtpMailer::new(settings).context("Invalid SMTP configuration")?;
            tracing::info!(host = %settings.host, port = settings.port, "SMTP mail enabled");
            Ok(Arc::new(mailer))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, outgoing mail will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

/// Redis-backed limiter when Redis is configured and reachable
async fn build_rate_limiter(config: &Config) -> RateLimiter {
    let Some(url) = &config.redis_url else {
        return RateLimiter::in_memory();
    };

    let client = match RedisClient::connect(RedisConfig::new(url.clone())).await {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, rate limiting per instance");
            return RateLimiter::in_memory();
        }
    };

    match client.ping().await {
        Ok(true) => RateLimiter::with_redis(client),
        Ok(false) => {
            tracing::warn!("Redis answered PING unexpectedly, rate limiting per instance");
            RateLimiter::in_memory()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis PING failed, rate limiting per instance");
            RateLimiter::in_memory()
        }
    }
}

/// Periodically closes out campaign sends whose delivery task died
async fn sweep_stalled_sends(pool: PgPool, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(STALLED_SEND_SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = recover_stalled_sends(&pool).await {
                    tracing::warn!(error = %e, "Stalled campaign sweep failed");
                }
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Folio API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await
    .context("Failed to connect to the database")?;

    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    if let Some(admin) = &config.admin {
        bootstrap_admin(&pool, admin).await?;
    }

    let mailer = build_mailer(&config)?;
    let rate_limiter = build_rate_limiter(&config).await;
    tracing::info!(
        distributed = rate_limiter.is_distributed(),
        trust_proxy = config.api.trust_proxy,
        "Rate limiting configured"
    );
    let bind_address = config.bind_address();

    let state = AppState::new(pool.clone(), config, mailer).with_rate_limiter(rate_limiter);
    state
        .storage
        .ensure_root()
        .await
        .context("Failed to create upload directory")?;

    let tasks = state.tasks.clone();
    let cancel = CancellationToken::new();
    tasks.spawn(sweep_stalled_sends(pool.clone(), cancel.clone()));

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    cancel.cancel();
    tasks.close();
    if tokio::time::timeout(SHUTDOWN_GRACE, tasks.wait()).await.is_err() {
        tracing::warn!(
            pending = tasks.len(),
            "Background tasks still running at shutdown; interrupted sends are closed out by a later sweep"
        );
    }

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
