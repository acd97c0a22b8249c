//! Application state and router builder
//!
//! ```no_run
//! use folio_api::{app::{build_router, AppState}, config::Config};
//! use folio_shared::mail::LogMailer;
//! use sqlx::PgPool;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let pool = PgPool::connect(&config.database.url).await?;
//! let state = AppState::new(pool, config, Arc::new(LogMailer));
//! let app = build_router(state);
//! # Ok(())
//! # }
//! ```

use crate::{
    config::Config,
    middleware::{
        auth::require_admin,
        rate_limit::{client_ip, limit_auth, limit_forms, limit_tracking, RateLimiter},
        security::SecurityHeadersLayer,
    },
    routes,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post, put},
    Router,
};
use folio_shared::{mail::campaign::CampaignLinks, mail::Mailer, storage::LocalStorage};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Room for multipart framing on top of the upload size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// JSON bodies larger than this are rejected
const JSON_BODY_LIMIT: usize = 1024 * 1024;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; everything
/// inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Outgoing mail transport
    pub mailer: Arc<dyn Mailer>,

    /// Upload storage
    pub storage: Arc<LocalStorage>,

    pub rate_limiter: Arc<RateLimiter>,

    /// Background work (campaign delivery) that shutdown waits for
    pub tasks: TaskTracker,
}

impl AppState {
    /// State with in-memory rate limiting
    pub fn new(db: PgPool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let storage = LocalStorage::new(
            config.uploads.dir.clone(),
            "/uploads",
            config.uploads.max_bytes,
        );

        Self {
            db,
            config: Arc::new(config),
            mailer,
            storage: Arc::new(storage),
            rate_limiter: Arc::new(RateLimiter::in_memory()),
            tasks: TaskTracker::new(),
        }
    }

    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = Arc::new(rate_limiter);
        self
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Client address per the `TRUST_PROXY` setting
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        client_ip(headers, peer, self.config.api.trust_proxy)
    }

    /// Base URLs for campaign tracking and unsubscribe links
    pub fn campaign_links(&self) -> CampaignLinks {
        CampaignLinks::new(&self.config.api.public_url, &self.config.api.site_url)
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /health                          public
/// /uploads/*                       public, static files
/// /api/...                         public reads, tracking endpoints
/// /api/consultations|contact|newsletter  public submissions (rate limited)
/// /api/analytics/track|click       tracking beacons (rate limited)
/// /api/admin/login|refresh         sign-in (rate limited)
/// /api/admin/*, writes             bearer token required
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, compression, timeout, tracing.
/// Authentication and rate limiting are applied per route group.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/projects", get(routes::projects::list_projects))
        .route("/api/projects/featured", get(routes::projects::featured_projects))
        .route("/api/projects/:id", get(routes::projects::get_project))
        .route("/api/blogs", get(routes::blogs::list_published))
        .route("/api/blogs/categories", get(routes::blogs::list_categories))
        .route("/api/blogs/:id", get(routes::blogs::get_by_slug))
        .route("/api/testimonials", get(routes::testimonials::list_active))
        .route("/api/skills", get(routes::skills::list_skills))
        .route("/api/newsletter/unsubscribe", post(routes::newsletter::unsubscribe))
        .route("/api/campaigns/:id/open", get(routes::campaigns::track_open))
        .route("/api/campaigns/:id/click", get(routes::campaigns::track_click));

    let auth_routes = Router::new()
        .route("/api/admin/login", post(routes::auth::login))
        .route("/api/admin/refresh", post(routes::auth::refresh))
        .route_layer(from_fn_with_state(state.clone(), limit_auth));

    let form_routes = Router::new()
        .route("/api/consultations", post(routes::consultations::submit))
        .route("/api/contact", post(routes::contact::submit))
        .route("/api/newsletter/subscribe", post(routes::newsletter::subscribe))
        .route_layer(from_fn_with_state(state.clone(), limit_forms));

    let tracking_routes = Router::new()
        .route("/api/analytics/track", post(routes::analytics::track_pageview))
        .route(
            "/api/analytics/track/:id/duration",
            post(routes::analytics::record_duration),
        )
        .route("/api/analytics/click", post(routes::analytics::track_click))
        .route_layer(from_fn_with_state(state.clone(), limit_tracking));

    let upload_limit = state.storage.max_bytes() + MULTIPART_OVERHEAD;

    let admin_routes = Router::new()
        // Account
        .route("/api/admin/me", get(routes::auth::me))
        .route("/api/admin/password", put(routes::auth::change_password))
        .route("/api/admin/dashboard", get(routes::dashboard::dashboard))
        // Projects
        .route("/api/projects", post(routes::projects::create_project))
        .route(
            "/api/projects/:id",
            put(routes::projects::update_project).delete(routes::projects::delete_project),
        )
        // Blogs
        .route("/api/admin/blogs", get(routes::blogs::list_all))
        .route("/api/admin/blogs/:id", get(routes::blogs::get_by_id))
        .route("/api/blogs", post(routes::blogs::create_post))
        .route(
            "/api/blogs/:id",
            put(routes::blogs::update_post).delete(routes::blogs::delete_post),
        )
        // Testimonials
        .route("/api/admin/testimonials", get(routes::testimonials::list_all))
        .route(
            "/api/admin/testimonials/:id",
            get(routes::testimonials::get_testimonial),
        )
        .route("/api/testimonials", post(routes::testimonials::create_testimonial))
        .route(
            "/api/testimonials/:id",
            put(routes::testimonials::update_testimonial)
                .delete(routes::testimonials::delete_testimonial),
        )
        // Skills
        .route("/api/skills", post(routes::skills::create_skill))
        .route(
            "/api/skills/:id",
            put(routes::skills::update_skill).delete(routes::skills::delete_skill),
        )
        // Consultations
        .route("/api/consultations", get(routes::consultations::list))
        .route(
            "/api/consultations/:id",
            get(routes::consultations::get_consultation).delete(routes::consultations::delete_consultation),
        )
        .route(
            "/api/consultations/:id/status",
            patch(routes::consultations::update_status),
        )
        // Contact messages
        .route("/api/contact", get(routes::contact::list))
        .route("/api/contact/:id/read", patch(routes::contact::mark_read))
        .route("/api/contact/:id", delete(routes::contact::delete_message))
        // Newsletter
        .route(
            "/api/newsletter/subscribers",
            get(routes::newsletter::list_subscribers),
        )
        .route(
            "/api/newsletter/subscribers/:id",
            delete(routes::newsletter::delete_subscriber),
        )
        // Campaigns
        .route(
            "/api/campaigns",
            get(routes::campaigns::list).post(routes::campaigns::create),
        )
        .route(
            "/api/campaigns/:id",
            get(routes::campaigns::get)
                .put(routes::campaigns::update)
                .delete(routes::campaigns::delete),
        )
        .route("/api/campaigns/:id/send", post(routes::campaigns::send))
        .route("/api/campaigns/:id/test", post(routes::campaigns::send_test))
        // Analytics
        .route("/api/analytics/summary", get(routes::analytics::summary))
        // Uploads
        .route(
            "/api/upload",
            post(routes::upload::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let cors = cors_layer(&state.config);
    let timeout = Duration::from_secs(state.config.api.request_timeout_secs);
    let production = state.config.api.production;
    let uploads = ServeDir::new(state.storage.root());

    Router::new()
        .merge(public_routes)
        .merge(auth_routes)
        .merge(form_routes)
        .merge(tracking_routes)
        .merge(admin_routes)
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::new(timeout))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

/// Permissive CORS for `*`, otherwise the configured origin list
fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
