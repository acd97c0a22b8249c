//! Health check endpoint
//!
//! ```text
//! GET /health
//! ```
//!
//! ```json
//! { "status": "healthy", "version": "0.1.0", "database": "connected", "mail": "smtp" }
//! ```
//!
//! Always answers 200 so load balancers can tell a running but degraded
//! server from a dead one; `status` is `degraded` when the database is down.

use crate::app::AppState;
use axum::{extract::State, Json};
use folio_shared::db::pool::health_check as database_health;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on the database health check
const DATABASE_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,

    /// `smtp` when mail is delivered, `log` when it is only logged
    pub mail: String,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = matches!(
        tokio::time::timeout(DATABASE_CHECK_TIMEOUT, database_health(&state.db)).await,
        Ok(Ok(()))
    );

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: folio_shared::VERSION.to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
        mail: if state.mailer.is_enabled() { "smtp" } else { "log" }.to_string(),
    })
}
