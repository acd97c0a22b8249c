//! Bearer token guard for admin routes
//!
//! Validates the `Authorization: Bearer <access token>` header and stores the
//! resulting [`AuthContext`] in the request extensions, where handlers read it
//! with `Extension<AuthContext>`.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use folio_shared::auth::middleware::authenticate;

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(request.headers(), state.jwt_secret()).map_err(|e| {
        tracing::debug!(error = %e, path = %request.uri().path(), "Rejected admin request");
        ApiError::from(e)
    })?;

    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}
