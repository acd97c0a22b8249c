//! Admin authentication endpoints
//!
//! - `POST /api/admin/login` - exchange email/password for tokens
//! - `POST /api/admin/refresh` - exchange a refresh token for an access token
//! - `GET /api/admin/me` - current admin profile
//! - `PUT /api/admin/password` - change the current admin's password

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
    routes::MessageResponse,
};
use axum::{extract::State, Extension, Json};
use folio_shared::{
    auth::{jwt, middleware::AuthContext, password},
    models::admin_user::AdminUser,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Login request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,

    pub token_type: &'static str,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    pub admin: AdminUser,
}

/// Refresh token request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    pub new_password: String,
}

/// Authenticates an admin and returns JWT tokens
///
/// # Errors
///
/// - `422 Unprocessable Entity`: malformed email or empty password
/// - `401 Unauthorized`: unknown email or wrong password
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate()?;

    let admin = AdminUser::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| {
            tracing::info!(email = %req.email, "Login attempt for unknown admin");
            ApiError::Unauthorized(INVALID_CREDENTIALS.to_string())
        })?;

    if !password::verify_password(&req.password, &admin.password_hash)? {
        tracing::info!(admin_id = %admin.id, "Login attempt with wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    AdminUser::update_last_login(&state.db, admin.id).await?;

    let access_claims = jwt::Claims::new(admin.id, &admin.email, jwt::TokenType::Access);
    let refresh_claims = jwt::Claims::new(admin.id, &admin.email, jwt::TokenType::Refresh);

    let access_token = jwt::create_token(&access_claims, state.jwt_secret())?;
    let refresh_token = jwt::create_token(&refresh_claims, state.jwt_secret())?;

    tracing::info!(admin_id = %admin.id, "Admin logged in");

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: access_claims.expires_in_seconds(),
        admin,
    }))
}

/// Exchanges a refresh token for a new access token
///
/// # Errors
///
/// - `401 Unauthorized`: invalid or expired refresh token, or an access
///   token sent in its place
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    req.validate()?;

    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}

/// Current admin profile
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<AdminUser>> {
    let admin = AdminUser::find_by_id(&state.db, auth.admin_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Admin account no longer exists".to_string()))?;

    Ok(Json(admin))
}

/// Changes the current admin's password
///
/// # Errors
///
/// - `401 Unauthorized`: current password is wrong
/// - `422 Unprocessable Entity`: new password fails the strength rules
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    password::validate_password_strength(&req.new_password)
        .map_err(|message| ApiError::invalid_field("new_password", message))?;

    let admin = AdminUser::find_by_id(&state.db, auth.admin_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Admin account no longer exists".to_string()))?;

    if !password::verify_password(&req.current_password, &admin.password_hash)? {
        return Err(ApiError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    let hash = password::hash_password(&req.new_password)?;
    AdminUser::update_password(&state.db, admin.id, &hash).await?;

    tracing::info!(admin_id = %admin.id, "Admin password changed");

    Ok(Json(MessageResponse::new("Password updated")))
}
