//! Newsletter endpoints
//!
//! - `POST /api/newsletter/subscribe` (public, rate limited)
//! - `POST /api/newsletter/unsubscribe` (public) - by token from the
//!   campaign footer link
//! - `GET /api/newsletter/subscribers?status=&page=&limit=` (admin)
//! - `DELETE /api/newsletter/subscribers/:id` (admin)
//!
//! Subscribing an email that is already active answers 409 and writes
//! nothing. An email that unsubscribed earlier is reactivated.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::{MessageResponse, Page, Pagination},
};
use axum::{extract::State, http::StatusCode, Json};
use folio_shared::models::subscriber::{
    NewsletterSubscriber, SubscribeInput, SubscribeOutcome, SubscriberStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const ALREADY_SUBSCRIBED: &str = "This email is already subscribed";

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub message: String,
    pub reactivated: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UnsubscribeRequest {
    #[validate(length(min = 1, message = "Unsubscribe token is required"))]
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriberQuery {
    pub status: Option<SubscriberStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Subscriber page plus totals per status
#[derive(Debug, Serialize)]
pub struct SubscriberList {
    #[serde(flatten)]
    pub page: Page<NewsletterSubscriber>,
    pub active: i64,
    pub unsubscribed: i64,
}

/// # Errors
///
/// - `409 Conflict`: the email is already subscribed
/// - `422 Unprocessable Entity`: invalid email
pub async fn subscribe(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<SubscribeInput>,
) -> ApiResult<(StatusCode, Json<SubscribeResponse>)> {
    input.validate()?;

    match NewsletterSubscriber::subscribe(&state.db, &input).await? {
        SubscribeOutcome::Created(subscriber) => {
            tracing::info!(subscriber_id = %subscriber.id, source = %subscriber.source, "Newsletter subscription");
            Ok((
                StatusCode::CREATED,
                Json(SubscribeResponse {
                    message: "Subscribed successfully".to_string(),
                    reactivated: false,
                }),
            ))
        }
        SubscribeOutcome::Reactivated(subscriber) => {
            tracing::info!(subscriber_id = %subscriber.id, "Newsletter subscription reactivated");
            Ok((
                StatusCode::OK,
                Json(SubscribeResponse {
                    message: "Welcome back! You are subscribed again".to_string(),
                    reactivated: true,
                }),
            ))
        }
        SubscribeOutcome::AlreadySubscribed => {
            Err(ApiError::Conflict(ALREADY_SUBSCRIBED.to_string()))
        }
    }
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UnsubscribeRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    let subscriber = NewsletterSubscriber::unsubscribe(&state.db, &req.token)
        .await?
        .ok_or_else(|| ApiError::NotFound("Invalid or expired unsubscribe link".to_string()))?;

    tracing::info!(subscriber_id = %subscriber.id, "Newsletter unsubscribe");
    Ok(Json(MessageResponse::new("You have been unsubscribed")))
}

pub async fn list_subscribers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SubscriberQuery>,
) -> ApiResult<Json<SubscriberList>> {
    let pagination = Pagination {
        page: query.page,
        limit: query.limit,
    };

    let subscribers = NewsletterSubscriber::list(
        &state.db,
        query.status,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    let total = NewsletterSubscriber::count(&state.db, query.status).await?;
    let active = NewsletterSubscriber::count(&state.db, Some(SubscriberStatus::Active)).await?;
    let unsubscribed =
        NewsletterSubscriber::count(&state.db, Some(SubscriberStatus::Unsubscribed)).await?;

    Ok(Json(SubscriberList {
        page: Page::new(subscribers, total, &pagination),
        active,
        unsubscribed,
    }))
}

pub async fn delete_subscriber(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !NewsletterSubscriber::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Subscriber"));
    }

    Ok(Json(MessageResponse::new("Subscriber deleted")))
}
