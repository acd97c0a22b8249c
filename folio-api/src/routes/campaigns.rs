//! Newsletter campaign endpoints
//!
//! Admin:
//! - `GET|POST /api/campaigns`, `GET|PUT|DELETE /api/campaigns/:id`
//! - `POST /api/campaigns/:id/send` - deliver to every active subscriber
//! - `POST /api/campaigns/:id/test` - send a preview to one address
//!
//! Public (embedded in delivered mail):
//! - `GET /api/campaigns/:id/open` - 1×1 GIF, counts an open
//! - `GET /api/campaigns/:id/click?url=` - counts a click, 302 to `url`
//!
//! # Send pipeline
//!
//! `send` claims the draft with a conditional `draft → sending` update, so of
//! two concurrent sends exactly one wins and the other gets 409. Delivery
//! then runs in a background task and the handler answers 202. The task
//! delivers in batches and stores the running counts after each one; when it
//! finishes the campaign becomes `sent`. Shutdown waits for these tasks, and a
//! send whose task died anyway is closed out by [`recover_stalled_sends`].

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::MessageResponse,
};
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use folio_shared::{
    mail::{
        campaign::{deliver, render_test, CampaignLinks, DeliveryReport},
        Mailer,
    },
    models::{
        campaign::{Campaign, CampaignInput},
        subscriber::NewsletterSubscriber,
    },
};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;
use validator::Validate;

/// Recipients delivered between two progress updates
const DELIVERY_BATCH_SIZE: usize = 50;

/// A send with no recorded progress for this long is considered dead
pub const STALLED_SEND_AFTER: Duration = Duration::from_secs(15 * 60);

/// Transparent 1×1 GIF
const TRACKING_PIXEL: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3B,
];

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct TestSendRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClickQuery {
    pub url: Option<String>,
}

/// Parses a click-through target; only absolute http(s) URLs are allowed
pub fn redirect_target(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Some(url),
        _ => None,
    }
}

fn conflict_not_draft(campaign: &Campaign) -> ApiError {
    ApiError::Conflict(format!(
        "Campaign is {} and can no longer be changed",
        campaign.status.as_str()
    ))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<Campaign>>> {
    Ok(Json(Campaign::list(&state.db).await?))
}

pub async fn get(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Campaign>> {
    let campaign = Campaign::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign"))?;

    Ok(Json(campaign))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CampaignInput>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    input.validate()?;

    let campaign = Campaign::create(&state.db, &input).await?;
    tracing::info!(campaign_id = %campaign.id, "Campaign draft created");

    Ok((StatusCode::CREATED, Json(campaign)))
}

/// # Errors
///
/// - `409 Conflict`: the campaign is no longer a draft
pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CampaignInput>,
) -> ApiResult<Json<Campaign>> {
    input.validate()?;

    if let Some(updated) = Campaign::update_draft(&state.db, id, &input).await? {
        return Ok(Json(updated));
    }

    match Campaign::find_by_id(&state.db, id).await? {
        Some(campaign) => Err(conflict_not_draft(&campaign)),
        None => Err(ApiError::not_found("Campaign")),
    }
}

pub async fn delete(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if Campaign::delete(&state.db, id).await? {
        return Ok(Json(MessageResponse::new("Campaign deleted")));
    }

    match Campaign::find_by_id(&state.db, id).await? {
        Some(_) => Err(ApiError::Conflict(
            "Campaign is being sent and cannot be deleted".to_string(),
        )),
        None => Err(ApiError::not_found("Campaign")),
    }
}

/// Starts delivery to all active subscribers
///
/// # Errors
///
/// - `400 Bad Request`: there are no active subscribers
/// - `409 Conflict`: the campaign is not a draft, or another send won the race
pub async fn send(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let campaign = Campaign::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign"))?;

    if !campaign.status.is_editable() {
        return Err(conflict_not_draft(&campaign));
    }

    let recipients = NewsletterSubscriber::list_active(&state.db).await?;
    if recipients.is_empty() {
        return Err(ApiError::BadRequest(
            "There are no active subscribers to send to".to_string(),
        ));
    }

    let recipient_count = i32::try_from(recipients.len()).unwrap_or(i32::MAX);
    let claimed = Campaign::begin_sending(&state.db, id, recipient_count)
        .await?
        .ok_or_else(|| ApiError::Conflict("Campaign is already being sent".to_string()))?;

    tracing::info!(campaign_id = %id, recipients = recipient_count, "Campaign send started");

    state.tasks.spawn(run_delivery(
        state.db.clone(),
        state.mailer.clone(),
        state.campaign_links(),
        claimed.clone(),
        recipients,
    ));

    Ok((StatusCode::ACCEPTED, Json(claimed)))
}

/// Background half of `send`
async fn run_delivery(
    db: PgPool,
    mailer: Arc<dyn Mailer>,
    links: CampaignLinks,
    campaign: Campaign,
    recipients: Vec<NewsletterSubscriber>,
) {
    let mut report = DeliveryReport::default();

    for batch in recipients.chunks(DELIVERY_BATCH_SIZE) {
        report += deliver(mailer.as_ref(), &campaign, batch, &links).await;

        if let Err(e) = Campaign::record_progress(&db, campaign.id, report.sent, report.failed).await {
            tracing::warn!(campaign_id = %campaign.id, error = %e, "Failed to record campaign progress");
        }
    }

    match Campaign::finish_sending(&db, campaign.id, report.sent, report.failed).await {
        Ok(Some(_)) => tracing::info!(
            campaign_id = %campaign.id,
            sent = report.sent,
            failed = report.failed,
            "Campaign delivered"
        ),
        Ok(None) => {
            tracing::warn!(campaign_id = %campaign.id, "Campaign left the sending state during delivery")
        }
        Err(e) => {
            tracing::error!(campaign_id = %campaign.id, error = %e, "Failed to record campaign results")
        }
    }
}

/// Marks sends that stopped making progress as `sent`
///
/// Runs at startup and then periodically from the binary.
pub async fn recover_stalled_sends(db: &PgPool) -> Result<usize, sqlx::Error> {
    let recovered = Campaign::recover_stalled(db, STALLED_SEND_AFTER).await?;

    for campaign in &recovered {
        tracing::warn!(
            campaign_id = %campaign.id,
            sent = campaign.sent_count,
            failed = campaign.failed_count,
            recipients = campaign.recipient_count,
            "Closed out stalled campaign send"
        );
    }

    Ok(recovered.len())
}

/// Sends a preview to one address without touching the campaign status
pub async fn send_test(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<TestSendRequest>,
) -> ApiResult<Json<MessageResponse>> {
    req.validate()?;

    let campaign = Campaign::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign"))?;

    let mail = render_test(&campaign, req.email.trim(), &state.campaign_links());
    state.mailer.send(&mail).await?;

    tracing::info!(campaign_id = %id, "Campaign test sent");
    Ok(Json(MessageResponse::new(format!(
        "Test email sent to {}",
        req.email.trim()
    ))))
}

/// Open tracking pixel; always returns the image
pub async fn track_open(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> Response {
    match Campaign::record_open(&state.db, id).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!(campaign_id = %id, "Open for unknown campaign"),
        Err(e) => tracing::warn!(campaign_id = %id, error = %e, "Failed to record campaign open"),
    }

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/gif")),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-store, no-cache, must-revalidate"),
            ),
        ],
        TRACKING_PIXEL,
    )
        .into_response()
}

/// Click tracker; counts the click and redirects to the original link
///
/// # Errors
///
/// - `400 Bad Request`: `url` is missing or not an absolute http(s) URL
pub async fn track_click(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<ClickQuery>,
) -> ApiResult<Response> {
    let target = query
        .url
        .as_deref()
        .and_then(redirect_target)
        .ok_or_else(|| ApiError::BadRequest("A valid http(s) url is required".to_string()))?;

    let location = HeaderValue::from_str(target.as_str())
        .map_err(|_| ApiError::BadRequest("Redirect target is not a valid header value".to_string()))?;

    if let Err(e) = Campaign::record_click(&state.db, id).await {
        tracing::warn!(campaign_id = %id, error = %e, "Failed to record campaign click");
    }

    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_target_accepts_http() {
        assert_eq!(
            redirect_target("https://example.com/pricing?plan=pro").unwrap().as_str(),
            "https://example.com/pricing?plan=pro"
        );
        assert!(redirect_target(" http://example.com ").is_some());
    }

    #[test]
    fn test_redirect_target_rejects_other_schemes() {
        assert!(redirect_target("javascript:alert(1)").is_none());
        assert!(redirect_target("mailto:owner@example.com").is_none());
        assert!(redirect_target("/relative/path").is_none());
        assert!(redirect_target("ftp://example.com/file").is_none());
        assert!(redirect_target("").is_none());
    }

    #[test]
    fn test_tracking_pixel_is_gif() {
        assert!(TRACKING_PIXEL.starts_with(b"GIF89a"));
        assert_eq!(*TRACKING_PIXEL.last().unwrap(), 0x3B);
    }
}
