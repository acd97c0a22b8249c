//! Visitor analytics endpoints
//!
//! Tracking (public, rate limited, fire-and-forget from the browser):
//! - `POST /api/analytics/track` - page view; returns the event id
//! - `POST /api/analytics/track/:id/duration` - time on page for that view
//! - `POST /api/analytics/click` - labelled interaction (FAQ, CTA, ...)
//!
//! Admin:
//! - `GET /api/analytics/summary?days=N` - totals, top pages, referrers and
//!   clicks, daily page views over the last N days (1..=365, default 30)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::MessageResponse,
};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use folio_shared::{
    analytics::{clamp_duration, clamp_window_days, fill_daily_series, referrer_domain, visitor_hash, Window},
    models::analytics_event::{
        AnalyticsEvent, DailyCount, EventTotals, EventType, LabelCount, NewEvent, PathCount,
    },
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;
use validator::Validate;

/// Rows in each top-N list of the summary
const TOP_LIMIT: i64 = 10;

const MAX_USER_AGENT_LEN: usize = 500;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct TrackRequest {
    /// Page title or name; defaults to the path
    #[validate(length(max = 200))]
    pub page: Option<String>,

    #[validate(length(min = 1, max = 500, message = "Path is required"))]
    pub path: String,

    #[validate(length(max = 100))]
    pub session_id: Option<String>,

    /// `document.referrer`; falls back to the Referer header
    pub referrer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DurationRequest {
    pub seconds: i64,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ClickRequest {
    #[validate(length(min = 1, max = 200, message = "Label is required"))]
    pub label: String,

    #[validate(length(max = 200))]
    pub page: Option<String>,

    #[validate(length(max = 500))]
    pub path: Option<String>,

    #[validate(length(max = 100))]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrackResponse {
    pub id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub days: i64,
    pub since: DateTime<Utc>,
    pub totals: EventTotals,
    pub top_pages: Vec<PathCount>,
    pub top_referrers: Vec<LabelCount>,
    pub top_clicks: Vec<LabelCount>,

    /// One entry per day, zero-filled
    pub daily_pageviews: Vec<DailyCount>,
}

/// Request details shared by the tracking endpoints
struct Visitor {
    session_id: String,
    user_agent: Option<String>,
}

impl Visitor {
    fn from_request(headers: &HeaderMap, client_ip: &str, session_id: Option<&str>) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(|ua| ua.chars().take(MAX_USER_AGENT_LEN).collect::<String>());

        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| visitor_hash(client_ip, user_agent.as_deref().unwrap_or("")));

        Self {
            session_id,
            user_agent,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Records a page view
pub async fn track_pageview(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<TrackRequest>,
) -> ApiResult<(StatusCode, Json<TrackResponse>)> {
    req.validate()?;

    let ip = state.client_ip(&headers, connect_info.map(|c| c.0));
    let visitor = Visitor::from_request(&headers, &ip, req.session_id.as_deref());

    let referrer = non_blank(req.referrer.as_deref())
        .or_else(|| headers.get(header::REFERER).and_then(|v| v.to_str().ok()))
        .and_then(referrer_domain);

    let path = req.path.trim().to_string();
    let page = non_blank(req.page.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| path.clone());

    let event = AnalyticsEvent::record(
        &state.db,
        NewEvent {
            event_type: EventType::Pageview,
            page,
            path,
            session_id: visitor.session_id,
            referrer,
            user_agent: visitor.user_agent,
            label: None,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(TrackResponse { id: event.id })))
}

/// Stores time on page for an earlier page view, clamped to one day
pub async fn record_duration(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<DurationRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let seconds = clamp_duration(req.seconds);

    if !AnalyticsEvent::set_duration(&state.db, id, seconds).await? {
        return Err(ApiError::not_found("Page view"));
    }

    Ok(Json(MessageResponse::new("Duration recorded")))
}

/// Records a labelled click
pub async fn track_click(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<ClickRequest>,
) -> ApiResult<(StatusCode, Json<TrackResponse>)> {
    req.validate()?;

    let ip = state.client_ip(&headers, connect_info.map(|c| c.0));
    let visitor = Visitor::from_request(&headers, &ip, req.session_id.as_deref());

    let path = non_blank(req.path.as_deref()).unwrap_or("/").to_string();
    let page = non_blank(req.page.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| path.clone());

    let event = AnalyticsEvent::record(
        &state.db,
        NewEvent {
            event_type: EventType::Click,
            page,
            path,
            session_id: visitor.session_id,
            referrer: None,
            user_agent: visitor.user_agent,
            label: Some(req.label.trim().to_string()),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(TrackResponse { id: event.id })))
}

pub async fn summary(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> ApiResult<Json<AnalyticsSummary>> {
    let days = clamp_window_days(query.days);
    let window = Window::last_days(days, Utc::now());
    let since = window.since();

    let totals = AnalyticsEvent::totals(&state.db, since).await?;
    let top_pages = AnalyticsEvent::top_paths(&state.db, since, TOP_LIMIT).await?;
    let top_referrers = AnalyticsEvent::top_referrers(&state.db, since, TOP_LIMIT).await?;
    let top_clicks = AnalyticsEvent::top_clicks(&state.db, since, TOP_LIMIT).await?;
    let daily = AnalyticsEvent::daily_pageviews(&state.db, since).await?;

    Ok(Json(AnalyticsSummary {
        days,
        since,
        totals,
        top_pages,
        top_referrers,
        top_clicks,
        daily_pageviews: fill_daily_series(&daily, &window),
    }))
}
