//! Visitor analytics events and aggregate queries
//!
//! Page views are recorded when a page loads; time on page is filled in
//! later by a second request carrying the event id. Click events carry a
//! label naming the element (FAQ question, call-to-action, ...).
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE analytics_event_type AS ENUM ('pageview', 'click');
//!
//! CREATE TABLE analytics_events (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     event_type analytics_event_type NOT NULL DEFAULT 'pageview',
//!     page TEXT NOT NULL,
//!     path TEXT NOT NULL,
//!     session_id TEXT NOT NULL,
//!     referrer TEXT,                     -- referring domain
//!     user_agent TEXT,
//!     label TEXT,
//!     time_on_page INTEGER,              -- seconds
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "analytics_event_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Pageview,
    Click,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalyticsEvent {
    pub id: Uuid,
    pub event_type: EventType,

    /// Page title or name
    pub page: String,

    pub path: String,
    pub session_id: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub label: Option<String>,

    /// Seconds spent on the page, reported after the fact
    pub time_on_page: Option<i32>,

    pub created_at: DateTime<Utc>,
}

/// Event ready for insertion
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: EventType,
    pub page: String,
    pub path: String,
    pub session_id: String,
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub label: Option<String>,
}

/// Headline numbers over a time window
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct EventTotals {
    pub pageviews: i64,
    pub unique_sessions: i64,
    pub clicks: i64,

    /// Mean time on page in seconds (None when nothing was reported)
    pub avg_time_on_page: Option<f64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PathCount {
    pub path: String,
    pub page: String,
    pub views: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub count: i64,
}

impl AnalyticsEvent {
    pub async fn record(pool: &PgPool, event: NewEvent) -> Result<Self, sqlx::Error> {
        let recorded = sqlx::query_as::<_, AnalyticsEvent>(
            r#"
            INSERT INTO analytics_events (event_type, page, path, session_id, referrer,
                                          user_agent, label)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, event_type, page, path, session_id, referrer, user_agent, label,
                      time_on_page, created_at
            "#,
        )
        .bind(event.event_type)
        .bind(event.page)
        .bind(event.path)
        .bind(event.session_id)
        .bind(event.referrer)
        .bind(event.user_agent)
        .bind(event.label)
        .fetch_one(pool)
        .await?;

        Ok(recorded)
    }

    /// Sets time on page for a page view. Returns false if no such page view exists.
    pub async fn set_duration(pool: &PgPool, id: Uuid, seconds: i32) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE analytics_events SET time_on_page = $2 WHERE id = $1 AND event_type = 'pageview'",
        )
        .bind(id)
        .bind(seconds)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn totals(pool: &PgPool, since: DateTime<Utc>) -> Result<EventTotals, sqlx::Error> {
        let totals = sqlx::query_as::<_, EventTotals>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE event_type = 'pageview') AS pageviews,
                COUNT(DISTINCT session_id) FILTER (WHERE event_type = 'pageview') AS unique_sessions,
                COUNT(*) FILTER (WHERE event_type = 'click') AS clicks,
                AVG(time_on_page)::FLOAT8 AS avg_time_on_page
            FROM analytics_events
            WHERE created_at >= $1
            "#,
        )
        .bind(since)
        .fetch_one(pool)
        .await?;

        Ok(totals)
    }

    /// Most viewed paths
    pub async fn top_paths(
        pool: &PgPool,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PathCount>, sqlx::Error> {
        let paths = sqlx::query_as::<_, PathCount>(
            r#"
            SELECT path, MAX(page) AS page, COUNT(*) AS views
            FROM analytics_events
            WHERE event_type = 'pageview' AND created_at >= $1
            GROUP BY path
            ORDER BY views DESC, path
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(paths)
    }

    /// Most common referring domains
    pub async fn top_referrers(
        pool: &PgPool,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LabelCount>, sqlx::Error> {
        let referrers = sqlx::query_as::<_, LabelCount>(
            r#"
            SELECT referrer AS label, COUNT(*) AS count
            FROM analytics_events
            WHERE event_type = 'pageview' AND created_at >= $1
              AND referrer IS NOT NULL AND referrer <> ''
            GROUP BY referrer
            ORDER BY count DESC, referrer
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(referrers)
    }

    /// Most clicked labels
    pub async fn top_clicks(
        pool: &PgPool,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<LabelCount>, sqlx::Error> {
        let clicks = sqlx::query_as::<_, LabelCount>(
            r#"
            SELECT label, COUNT(*) AS count
            FROM analytics_events
            WHERE event_type = 'click' AND created_at >= $1 AND label IS NOT NULL
            GROUP BY label
            ORDER BY count DESC, label
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(clicks)
    }

    /// Page views per UTC day; days without views are absent
    pub async fn daily_pageviews(
        pool: &PgPool,
        since: DateTime<Utc>,
    ) -> Result<Vec<DailyCount>, sqlx::Error> {
        let days = sqlx::query_as::<_, DailyCount>(
            r#"
            SELECT (created_at AT TIME ZONE 'UTC')::DATE AS day, COUNT(*) AS count
            FROM analytics_events
            WHERE event_type = 'pageview' AND created_at >= $1
            GROUP BY day
            ORDER BY day
            "#,
        )
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(days)
    }
}
