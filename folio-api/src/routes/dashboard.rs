//! Admin dashboard overview
//!
//! `GET /api/admin/dashboard` gathers entity counts, the last 30 days of
//! analytics, the conversion funnel and the newest consultations in one
//! response.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use chrono::Utc;
use folio_shared::{
    analytics::{build_funnel, Funnel, FunnelCounts, Window, DEFAULT_WINDOW_DAYS},
    models::{
        analytics_event::{AnalyticsEvent, EventTotals},
        blog_post::{BlogFilter, BlogPost},
        campaign::Campaign,
        consultation::{Consultation, ConsultationStatus},
        contact_message::ContactMessage,
        project::Project,
        skill::Skill,
        subscriber::{NewsletterSubscriber, SubscriberStatus},
        testimonial::Testimonial,
    },
};
use serde::Serialize;
use std::collections::BTreeMap;

const RECENT_CONSULTATIONS: i64 = 5;

#[derive(Debug, Serialize)]
pub struct EntityCounts {
    pub projects: i64,
    pub published_posts: i64,
    pub total_posts: i64,
    pub active_testimonials: i64,
    pub skills: i64,
    pub consultations: i64,

    /// Every status is present, zero when unused
    pub consultations_by_status: BTreeMap<&'static str, i64>,

    pub unread_messages: i64,
    pub active_subscribers: i64,
    pub campaigns: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub counts: EntityCounts,
    pub window_days: i64,
    pub analytics: EventTotals,
    pub funnel: Funnel,
    pub recent_consultations: Vec<Consultation>,
}

/// Zero-filled per-status counts
fn status_breakdown(counts: &[(ConsultationStatus, i64)]) -> BTreeMap<&'static str, i64> {
    let mut breakdown: BTreeMap<&'static str, i64> = ConsultationStatus::ALL
        .iter()
        .map(|status| (status.as_str(), 0))
        .collect();

    for (status, count) in counts {
        *breakdown.entry(status.as_str()).or_insert(0) += count;
    }

    breakdown
}

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<Json<DashboardResponse>> {
    let db = &state.db;
    let window = Window::last_days(DEFAULT_WINDOW_DAYS, Utc::now());
    let since = window.since();

    let by_status: Vec<(ConsultationStatus, i64)> = Consultation::count_by_status(db)
        .await?
        .into_iter()
        .map(|c| (c.status, c.count))
        .collect();

    let counts = EntityCounts {
        projects: Project::count(db).await?,
        published_posts: BlogPost::count_published(db, &BlogFilter::default()).await?,
        total_posts: BlogPost::count_all(db).await?,
        active_testimonials: Testimonial::count_active(db).await?,
        skills: Skill::count(db).await?,
        consultations: by_status.iter().map(|(_, count)| count).sum(),
        consultations_by_status: status_breakdown(&by_status),
        unread_messages: ContactMessage::count_unread(db).await?,
        active_subscribers: NewsletterSubscriber::count(db, Some(SubscriberStatus::Active))
            .await?,
        campaigns: Campaign::count(db).await?,
    };

    let analytics = AnalyticsEvent::totals(db, since).await?;

    let funnel = build_funnel(&FunnelCounts {
        visitors: analytics.unique_sessions,
        subscribers: NewsletterSubscriber::count_subscribed_since(db, since).await?,
        consultations: Consultation::count_since(db, since, None).await?,
        completed: Consultation::count_since(db, since, Some(ConsultationStatus::Completed))
            .await?,
    });

    let recent_consultations = Consultation::list(db, None, RECENT_CONSULTATIONS, 0).await?;

    Ok(Json(DashboardResponse {
        counts,
        window_days: window.days(),
        analytics,
        funnel,
        recent_consultations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_breakdown_fills_missing_statuses() {
        let breakdown = status_breakdown(&[
            (ConsultationStatus::New, 3),
            (ConsultationStatus::Completed, 1),
        ]);

        assert_eq!(breakdown.len(), ConsultationStatus::ALL.len());
        assert_eq!(breakdown["new"], 3);
        assert_eq!(breakdown["completed"], 1);
        assert_eq!(breakdown["cancelled"], 0);
    }
}
