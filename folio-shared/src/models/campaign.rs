//! Email campaign model and database operations
//!
//! # State Machine
//!
//! ```text
//! draft → sending → sent
//! ```
//!
//! Only drafts can be edited. `begin_sending` is a conditional update, so of
//! two concurrent send requests exactly one wins. Delivery records its
//! progress as it goes; a send that stops making progress (the process died
//! mid-run) is closed out by `recover_stalled`.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE campaign_status AS ENUM ('draft', 'sending', 'sent');
//!
//! CREATE TABLE campaigns (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     title TEXT NOT NULL,
//!     subject TEXT NOT NULL,
//!     content TEXT NOT NULL,
//!     status campaign_status NOT NULL DEFAULT 'draft',
//!     recipient_count INTEGER NOT NULL DEFAULT 0,
//!     sent_count INTEGER NOT NULL DEFAULT 0,
//!     failed_count INTEGER NOT NULL DEFAULT 0,
//!     open_count BIGINT NOT NULL DEFAULT 0,
//!     click_count BIGINT NOT NULL DEFAULT 0,
//!     sent_at TIMESTAMPTZ,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "campaign_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Sending,
    Sent,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Sending => "sending",
            CampaignStatus::Sent => "sent",
        }
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, CampaignStatus::Draft)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: Uuid,
    pub title: String,
    pub subject: String,

    /// HTML body before personalisation
    pub content: String,

    pub status: CampaignStatus,
    pub recipient_count: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub open_count: i64,
    pub click_count: i64,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CampaignInput {
    #[validate(length(min = 1, max = 200, message = "Title is required (max 200 characters)"))]
    pub title: String,

    #[validate(length(min = 1, max = 200, message = "Subject is required (max 200 characters)"))]
    pub subject: String,

    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
}

impl Campaign {
    pub async fn create(pool: &PgPool, data: &CampaignInput) -> Result<Self, sqlx::Error> {
        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (title, subject, content)
            VALUES ($1, $2, $3)
            RETURNING id, title, subject, content, status, recipient_count, sent_count,
                      failed_count, open_count, click_count, sent_at, created_at, updated_at
            "#,
        )
        .bind(data.title.trim())
        .bind(data.subject.trim())
        .bind(&data.content)
        .fetch_one(pool)
        .await?;

        Ok(campaign)
    }

    /// Updates a draft. Returns None if the campaign is missing or no longer a draft.
    pub async fn update_draft(
        pool: &PgPool,
        id: Uuid,
        data: &CampaignInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns
            SET title = $2, subject = $3, content = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            RETURNING id, title, subject, content, status, recipient_count, sent_count,
                      failed_count, open_count, click_count, sent_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.title.trim())
        .bind(data.subject.trim())
        .bind(&data.content)
        .fetch_optional(pool)
        .await?;

        Ok(campaign)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, title, subject, content, status, recipient_count, sent_count,
                   failed_count, open_count, click_count, sent_at, created_at, updated_at
            FROM campaigns
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(campaign)
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let campaigns = sqlx::query_as::<_, Campaign>(
            r#"
            SELECT id, title, subject, content, status, recipient_count, sent_count,
                   failed_count, open_count, click_count, sent_at, created_at, updated_at
            FROM campaigns
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(campaigns)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaigns")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Claims a draft for delivery (`draft → sending`)
    ///
    /// Returns None when the campaign is missing or not a draft, which is
    /// how a concurrent second send is detected.
    pub async fn begin_sending(
        pool: &PgPool,
        id: Uuid,
        recipient_count: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns
            SET status = 'sending', recipient_count = $2, sent_count = 0, failed_count = 0,
                updated_at = NOW()
            WHERE id = $1 AND status = 'draft'
            RETURNING id, title, subject, content, status, recipient_count, sent_count,
                      failed_count, open_count, click_count, sent_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(recipient_count)
        .fetch_optional(pool)
        .await?;

        Ok(campaign)
    }

    /// Records delivery results and marks the campaign `sent`
    pub async fn finish_sending(
        pool: &PgPool,
        id: Uuid,
        sent: i32,
        failed: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        let campaign = sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns
            SET status = 'sent', sent_count = $2, failed_count = $3, sent_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            RETURNING id, title, subject, content, status, recipient_count, sent_count,
                      failed_count, open_count, click_count, sent_at, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(sent)
        .bind(failed)
        .fetch_optional(pool)
        .await?;

        Ok(campaign)
    }

    /// Stores counts so far for a campaign that is still sending
    ///
    /// Also refreshes `updated_at`, which marks the send as alive for
    /// [`Campaign::recover_stalled`].
    pub async fn record_progress(
        pool: &PgPool,
        id: Uuid,
        sent: i32,
        failed: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET sent_count = $2, failed_count = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            "#,
        )
        .bind(id)
        .bind(sent)
        .bind(failed)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Closes out sends whose delivery task died
    ///
    /// A campaign still `sending` with no progress for `stale_after` is
    /// marked `sent` with the counts recorded so far. Recipients that were
    /// never reached are not retried, so nobody gets the campaign twice.
    pub async fn recover_stalled(
        pool: &PgPool,
        stale_after: std::time::Duration,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let campaigns = sqlx::query_as::<_, Campaign>(
            r#"
            UPDATE campaigns
            SET status = 'sent', sent_at = NOW(), updated_at = NOW()
            WHERE status = 'sending' AND updated_at <= NOW() - make_interval(secs => $1)
            RETURNING id, title, subject, content, status, recipient_count, sent_count,
                      failed_count, open_count, click_count, sent_at, created_at, updated_at
            "#,
        )
        .bind(stale_after.as_secs_f64())
        .fetch_all(pool)
        .await?;

        Ok(campaigns)
    }

    /// Bumps the open counter. Returns false for unknown campaigns.
    pub async fn record_open(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE campaigns SET open_count = open_count + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Bumps the click counter. Returns false for unknown campaigns.
    pub async fn record_click(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE campaigns SET click_count = click_count + 1 WHERE id = $1")
                .bind(id)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a campaign unless it is currently being delivered
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM campaigns WHERE id = $1 AND status <> 'sending'")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_drafts_editable() {
        assert!(CampaignStatus::Draft.is_editable());
        assert!(!CampaignStatus::Sending.is_editable());
        assert!(!CampaignStatus::Sent.is_editable());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_value(CampaignStatus::Sending).unwrap(), "sending");
        assert_eq!(CampaignStatus::Sent.as_str(), "sent");
    }

    #[test]
    fn test_input_requires_subject() {
        let input: CampaignInput =
            serde_json::from_str(r#"{"title": "May update", "content": "<p>Hi</p>"}"#).unwrap();
        assert!(input.validate().unwrap_err().field_errors().contains_key("subject"));
    }
}
