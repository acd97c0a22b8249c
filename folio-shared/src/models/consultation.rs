//! Consultation booking model and database operations
//!
//! Visitors submit consultation requests through the public booking form.
//! Admins work them through a simple status pipeline.
//!
//! # Status
//!
//! ```text
//! new → contacted → scheduled → completed
//!   (any) → cancelled
//! ```
//!
//! Admins may set any status; the pipeline above is the expected flow.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE consultation_status AS ENUM (
//!     'new', 'contacted', 'scheduled', 'completed', 'cancelled'
//! );
//!
//! CREATE TABLE consultations (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name TEXT NOT NULL,
//!     email TEXT NOT NULL,
//!     phone TEXT,
//!     company TEXT,
//!     project_type TEXT NOT NULL,
//!     budget TEXT,
//!     timeline TEXT,
//!     message TEXT NOT NULL,
//!     preferred_date DATE,
//!     status consultation_status NOT NULL DEFAULT 'new',
//!     notes TEXT,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::non_blank;

/// Consultation pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "consultation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConsultationStatus {
    /// Just submitted
    New,

    /// Admin reached out
    Contacted,

    /// Call or meeting booked
    Scheduled,

    Completed,
    Cancelled,
}

impl ConsultationStatus {
    pub const ALL: [ConsultationStatus; 5] = [
        ConsultationStatus::New,
        ConsultationStatus::Contacted,
        ConsultationStatus::Scheduled,
        ConsultationStatus::Completed,
        ConsultationStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::New => "new",
            ConsultationStatus::Contacted => "contacted",
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Consultation {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub project_type: String,

    /// Budget bracket chosen on the form
    pub budget: Option<String>,

    /// Timeline bracket chosen on the form
    pub timeline: Option<String>,

    pub message: String,
    pub preferred_date: Option<NaiveDate>,
    pub status: ConsultationStatus,

    /// Private admin notes
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public booking form
///
/// Missing required fields deserialize as empty strings so they surface as
/// field-level validation errors instead of a JSON parse failure.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ConsultationInput {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "A valid email address is required"))]
    pub email: String,

    #[validate(length(max = 40))]
    pub phone: Option<String>,

    #[validate(length(max = 100))]
    pub company: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Project type is required"))]
    pub project_type: String,

    #[validate(length(max = 100))]
    pub budget: Option<String>,

    #[validate(length(max = 100))]
    pub timeline: Option<String>,

    #[validate(length(min = 1, max = 5000, message = "Message is required (max 5000 characters)"))]
    pub message: String,

    pub preferred_date: Option<NaiveDate>,
}

/// Admin status change
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: ConsultationStatus,

    /// Replaces the notes when present
    pub notes: Option<String>,
}

/// Consultation count for one status
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: ConsultationStatus,
    pub count: i64,
}

impl Consultation {
    /// Stores a new request with status `new`
    pub async fn create(pool: &PgPool, data: &ConsultationInput) -> Result<Self, sqlx::Error> {
        let consultation = sqlx::query_as::<_, Consultation>(
            r#"
            INSERT INTO consultations (name, email, phone, company, project_type, budget,
                                       timeline, message, preferred_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, name, email, phone, company, project_type, budget, timeline, message,
                      preferred_date, status, notes, created_at, updated_at
            "#,
        )
        .bind(data.name.trim())
        .bind(data.email.trim().to_lowercase())
        .bind(non_blank(&data.phone))
        .bind(non_blank(&data.company))
        .bind(data.project_type.trim())
        .bind(non_blank(&data.budget))
        .bind(non_blank(&data.timeline))
        .bind(data.message.trim())
        .bind(data.preferred_date)
        .fetch_one(pool)
        .await?;

        Ok(consultation)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let consultation = sqlx::query_as::<_, Consultation>(
            r#"
            SELECT id, name, email, phone, company, project_type, budget, timeline, message,
                   preferred_date, status, notes, created_at, updated_at
            FROM consultations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(consultation)
    }

    /// Lists requests newest first, optionally restricted to one status
    pub async fn list(
        pool: &PgPool,
        status: Option<ConsultationStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let consultations = sqlx::query_as::<_, Consultation>(
            r#"
            SELECT id, name, email, phone, company, project_type, budget, timeline, message,
                   preferred_date, status, notes, created_at, updated_at
            FROM consultations
            WHERE ($1::consultation_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(consultations)
    }

    pub async fn count(
        pool: &PgPool,
        status: Option<ConsultationStatus>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM consultations WHERE ($1::consultation_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Requests received since `since`, optionally with one status
    pub async fn count_since(
        pool: &PgPool,
        since: DateTime<Utc>,
        status: Option<ConsultationStatus>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM consultations
            WHERE created_at >= $1 AND ($2::consultation_status IS NULL OR status = $2)
            "#,
        )
        .bind(since)
        .bind(status)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Counts per status; statuses without requests are omitted
    pub async fn count_by_status(pool: &PgPool) -> Result<Vec<StatusCount>, sqlx::Error> {
        let counts = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM consultations
            GROUP BY status
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(counts)
    }

    /// Sets the status; notes are replaced only when given
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        update: &StatusUpdate,
    ) -> Result<Option<Self>, sqlx::Error> {
        let consultation = sqlx::query_as::<_, Consultation>(
            r#"
            UPDATE consultations
            SET status = $2, notes = COALESCE($3, notes), updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, phone, company, project_type, budget, timeline, message,
                      preferred_date, status, notes, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(update.notes.as_deref().map(str::trim))
        .fetch_optional(pool)
        .await?;

        Ok(consultation)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM consultations WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
