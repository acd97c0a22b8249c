//! Contact form message model and database operations
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE contact_messages (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name TEXT NOT NULL,
//!     email TEXT NOT NULL,
//!     subject TEXT,
//!     message TEXT NOT NULL,
//!     read BOOLEAN NOT NULL DEFAULT FALSE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::non_blank;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ContactInput {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "A valid email address is required"))]
    pub email: String,

    #[validate(length(max = 200))]
    pub subject: Option<String>,

    #[validate(length(min = 1, max = 5000, message = "Message is required (max 5000 characters)"))]
    pub message: String,
}

impl ContactMessage {
    pub async fn create(pool: &PgPool, data: &ContactInput) -> Result<Self, sqlx::Error> {
        let message = sqlx::query_as::<_, ContactMessage>(
            r#"
            INSERT INTO contact_messages (name, email, subject, message)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, subject, message, read, created_at
            "#,
        )
        .bind(data.name.trim())
        .bind(data.email.trim().to_lowercase())
        .bind(non_blank(&data.subject))
        .bind(data.message.trim())
        .fetch_one(pool)
        .await?;

        Ok(message)
    }

    /// Newest first; `unread_only` hides messages already read
    pub async fn list(
        pool: &PgPool,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let messages = sqlx::query_as::<_, ContactMessage>(
            r#"
            SELECT id, name, email, subject, message, read, created_at
            FROM contact_messages
            WHERE NOT ($1 AND read)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(messages)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contact_messages")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn count_unread(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM contact_messages WHERE NOT read")
                .fetch_one(pool)
                .await?;

        Ok(count)
    }

    pub async fn mark_read(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let message = sqlx::query_as::<_, ContactMessage>(
            r#"
            UPDATE contact_messages
            SET read = TRUE
            WHERE id = $1
            RETURNING id, name, email, subject, message, read, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(message)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM contact_messages WHERE id = $1")
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
    fn test_valid_contact_input() {
        let input = ContactInput {
            name: "Alex".to_string(),
            email: "alex@example.com".to_string(),
            subject: Some("Hello".to_string()),
            message: "Are you available in May?".to_string(),
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_empty_message_rejected() {
        let input: ContactInput =
            serde_json::from_str(r#"{"name": "Alex", "email": "alex@example.com"}"#).unwrap();
        assert!(input.validate().unwrap_err().field_errors().contains_key("message"));
    }
}
