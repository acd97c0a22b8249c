//! Newsletter subscriber model and database operations
//!
//! Emails are stored lowercase and are unique. Unsubscribing keeps the row
//! (status `unsubscribed`) so a later subscribe reactivates it instead of
//! creating a duplicate.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE subscriber_status AS ENUM ('active', 'unsubscribed');
//!
//! CREATE TABLE newsletter_subscribers (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     email TEXT NOT NULL,               -- UNIQUE INDEX newsletter_subscribers_email_key
//!     name TEXT,
//!     source TEXT NOT NULL DEFAULT 'website',
//!     status subscriber_status NOT NULL DEFAULT 'active',
//!     unsubscribe_token TEXT NOT NULL,   -- UNIQUE
//!     subscribed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     unsubscribed_at TIMESTAMPTZ,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::non_blank;

/// Source tag used when the form does not send one
pub const DEFAULT_SOURCE: &str = "website";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscriber_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    Active,
    Unsubscribed,
}

impl SubscriberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberStatus::Active => "active",
            SubscriberStatus::Unsubscribed => "unsubscribed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NewsletterSubscriber {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,

    /// Where the signup came from (footer, blog, popup, ...)
    pub source: String,

    pub status: SubscriberStatus,

    /// Secret for one-click unsubscribe links, never serialized
    #[serde(skip_serializing, default)]
    pub unsubscribe_token: String,

    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SubscribeInput {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,

    #[validate(length(max = 100))]
    pub name: Option<String>,

    #[validate(length(max = 50))]
    pub source: Option<String>,
}

/// Result of a subscribe request
#[derive(Debug, Clone)]
pub enum SubscribeOutcome {
    /// New subscriber row
    Created(NewsletterSubscriber),

    /// A previously unsubscribed email became active again
    Reactivated(NewsletterSubscriber),

    /// The email is already actively subscribed; nothing was written
    AlreadySubscribed,
}

/// Canonical form used for storage and lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Random 32-byte hex token for unsubscribe links
pub fn generate_unsubscribe_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

impl NewsletterSubscriber {
    /// Subscribes an email, reactivating it if it had unsubscribed
    pub async fn subscribe(
        pool: &PgPool,
        data: &SubscribeInput,
    ) -> Result<SubscribeOutcome, sqlx::Error> {
        let email = normalize_email(&data.email);
        let source = non_blank(&data.source).unwrap_or_else(|| DEFAULT_SOURCE.to_string());

        if let Some(existing) = Self::find_by_email(pool, &email).await? {
            return match existing.status {
                SubscriberStatus::Active => Ok(SubscribeOutcome::AlreadySubscribed),
                SubscriberStatus::Unsubscribed => {
                    let reactivated = sqlx::query_as::<_, NewsletterSubscriber>(
                        r#"
                        UPDATE newsletter_subscribers
                        SET status = 'active', name = COALESCE($2, name), source = $3,
                            subscribed_at = NOW(), unsubscribed_at = NULL, updated_at = NOW()
                        WHERE id = $1
                        RETURNING id, email, name, source, status, unsubscribe_token,
                                  subscribed_at, unsubscribed_at, created_at, updated_at
                        "#,
                    )
                    .bind(existing.id)
                    .bind(non_blank(&data.name))
                    .bind(source)
                    .fetch_one(pool)
                    .await?;

                    Ok(SubscribeOutcome::Reactivated(reactivated))
                }
            };
        }

        let inserted = sqlx::query_as::<_, NewsletterSubscriber>(
            r#"
            INSERT INTO newsletter_subscribers (email, name, source, unsubscribe_token)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, source, status, unsubscribe_token,
                      subscribed_at, unsubscribed_at, created_at, updated_at
            "#,
        )
        .bind(&email)
        .bind(non_blank(&data.name))
        .bind(source)
        .bind(generate_unsubscribe_token())
        .fetch_one(pool)
        .await;

        match inserted {
            Ok(subscriber) => Ok(SubscribeOutcome::Created(subscriber)),
            // Lost a race with a concurrent subscribe of the same email
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Ok(SubscribeOutcome::AlreadySubscribed)
            }
            Err(e) => Err(e),
        }
    }

    /// Unsubscribes by token. Returns None for unknown tokens.
    pub async fn unsubscribe(pool: &PgPool, token: &str) -> Result<Option<Self>, sqlx::Error> {
        let subscriber = sqlx::query_as::<_, NewsletterSubscriber>(
            r#"
            UPDATE newsletter_subscribers
            SET status = 'unsubscribed',
                unsubscribed_at = COALESCE(unsubscribed_at, NOW()),
                updated_at = NOW()
            WHERE unsubscribe_token = $1
            RETURNING id, email, name, source, status, unsubscribe_token,
                      subscribed_at, unsubscribed_at, created_at, updated_at
            "#,
        )
        .bind(token.trim())
        .fetch_optional(pool)
        .await?;

        Ok(subscriber)
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let subscriber = sqlx::query_as::<_, NewsletterSubscriber>(
            r#"
            SELECT id, email, name, source, status, unsubscribe_token,
                   subscribed_at, unsubscribed_at, created_at, updated_at
            FROM newsletter_subscribers
            WHERE email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await?;

        Ok(subscriber)
    }

    pub async fn list(
        pool: &PgPool,
        status: Option<SubscriberStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let subscribers = sqlx::query_as::<_, NewsletterSubscriber>(
            r#"
            SELECT id, email, name, source, status, unsubscribe_token,
                   subscribed_at, unsubscribed_at, created_at, updated_at
            FROM newsletter_subscribers
            WHERE ($1::subscriber_status IS NULL OR status = $1)
            ORDER BY subscribed_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(subscribers)
    }

    /// Every active subscriber, for campaign delivery
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let subscribers = sqlx::query_as::<_, NewsletterSubscriber>(
            r#"
            SELECT id, email, name, source, status, unsubscribe_token,
                   subscribed_at, unsubscribed_at, created_at, updated_at
            FROM newsletter_subscribers
            WHERE status = 'active'
            ORDER BY subscribed_at
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(subscribers)
    }

    pub async fn count(
        pool: &PgPool,
        status: Option<SubscriberStatus>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM newsletter_subscribers WHERE ($1::subscriber_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Active signups since `since`
    pub async fn count_subscribed_since(
        pool: &PgPool,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM newsletter_subscribers WHERE status = 'active' AND subscribed_at >= $1",
        )
        .bind(since)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM newsletter_subscribers WHERE id = $1")
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
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Reader@Example.COM "), "reader@example.com");
    }

    #[test]
    fn test_unsubscribe_token_format() {
        let a = generate_unsubscribe_token();
        let b = generate_unsubscribe_token();

        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_not_serialized() {
        let subscriber = NewsletterSubscriber {
            id: Uuid::new_v4(),
            email: "reader@example.com".to_string(),
            name: None,
            source: DEFAULT_SOURCE.to_string(),
            status: SubscriberStatus::Active,
            unsubscribe_token: generate_unsubscribe_token(),
            subscribed_at: Utc::now(),
            unsubscribed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&subscriber).unwrap();
        assert!(json.get("unsubscribe_token").is_none());
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_subscribe_input_requires_email() {
        let input: SubscribeInput = serde_json::from_str(r#"{"name": "Reader"}"#).unwrap();
        assert!(input.validate().is_err());
    }
}
