//! Client testimonial model and database operations
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE testimonials (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name TEXT NOT NULL,
//!     role TEXT,
//!     company TEXT,
//!     rating INTEGER NOT NULL,           -- 1..=5
//!     text TEXT NOT NULL,
//!     image TEXT,
//!     active BOOLEAN NOT NULL DEFAULT TRUE,
//!     anonymous BOOLEAN NOT NULL DEFAULT FALSE,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::non_blank;

/// Display name for anonymous testimonials
pub const ANONYMOUS_NAME: &str = "Anonymous Client";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Testimonial {
    pub id: Uuid,
    pub name: String,
    pub role: Option<String>,
    pub company: Option<String>,

    /// Star rating, 1 to 5
    pub rating: i32,

    pub text: String,
    pub image: Option<String>,

    /// Only active testimonials are shown publicly
    pub active: bool,

    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct TestimonialInput {
    #[validate(length(min = 1, max = 100, message = "Name is required (max 100 characters)"))]
    pub name: String,

    #[validate(length(max = 100))]
    pub role: Option<String>,

    #[validate(length(max = 100))]
    pub company: Option<String>,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(min = 1, max = 2000, message = "Text is required (max 2000 characters)"))]
    pub text: String,

    pub image: Option<String>,
    pub active: bool,
    pub anonymous: bool,
}

impl Default for TestimonialInput {
    fn default() -> Self {
        Self {
            name: String::new(),
            role: None,
            company: None,
            rating: 5,
            text: String::new(),
            image: None,
            active: true,
            anonymous: false,
        }
    }
}

impl Testimonial {
    /// Replaces identifying details for anonymous testimonials
    pub fn public_view(mut self) -> Self {
        if self.anonymous {
            self.name = ANONYMOUS_NAME.to_string();
            self.image = None;
        }
        self
    }

    pub async fn create(pool: &PgPool, data: &TestimonialInput) -> Result<Self, sqlx::Error> {
        let testimonial = sqlx::query_as::<_, Testimonial>(
            r#"
            INSERT INTO testimonials (name, role, company, rating, text, image, active, anonymous)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, name, role, company, rating, text, image, active, anonymous,
                      created_at, updated_at
            "#,
        )
        .bind(data.name.trim())
        .bind(non_blank(&data.role))
        .bind(non_blank(&data.company))
        .bind(data.rating)
        .bind(data.text.trim())
        .bind(non_blank(&data.image))
        .bind(data.active)
        .bind(data.anonymous)
        .fetch_one(pool)
        .await?;

        Ok(testimonial)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: &TestimonialInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let testimonial = sqlx::query_as::<_, Testimonial>(
            r#"
            UPDATE testimonials
            SET name = $2, role = $3, company = $4, rating = $5, text = $6, image = $7,
                active = $8, anonymous = $9, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, role, company, rating, text, image, active, anonymous,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(non_blank(&data.role))
        .bind(non_blank(&data.company))
        .bind(data.rating)
        .bind(data.text.trim())
        .bind(non_blank(&data.image))
        .bind(data.active)
        .bind(data.anonymous)
        .fetch_optional(pool)
        .await?;

        Ok(testimonial)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let testimonial = sqlx::query_as::<_, Testimonial>(
            r#"
            SELECT id, name, role, company, rating, text, image, active, anonymous,
                   created_at, updated_at
            FROM testimonials
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(testimonial)
    }

    /// Active testimonials, best rated and newest first
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let testimonials = sqlx::query_as::<_, Testimonial>(
            r#"
            SELECT id, name, role, company, rating, text, image, active, anonymous,
                   created_at, updated_at
            FROM testimonials
            WHERE active
            ORDER BY rating DESC, created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(testimonials)
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let testimonials = sqlx::query_as::<_, Testimonial>(
            r#"
            SELECT id, name, role, company, rating, text, image, active, anonymous,
                   created_at, updated_at
            FROM testimonials
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(testimonials)
    }

    pub async fn count_active(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM testimonials WHERE active")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM testimonials WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(anonymous: bool) -> Testimonial {
        Testimonial {
            id: Uuid::new_v4(),
            name: "Jane Doe".to_string(),
            role: Some("CTO".to_string()),
            company: Some("Acme".to_string()),
            rating: 5,
            text: "Delivered on time".to_string(),
            image: Some("/uploads/jane.png".to_string()),
            active: true,
            anonymous,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_public_view_anonymises() {
        let public = sample(true).public_view();
        assert_eq!(public.name, ANONYMOUS_NAME);
        assert!(public.image.is_none());

        let public = sample(false).public_view();
        assert_eq!(public.name, "Jane Doe");
        assert!(public.image.is_some());
    }

    #[test]
    fn test_rating_bounds() {
        for (rating, ok) in [(0, false), (1, true), (5, true), (6, false)] {
            let input = TestimonialInput {
                name: "Client".to_string(),
                text: "Great work".to_string(),
                rating,
                ..Default::default()
            };
            assert_eq!(input.validate().is_ok(), ok, "rating {}", rating);
        }
    }

    #[test]
    fn test_defaults_when_fields_omitted() {
        let input: TestimonialInput =
            serde_json::from_str(r#"{"name": "Client", "text": "Nice"}"#).unwrap();
        assert_eq!(input.rating, 5);
        assert!(input.active);
        assert!(!input.anonymous);
    }
}
