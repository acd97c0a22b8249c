//! Skill model and database operations
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE skills (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name TEXT NOT NULL,
//!     category TEXT NOT NULL,
//!     level INTEGER NOT NULL,            -- 0..=100
//!     display_order INTEGER NOT NULL DEFAULT 0,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub category: String,

    /// Proficiency, 0 to 100
    pub level: i32,

    /// Sort key within a category
    pub display_order: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SkillInput {
    #[validate(length(min = 1, max = 100, message = "Name is required (max 100 characters)"))]
    pub name: String,

    #[validate(length(min = 1, max = 100, message = "Category is required (max 100 characters)"))]
    pub category: String,

    #[validate(range(min = 0, max = 100, message = "Level must be between 0 and 100"))]
    pub level: i32,

    pub display_order: i32,
}

impl Skill {
    pub async fn create(pool: &PgPool, data: &SkillInput) -> Result<Self, sqlx::Error> {
        let skill = sqlx::query_as::<_, Skill>(
            r#"
            INSERT INTO skills (name, category, level, display_order)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, category, level, display_order, created_at, updated_at
            "#,
        )
        .bind(data.name.trim())
        .bind(data.category.trim())
        .bind(data.level)
        .bind(data.display_order)
        .fetch_one(pool)
        .await?;

        Ok(skill)
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: &SkillInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let skill = sqlx::query_as::<_, Skill>(
            r#"
            UPDATE skills
            SET name = $2, category = $3, level = $4, display_order = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, category, level, display_order, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.name.trim())
        .bind(data.category.trim())
        .bind(data.level)
        .bind(data.display_order)
        .fetch_optional(pool)
        .await?;

        Ok(skill)
    }

    /// All skills ordered by category, then display order
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let skills = sqlx::query_as::<_, Skill>(
            r#"
            SELECT id, name, category, level, display_order, created_at, updated_at
            FROM skills
            ORDER BY category, display_order, name
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(skills)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM skills")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM skills WHERE id = $1")
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
    fn test_level_bounds() {
        for (level, ok) in [(-1, false), (0, true), (100, true), (101, false)] {
            let input = SkillInput {
                name: "Rust".to_string(),
                category: "Backend".to_string(),
                level,
                display_order: 0,
            };
            assert_eq!(input.validate().is_ok(), ok, "level {}", level);
        }
    }

    #[test]
    fn test_missing_name_rejected() {
        let input: SkillInput =
            serde_json::from_str(r#"{"category": "Backend", "level": 80}"#).unwrap();
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }
}
