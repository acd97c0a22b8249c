//! Portfolio project model and database operations
//!
//! Projects are shown on the public portfolio page and, when `featured`, on
//! the homepage. A project may name its client; when `client_anonymous` is
//! set the client name is stripped from public responses.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE projects (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     title TEXT NOT NULL,
//!     category TEXT NOT NULL,
//!     description TEXT NOT NULL,
//!     image TEXT,
//!     images TEXT[] NOT NULL DEFAULT '{}',
//!     tags TEXT[] NOT NULL DEFAULT '{}',
//!     project_date DATE,
//!     featured BOOLEAN NOT NULL DEFAULT FALSE,
//!     client_name TEXT,
//!     client_anonymous BOOLEAN NOT NULL DEFAULT FALSE,
//!     live_url TEXT,
//!     repo_url TEXT,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::{clean_list, finish_validation, non_blank, validate_link};

/// Portfolio project
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub description: String,

    /// Primary image URL
    pub image: Option<String>,

    /// Gallery image URLs
    pub images: Vec<String>,

    pub tags: Vec<String>,
    pub project_date: Option<NaiveDate>,

    /// Shown on the homepage
    pub featured: bool,

    pub client_name: Option<String>,

    /// Hide `client_name` in public responses
    pub client_anonymous: bool,

    pub live_url: Option<String>,
    pub repo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a project
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ProjectInput {
    #[validate(length(min = 1, max = 200, message = "Title is required (max 200 characters)"))]
    pub title: String,

    #[validate(length(min = 1, max = 100, message = "Category is required (max 100 characters)"))]
    pub category: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    pub image: Option<String>,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub project_date: Option<NaiveDate>,
    pub featured: bool,

    #[validate(length(max = 200))]
    pub client_name: Option<String>,

    pub client_anonymous: bool,
    pub live_url: Option<String>,
    pub repo_url: Option<String>,
}

impl ProjectInput {
    /// Runs field validation plus link checks
    pub fn check(&self) -> Result<(), ValidationErrors> {
        finish_validation(self.validate(), |errors| {
            validate_link(errors, "live_url", &self.live_url);
            validate_link(errors, "repo_url", &self.repo_url);
        })
    }
}

/// Public list filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub category: Option<String>,
    pub featured: Option<bool>,
}

impl Project {
    /// Strips the client name when the client asked to stay anonymous
    pub fn public_view(mut self) -> Self {
        if self.client_anonymous {
            self.client_name = None;
        }
        self
    }

    pub async fn create(pool: &PgPool, data: &ProjectInput) -> Result<Self, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (title, category, description, image, images, tags,
                                  project_date, featured, client_name, client_anonymous,
                                  live_url, repo_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id, title, category, description, image, images, tags, project_date,
                      featured, client_name, client_anonymous, live_url, repo_url,
                      created_at, updated_at
            "#,
        )
        .bind(data.title.trim())
        .bind(data.category.trim())
        .bind(&data.description)
        .bind(non_blank(&data.image))
        .bind(clean_list(&data.images))
        .bind(clean_list(&data.tags))
        .bind(data.project_date)
        .bind(data.featured)
        .bind(non_blank(&data.client_name))
        .bind(data.client_anonymous)
        .bind(non_blank(&data.live_url))
        .bind(non_blank(&data.repo_url))
        .fetch_one(pool)
        .await?;

        Ok(project)
    }

    /// Replaces every editable field. Returns None if the project does not exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: &ProjectInput,
    ) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET title = $2, category = $3, description = $4, image = $5, images = $6,
                tags = $7, project_date = $8, featured = $9, client_name = $10,
                client_anonymous = $11, live_url = $12, repo_url = $13, updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, category, description, image, images, tags, project_date,
                      featured, client_name, client_anonymous, live_url, repo_url,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.title.trim())
        .bind(data.category.trim())
        .bind(&data.description)
        .bind(non_blank(&data.image))
        .bind(clean_list(&data.images))
        .bind(clean_list(&data.tags))
        .bind(data.project_date)
        .bind(data.featured)
        .bind(non_blank(&data.client_name))
        .bind(data.client_anonymous)
        .bind(non_blank(&data.live_url))
        .bind(non_blank(&data.repo_url))
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, title, category, description, image, images, tags, project_date,
                   featured, client_name, client_anonymous, live_url, repo_url,
                   created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    /// Lists projects, newest project date first
    pub async fn list(pool: &PgPool, filter: &ProjectFilter) -> Result<Vec<Self>, sqlx::Error> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, title, category, description, image, images, tags, project_date,
                   featured, client_name, client_anonymous, live_url, repo_url,
                   created_at, updated_at
            FROM projects
            WHERE ($1::TEXT IS NULL OR category = $1)
              AND ($2::BOOLEAN IS NULL OR featured = $2)
            ORDER BY project_date DESC NULLS LAST, created_at DESC
            "#,
        )
        .bind(non_blank(&filter.category))
        .bind(filter.featured)
        .fetch_all(pool)
        .await?;

        Ok(projects)
    }

    /// Featured projects for the homepage
    pub async fn list_featured(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, title, category, description, image, images, tags, project_date,
                   featured, client_name, client_anonymous, live_url, repo_url,
                   created_at, updated_at
            FROM projects
            WHERE featured
            ORDER BY project_date DESC NULLS LAST, created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(projects)
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Deletes a project. Returns true if a row was removed.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
