//! Blog post model and database operations
//!
//! Posts are addressed publicly by slug. Drafts (`published = false`) are
//! only visible to admins. `published_at` is stamped the first time a post
//! is published and kept across later unpublish/republish cycles.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE blog_posts (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     title TEXT NOT NULL,
//!     slug TEXT NOT NULL,                -- CONSTRAINT blog_posts_slug_key UNIQUE
//!     excerpt TEXT,
//!     content TEXT NOT NULL,
//!     category TEXT NOT NULL,
//!     tags TEXT[] NOT NULL DEFAULT '{}',
//!     cover_image TEXT,
//!     published BOOLEAN NOT NULL DEFAULT FALSE,
//!     published_at TIMESTAMPTZ,
//!     view_count BIGINT NOT NULL DEFAULT 0,
//!     meta_title TEXT,
//!     meta_description TEXT,
//!     keywords TEXT[] NOT NULL DEFAULT '{}',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use super::{clean_list, non_blank};
use crate::slug;

/// Gives up suffixing after this many attempts and appends a random tail
const MAX_SLUG_ATTEMPTS: u32 = 100;

/// Blog post
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,

    /// Rich HTML body
    pub content: String,

    pub category: String,
    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    pub published: bool,

    /// First time the post went public
    pub published_at: Option<DateTime<Utc>>,

    pub view_count: i64,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Create/update payload for a post
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct BlogPostInput {
    #[validate(length(min = 1, max = 200, message = "Title is required (max 200 characters)"))]
    pub title: String,

    /// Optional explicit slug; normalised with `slugify`, derived from the
    /// title when absent
    #[validate(length(max = 120))]
    pub slug: Option<String>,

    #[validate(length(max = 500))]
    pub excerpt: Option<String>,

    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,

    #[validate(length(min = 1, max = 100, message = "Category is required (max 100 characters)"))]
    pub category: String,

    pub tags: Vec<String>,
    pub cover_image: Option<String>,
    pub published: bool,

    #[validate(length(max = 200))]
    pub meta_title: Option<String>,

    #[validate(length(max = 500))]
    pub meta_description: Option<String>,

    pub keywords: Vec<String>,
}

impl BlogPostInput {
    /// Base slug for this post before collision handling
    pub fn base_slug(&self) -> String {
        match non_blank(&self.slug) {
            Some(explicit) => slug::slugify(&explicit),
            None => slug::slugify(&self.title),
        }
    }
}

/// Public list filter
#[derive(Debug, Clone, Default)]
pub struct BlogFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
}

/// Published post count per category
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

impl BlogPost {
    /// Creates a post under an already-resolved slug
    ///
    /// # Errors
    ///
    /// Unique violation on `blog_posts_slug_key` if another writer took the
    /// slug in the meantime.
    pub async fn create(
        pool: &PgPool,
        data: &BlogPostInput,
        slug: &str,
    ) -> Result<Self, sqlx::Error> {
        let post = sqlx::query_as::<_, BlogPost>(
            r#"
            INSERT INTO blog_posts (title, slug, excerpt, content, category, tags, cover_image,
                                    published, published_at, meta_title, meta_description,
                                    keywords)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                    CASE WHEN $8 THEN NOW() ELSE NULL END, $9, $10, $11)
            RETURNING id, title, slug, excerpt, content, category, tags, cover_image, published,
                      published_at, view_count, meta_title, meta_description, keywords,
                      created_at, updated_at
            "#,
        )
        .bind(data.title.trim())
        .bind(slug)
        .bind(non_blank(&data.excerpt))
        .bind(&data.content)
        .bind(data.category.trim())
        .bind(clean_list(&data.tags))
        .bind(non_blank(&data.cover_image))
        .bind(data.published)
        .bind(non_blank(&data.meta_title))
        .bind(non_blank(&data.meta_description))
        .bind(clean_list(&data.keywords))
        .fetch_one(pool)
        .await?;

        Ok(post)
    }

    /// Replaces every editable field. `published_at` is only set on the
    /// first publish.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: &BlogPostInput,
        slug: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let post = sqlx::query_as::<_, BlogPost>(
            r#"
            UPDATE blog_posts
            SET title = $2, slug = $3, excerpt = $4, content = $5, category = $6, tags = $7,
                cover_image = $8, published = $9,
                published_at = CASE WHEN $9 AND published_at IS NULL THEN NOW()
                                    ELSE published_at END,
                meta_title = $10, meta_description = $11, keywords = $12, updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, slug, excerpt, content, category, tags, cover_image, published,
                      published_at, view_count, meta_title, meta_description, keywords,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.title.trim())
        .bind(slug)
        .bind(non_blank(&data.excerpt))
        .bind(&data.content)
        .bind(data.category.trim())
        .bind(clean_list(&data.tags))
        .bind(non_blank(&data.cover_image))
        .bind(data.published)
        .bind(non_blank(&data.meta_title))
        .bind(non_blank(&data.meta_description))
        .bind(clean_list(&data.keywords))
        .fetch_optional(pool)
        .await?;

        Ok(post)
    }

    /// Checks whether a slug is used by any post other than `exclude`
    pub async fn slug_taken(
        pool: &PgPool,
        slug: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let taken: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM blog_posts
                WHERE slug = $1 AND ($2::UUID IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(slug)
        .bind(exclude)
        .fetch_one(pool)
        .await?;

        Ok(taken)
    }

    /// Finds the first free slug for `base`, trying `base`, `base-2`, `base-3`, ...
    pub async fn unique_slug(
        pool: &PgPool,
        base: &str,
        exclude: Option<Uuid>,
    ) -> Result<String, sqlx::Error> {
        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            let candidate = slug::candidate(base, attempt);
            if !Self::slug_taken(pool, &candidate, exclude).await? {
                return Ok(candidate);
            }
        }

        let tail = Uuid::new_v4().simple().to_string();
        Ok(format!("{}-{}", base, &tail[..8]))
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let post = sqlx::query_as::<_, BlogPost>(
            r#"
            SELECT id, title, slug, excerpt, content, category, tags, cover_image, published,
                   published_at, view_count, meta_title, meta_description, keywords,
                   created_at, updated_at
            FROM blog_posts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(post)
    }

    /// Fetches a published post by slug and counts the view in the same statement
    ///
    /// Drafts return None, so they are indistinguishable from missing posts.
    pub async fn view_published(pool: &PgPool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        let post = sqlx::query_as::<_, BlogPost>(
            r#"
            UPDATE blog_posts
            SET view_count = view_count + 1
            WHERE slug = $1 AND published
            RETURNING id, title, slug, excerpt, content, category, tags, cover_image, published,
                      published_at, view_count, meta_title, meta_description, keywords,
                      created_at, updated_at
            "#,
        )
        .bind(slug)
        .fetch_optional(pool)
        .await?;

        Ok(post)
    }

    /// Published posts, newest first
    pub async fn list_published(
        pool: &PgPool,
        filter: &BlogFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let posts = sqlx::query_as::<_, BlogPost>(
            r#"
            SELECT id, title, slug, excerpt, content, category, tags, cover_image, published,
                   published_at, view_count, meta_title, meta_description, keywords,
                   created_at, updated_at
            FROM blog_posts
            WHERE published
              AND ($1::TEXT IS NULL OR category = $1)
              AND ($2::TEXT IS NULL OR $2 = ANY(tags))
            ORDER BY published_at DESC NULLS LAST, created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(non_blank(&filter.category))
        .bind(non_blank(&filter.tag))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(posts)
    }

    pub async fn count_published(pool: &PgPool, filter: &BlogFilter) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM blog_posts
            WHERE published
              AND ($1::TEXT IS NULL OR category = $1)
              AND ($2::TEXT IS NULL OR $2 = ANY(tags))
            "#,
        )
        .bind(non_blank(&filter.category))
        .bind(non_blank(&filter.tag))
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// All posts including drafts, most recently edited first
    pub async fn list_all(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let posts = sqlx::query_as::<_, BlogPost>(
            r#"
            SELECT id, title, slug, excerpt, content, category, tags, cover_image, published,
                   published_at, view_count, meta_title, meta_description, keywords,
                   created_at, updated_at
            FROM blog_posts
            ORDER BY updated_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(posts)
    }

    pub async fn count_all(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM blog_posts")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Categories of published posts with their post counts
    pub async fn categories(pool: &PgPool) -> Result<Vec<CategoryCount>, sqlx::Error> {
        let categories = sqlx::query_as::<_, CategoryCount>(
            r#"
            SELECT category, COUNT(*) AS count
            FROM blog_posts
            WHERE published
            GROUP BY category
            ORDER BY count DESC, category
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(categories)
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
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
    fn test_base_slug_from_title() {
        let input = BlogPostInput {
            title: "Why I Write Backends in Rust".to_string(),
            ..Default::default()
        };
        assert_eq!(input.base_slug(), "why-i-write-backends-in-rust");
    }

    #[test]
    fn test_base_slug_normalises_explicit_slug() {
        let input = BlogPostInput {
            title: "Ignored".to_string(),
            slug: Some("  My Custom Slug ".to_string()),
            ..Default::default()
        };
        assert_eq!(input.base_slug(), "my-custom-slug");
    }

    #[test]
    fn test_blank_slug_uses_title() {
        let input = BlogPostInput {
            title: "Hello".to_string(),
            slug: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(input.base_slug(), "hello");
    }

    #[test]
    fn test_input_validation() {
        let input: BlogPostInput = serde_json::from_str(r#"{"title": "Draft"}"#).unwrap();
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();

        assert!(fields.contains_key("content"));
        assert!(fields.contains_key("category"));
        assert!(!fields.contains_key("title"));
    }
}
