//! Admin user model and database operations
//!
//! Admins sign in to the dashboard with email and password. Passwords are
//! stored as Argon2id hashes, never in plaintext.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE admin_users (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     email TEXT NOT NULL,               -- unique on LOWER(email)
//!     password_hash TEXT NOT NULL,
//!     name TEXT,
//!     last_login_at TIMESTAMPTZ,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Admin account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminUser {
    pub id: Uuid,

    /// Login email, unique case-insensitively
    pub email: String,

    /// Argon2id password hash, never serialized to clients
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub name: Option<String>,

    /// When the admin last logged in (None if never)
    pub last_login_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an admin
#[derive(Debug, Clone)]
pub struct CreateAdminUser {
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub name: Option<String>,
}

const COLUMNS: &str = "id, email, password_hash, name, last_login_at, created_at, updated_at";

impl AdminUser {
    /// Creates a new admin
    ///
    /// # Errors
    ///
    /// Fails with a unique violation on `admin_users_email_key` if the email
    /// is already taken.
    pub async fn create(pool: &PgPool, data: CreateAdminUser) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO admin_users (email, password_hash, name) VALUES ($1, $2, $3) RETURNING {}",
            COLUMNS
        );

        sqlx::query_as::<_, AdminUser>(&query)
            .bind(data.email.trim().to_lowercase())
            .bind(data.password_hash)
            .bind(data.name)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM admin_users WHERE id = $1", COLUMNS);

        sqlx::query_as::<_, AdminUser>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds an admin by email (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM admin_users WHERE LOWER(email) = LOWER($1)",
            COLUMNS
        );

        sqlx::query_as::<_, AdminUser>(&query)
            .bind(email.trim())
            .fetch_optional(pool)
            .await
    }

    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admin_users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Stamps `last_login_at` with the current time
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE admin_users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Replaces the password hash. Returns false if the admin does not exist.
    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE admin_users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
