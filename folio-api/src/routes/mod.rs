//! API route handlers, one module per resource
//!
//! - `health`: health check
//! - `auth`: admin login, token refresh, profile, password change
//! - `projects`, `blogs`, `testimonials`, `skills`: site content
//! - `consultations`, `contact`, `newsletter`: public submissions and their
//!   admin views
//! - `campaigns`: newsletter campaigns, open/click tracking
//! - `analytics`: visitor tracking and the admin summary
//! - `dashboard`: admin overview
//! - `upload`: image uploads

pub mod analytics;
pub mod auth;
pub mod blogs;
pub mod campaigns;
pub mod consultations;
pub mod contact;
pub mod dashboard;
pub mod health;
pub mod newsletter;
pub mod projects;
pub mod skills;
pub mod testimonials;
pub mod upload;

use crate::app::AppState;
use axum::http::HeaderMap;
use folio_shared::auth::middleware::authenticate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?page=&limit=` query parameters (1-based page)
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// One page of results
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        let limit = pagination.limit();
        Self {
            items,
            total,
            page: pagination.page(),
            limit,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// Plain acknowledgement body
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// True when a public route is called with a valid admin token
///
/// Public reads use this to skip anonymisation for the admin panel.
pub fn is_admin_request(headers: &HeaderMap, state: &AppState) -> bool {
    authenticate(headers, state.jwt_secret()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamps() {
        let default = Pagination::default();
        assert_eq!(default.page(), 1);
        assert_eq!(default.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(default.offset(), 0);

        let odd = Pagination {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(odd.page(), 1);
        assert_eq!(odd.limit(), MAX_PAGE_SIZE);

        let third = Pagination {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(third.offset(), 20);
    }

    #[test]
    fn test_page_total_pages() {
        let pagination = Pagination {
            page: Some(1),
            limit: Some(10),
        };
        assert_eq!(Page::<i32>::new(vec![], 0, &pagination).total_pages, 0);
        assert_eq!(Page::<i32>::new(vec![], 10, &pagination).total_pages, 1);
        assert_eq!(Page::<i32>::new(vec![], 11, &pagination).total_pages, 2);
    }
}
