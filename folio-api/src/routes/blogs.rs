//! Blog endpoints
//!
//! Public:
//! - `GET /api/blogs?category=&tag=&page=&limit=` - published posts
//! - `GET /api/blogs/categories` - categories with published post counts
//! - `GET /api/blogs/:slug` - one published post; counts a view
//!
//! Admin:
//! - `GET /api/admin/blogs`, `GET /api/admin/blogs/:id` - includes drafts
//! - `POST /api/blogs`, `PUT /api/blogs/:id`, `DELETE /api/blogs/:id`
//!
//! Slugs come from the explicit `slug` field or the title and are made
//! unique with a numeric suffix (`my-post`, `my-post-2`, ...).

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::{MessageResponse, Page, Pagination},
};
use axum::{extract::State, http::StatusCode, Json};
use folio_shared::models::blog_post::{BlogFilter, BlogPost, BlogPostInput, CategoryCount};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct BlogListQuery {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl BlogListQuery {
    fn filter(&self) -> BlogFilter {
        BlogFilter {
            category: self.category.clone(),
            tag: self.tag.clone(),
        }
    }

    fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

pub async fn list_published(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BlogListQuery>,
) -> ApiResult<Json<Page<BlogPost>>> {
    let filter = query.filter();
    let pagination = query.pagination();

    let posts =
        BlogPost::list_published(&state.db, &filter, pagination.limit(), pagination.offset())
            .await?;
    let total = BlogPost::count_published(&state.db, &filter).await?;

    Ok(Json(Page::new(posts, total, &pagination)))
}

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<CategoryCount>>> {
    Ok(Json(BlogPost::categories(&state.db).await?))
}

/// Published post by slug; unpublished and unknown slugs are both 404
pub async fn get_by_slug(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> ApiResult<Json<BlogPost>> {
    let post = BlogPost::view_published(&state.db, &slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog post"))?;

    Ok(Json(post))
}

pub async fn list_all(
    State(state): State<AppState>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> ApiResult<Json<Page<BlogPost>>> {
    let posts = BlogPost::list_all(&state.db, pagination.limit(), pagination.offset()).await?;
    let total = BlogPost::count_all(&state.db).await?;

    Ok(Json(Page::new(posts, total, &pagination)))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<BlogPost>> {
    let post = BlogPost::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog post"))?;

    Ok(Json(post))
}

pub async fn create_post(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<BlogPostInput>,
) -> ApiResult<(StatusCode, Json<BlogPost>)> {
    input.validate()?;

    let slug = BlogPost::unique_slug(&state.db, &input.base_slug(), None).await?;
    let post = BlogPost::create(&state.db, &input, &slug).await?;

    tracing::info!(post_id = %post.id, slug = %post.slug, published = post.published, "Blog post created");

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<BlogPostInput>,
) -> ApiResult<Json<BlogPost>> {
    input.validate()?;

    if BlogPost::find_by_id(&state.db, id).await?.is_none() {
        return Err(ApiError::not_found("Blog post"));
    }

    let slug = BlogPost::unique_slug(&state.db, &input.base_slug(), Some(id)).await?;
    let post = BlogPost::update(&state.db, id, &input, &slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Blog post"))?;

    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !BlogPost::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Blog post"));
    }

    tracing::info!(post_id = %id, "Blog post deleted");
    Ok(Json(MessageResponse::new("Blog post deleted")))
}
