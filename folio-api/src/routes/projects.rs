//! Portfolio project endpoints
//!
//! Public:
//! - `GET /api/projects?category=&featured=`
//! - `GET /api/projects/featured?limit=`
//! - `GET /api/projects/:id`
//!
//! Admin:
//! - `POST /api/projects`, `PUT /api/projects/:id`, `DELETE /api/projects/:id`
//!
//! Client names of anonymous projects are removed from public responses.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::{is_admin_request, MessageResponse},
};
use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use folio_shared::models::project::{Project, ProjectFilter, ProjectInput};
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_FEATURED_LIMIT: i64 = 6;
const MAX_FEATURED_LIMIT: i64 = 24;

#[derive(Debug, Default, Deserialize)]
pub struct FeaturedQuery {
    pub limit: Option<i64>,
}

fn present(project: Project, admin: bool) -> Project {
    if admin {
        project
    } else {
        project.public_view()
    }
}

pub async fn list_projects(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(filter): ApiQuery<ProjectFilter>,
) -> ApiResult<Json<Vec<Project>>> {
    let admin = is_admin_request(&headers, &state);
    let projects = Project::list(&state.db, &filter).await?;

    Ok(Json(
        projects.into_iter().map(|p| present(p, admin)).collect(),
    ))
}

/// Featured projects for the homepage
pub async fn featured_projects(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FeaturedQuery>,
) -> ApiResult<Json<Vec<Project>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_FEATURED_LIMIT)
        .clamp(1, MAX_FEATURED_LIMIT);
    let projects = Project::list_featured(&state.db, limit).await?;

    Ok(Json(projects.into_iter().map(Project::public_view).collect()))
}

pub async fn get_project(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Project>> {
    let project = Project::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    Ok(Json(present(project, is_admin_request(&headers, &state))))
}

pub async fn create_project(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ProjectInput>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    input.check()?;

    let project = Project::create(&state.db, &input).await?;
    tracing::info!(project_id = %project.id, featured = project.featured, "Project created");

    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<ProjectInput>,
) -> ApiResult<Json<Project>> {
    input.check()?;

    let project = Project::update(&state.db, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    Ok(Json(project))
}

pub async fn delete_project(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !Project::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Project"));
    }

    tracing::info!(project_id = %id, "Project deleted");
    Ok(Json(MessageResponse::new("Project deleted")))
}
