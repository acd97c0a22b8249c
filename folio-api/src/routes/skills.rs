//! Skill endpoints
//!
//! `GET /api/skills` is public and ordered by category, then display order.
//! Writes are admin only.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    routes::MessageResponse,
};
use axum::{extract::State, http::StatusCode, Json};
use folio_shared::models::skill::{Skill, SkillInput};
use uuid::Uuid;
use validator::Validate;

pub async fn list_skills(State(state): State<AppState>) -> ApiResult<Json<Vec<Skill>>> {
    Ok(Json(Skill::list(&state.db).await?))
}

pub async fn create_skill(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<SkillInput>,
) -> ApiResult<(StatusCode, Json<Skill>)> {
    input.validate()?;

    let skill = Skill::create(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(skill)))
}

pub async fn update_skill(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<SkillInput>,
) -> ApiResult<Json<Skill>> {
    input.validate()?;

    let skill = Skill::update(&state.db, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Skill"))?;

    Ok(Json(skill))
}

pub async fn delete_skill(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !Skill::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Skill"));
    }

    tracing::info!(skill_id = %id, "Skill deleted");
    Ok(Json(MessageResponse::new("Skill deleted")))
}
