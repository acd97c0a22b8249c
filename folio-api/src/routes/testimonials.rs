//! Testimonial endpoints
//!
//! Public `GET /api/testimonials` returns active testimonials, best rated
//! first, with anonymous ones stripped of name and photo. The admin routes
//! see every testimonial unaltered.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    routes::MessageResponse,
};
use axum::{extract::State, http::StatusCode, Json};
use folio_shared::models::testimonial::{Testimonial, TestimonialInput};
use uuid::Uuid;
use validator::Validate;

pub async fn list_active(State(state): State<AppState>) -> ApiResult<Json<Vec<Testimonial>>> {
    let testimonials = Testimonial::list_active(&state.db).await?;

    Ok(Json(
        testimonials
            .into_iter()
            .map(Testimonial::public_view)
            .collect(),
    ))
}

pub async fn list_all(State(state): State<AppState>) -> ApiResult<Json<Vec<Testimonial>>> {
    Ok(Json(Testimonial::list_all(&state.db).await?))
}

pub async fn get_testimonial(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Testimonial>> {
    let testimonial = Testimonial::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Testimonial"))?;

    Ok(Json(testimonial))
}

pub async fn create_testimonial(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<TestimonialInput>,
) -> ApiResult<(StatusCode, Json<Testimonial>)> {
    input.validate()?;

    let testimonial = Testimonial::create(&state.db, &input).await?;
    tracing::info!(testimonial_id = %testimonial.id, rating = testimonial.rating, "Testimonial created");

    Ok((StatusCode::CREATED, Json(testimonial)))
}

pub async fn update_testimonial(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<TestimonialInput>,
) -> ApiResult<Json<Testimonial>> {
    input.validate()?;

    let testimonial = Testimonial::update(&state.db, id, &input)
        .await?
        .ok_or_else(|| ApiError::not_found("Testimonial"))?;

    Ok(Json(testimonial))
}

pub async fn delete_testimonial(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !Testimonial::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Testimonial"));
    }

    Ok(Json(MessageResponse::new("Testimonial deleted")))
}
