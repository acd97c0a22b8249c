//! Consultation booking endpoints
//!
//! - `POST /api/consultations` (public, rate limited) - validates, stores
//!   with status `new`, notifies the site owner by email
//! - `GET /api/consultations?status=&page=&limit=` (admin)
//! - `GET|DELETE /api/consultations/:id` (admin)
//! - `PATCH /api/consultations/:id/status` (admin) - status plus optional notes

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::{MessageResponse, Page, Pagination},
};
use axum::{extract::State, http::StatusCode, Json};
use folio_shared::{
    mail::notify::{consultation_notice, spawn_notification},
    models::consultation::{Consultation, ConsultationInput, ConsultationStatus, StatusUpdate},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Acknowledgement for a public submission
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub id: Uuid,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConsultationQuery {
    pub status: Option<ConsultationStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Public booking form
///
/// # Errors
///
/// - `422 Unprocessable Entity`: a required field (name, email, project type,
///   message) is missing or invalid; nothing is stored
pub async fn submit(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ConsultationInput>,
) -> ApiResult<(StatusCode, Json<SubmissionResponse>)> {
    input.validate()?;

    let consultation = Consultation::create(&state.db, &input).await?;
    tracing::info!(
        consultation_id = %consultation.id,
        project_type = %consultation.project_type,
        "Consultation request received"
    );

    if let Some(to) = &state.config.mail.notify_email {
        spawn_notification(state.mailer.clone(), consultation_notice(to, &consultation));
    }

    Ok((
        StatusCode::CREATED,
        Json(SubmissionResponse {
            id: consultation.id,
            message: "Thank you! We will get back to you shortly.".to_string(),
        }),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ConsultationQuery>,
) -> ApiResult<Json<Page<Consultation>>> {
    let pagination = Pagination {
        page: query.page,
        limit: query.limit,
    };

    let consultations = Consultation::list(
        &state.db,
        query.status,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    let total = Consultation::count(&state.db, query.status).await?;

    Ok(Json(Page::new(consultations, total, &pagination)))
}

pub async fn get_consultation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Consultation>> {
    let consultation = Consultation::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Consultation"))?;

    Ok(Json(consultation))
}

pub async fn update_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> ApiResult<Json<Consultation>> {
    let consultation = Consultation::update_status(&state.db, id, &update)
        .await?
        .ok_or_else(|| ApiError::not_found("Consultation"))?;

    tracing::info!(
        consultation_id = %id,
        status = consultation.status.as_str(),
        "Consultation status updated"
    );

    Ok(Json(consultation))
}

pub async fn delete_consultation(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !Consultation::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Consultation"));
    }

    Ok(Json(MessageResponse::new("Consultation deleted")))
}
