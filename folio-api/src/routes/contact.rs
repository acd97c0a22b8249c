//! Contact form endpoints
//!
//! - `POST /api/contact` (public, rate limited)
//! - `GET /api/contact?unread=&page=&limit=` (admin)
//! - `PATCH /api/contact/:id/read`, `DELETE /api/contact/:id` (admin)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath, ApiQuery},
    routes::{consultations::SubmissionResponse, MessageResponse, Page, Pagination},
};
use axum::{extract::State, http::StatusCode, Json};
use folio_shared::{
    mail::notify::{contact_notice, spawn_notification},
    models::contact_message::{ContactInput, ContactMessage},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ContactQuery {
    #[serde(default)]
    pub unread: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn submit(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ContactInput>,
) -> ApiResult<(StatusCode, Json<SubmissionResponse>)> {
    input.validate()?;

    let message = ContactMessage::create(&state.db, &input).await?;
    tracing::info!(message_id = %message.id, "Contact message received");

    if let Some(to) = &state.config.mail.notify_email {
        spawn_notification(state.mailer.clone(), contact_notice(to, &message));
    }

    Ok((
        StatusCode::CREATED,
        Json(SubmissionResponse {
            id: message.id,
            message: "Message sent successfully".to_string(),
        }),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ContactQuery>,
) -> ApiResult<Json<Page<ContactMessage>>> {
    let pagination = Pagination {
        page: query.page,
        limit: query.limit,
    };

    let messages = ContactMessage::list(
        &state.db,
        query.unread,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    let total = if query.unread {
        ContactMessage::count_unread(&state.db).await?
    } else {
        ContactMessage::count(&state.db).await?
    };

    Ok(Json(Page::new(messages, total, &pagination)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ContactMessage>> {
    let message = ContactMessage::mark_read(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message"))?;

    Ok(Json(message))
}

pub async fn delete_message(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    if !ContactMessage::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Message"));
    }

    Ok(Json(MessageResponse::new("Message deleted")))
}
