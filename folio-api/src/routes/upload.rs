//! Image upload endpoint
//!
//! `POST /api/upload` (admin, `multipart/form-data`) takes one image in a
//! part named `file` or `image`. JPEG, PNG, GIF and WebP are accepted up to
//! the configured size. The response carries the public URL under
//! `/uploads/`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Json,
};
use folio_shared::storage::StoredFile;

/// Multipart part names accepted for the image
const FILE_FIELDS: [&str; 2] = ["file", "image"];

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Upload exceeds the maximum allowed size".to_string())
    } else {
        ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// # Errors
///
/// - `400 Bad Request`: no image part, or an unsupported file type
/// - `413 Payload Too Large`: the image exceeds the size limit
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<StoredFile>)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let is_file = field
            .name()
            .map(|name| FILE_FIELDS.contains(&name))
            .unwrap_or(false);
        if !is_file {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let original_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let stored = state.storage.save_image(&content_type, &bytes).await?;
        tracing::info!(
            filename = %stored.filename,
            original = original_name.as_deref().unwrap_or("-"),
            size = stored.size,
            "Image uploaded"
        );

        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(ApiError::BadRequest(
        "Expected a multipart field named \"file\" or \"image\"".to_string(),
    ))
}
