use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::app::AppState;
use crate::error::AppError;

/// Axum handler for `GET /api/attachments/{name}`.
///
/// Serves an attachment from the configured store, with a content type
/// inferred from the file extension.
pub async fn serve_attachment_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let data = state
        .manager
        .attachments()
        .fetch(&name)
        .await?
        .ok_or_else(|| AppError::NotFound("Attachment not found".into()))?;

    let content_type = mime_guess::from_path(&name).first_or_octet_stream();

    Ok(([(header::CONTENT_TYPE, content_type.to_string())], data).into_response())
}
