use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::db::models::{DocumentRecord, DocumentsResponse, MessageResponse};
use crate::error::AppError;
use crate::lifecycle::{Attachment, SaveRequest};

/// Multipart field carrying the JSON-encoded document.
pub const DOCUMENT_FIELD: &str = "document";
/// Multipart file field for the optional attachment.
pub const ATTACHMENT_FIELD: &str = "attachment";
/// Multipart field naming the document a renewal supersedes.
pub const ORIGINAL_DOC_ID_FIELD: &str = "originalDocId";

/// Axum handler for `GET /api/documents`.
pub async fn list_documents_handler(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, AppError> {
    Ok(Json(state.manager.list().await?))
}

/// Axum handler for `POST /api/documents`.
///
/// Accepts a multipart form with a `document` field (JSON object), an
/// optional `attachment` file and an optional `originalDocId`.
pub async fn save_document_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>, AppError> {
    let request = read_save_request(&mut multipart).await?;
    state.manager.save(request).await?;

    Ok(Json(MessageResponse::new("Document saved successfully")))
}

/// Axum handler for `DELETE /api/documents/{id}`.
pub async fn delete_document_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state.manager.delete(&id).await?;

    Ok(Json(MessageResponse::new("Document deleted successfully")))
}

async fn read_save_request(multipart: &mut Multipart) -> Result<SaveRequest, AppError> {
    let mut payload = None;
    let mut attachment = None;
    let mut original_doc_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Multipart error", e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            DOCUMENT_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Failed to read document", e))?;
                let value: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                    AppError::InvalidPayload(format!("Document is not valid JSON: {e}"))
                })?;
                payload = Some(DocumentRecord::from_value(value)?);
            }
            ATTACHMENT_FIELD => {
                if attachment.is_some() {
                    return Err(AppError::InvalidPayload(
                        "Only one attachment is allowed per request".into(),
                    ));
                }

                let file_name = field.file_name().unwrap_or("").to_string();
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read file", e))?;

                // Browsers send an empty, unnamed part when no file was chosen.
                if file_name.is_empty() && content.is_empty() {
                    continue;
                }

                attachment = Some(Attachment {
                    file_name,
                    content: content.to_vec(),
                });
            }
            ORIGINAL_DOC_ID_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Failed to read originalDocId", e))?;
                original_doc_id = Some(text);
            }
            _ => continue,
        }
    }

    let payload = payload.ok_or_else(|| {
        AppError::InvalidPayload(format!("Missing '{DOCUMENT_FIELD}' field"))
    })?;

    Ok(SaveRequest {
        payload,
        attachment,
        original_doc_id,
    })
}

/// Body-limit rejections surface as multipart errors; keep their 413.
fn multipart_error(context: &str, error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the upload limit".into())
    } else {
        AppError::InvalidPayload(format!("{context}: {error}"))
    }
}
