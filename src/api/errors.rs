use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::db::models::MessageResponse;
use crate::error::AppError;

/// Converts an `AppError` into a `{"message": ...}` JSON response.
///
/// Client errors echo their message. Server-side failures are logged and
/// answered with a generic message so no internal detail reaches the caller.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::InvalidPayload(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::StoreUnavailable(_)
            | AppError::AttachmentStoreUnavailable(_)
            | AppError::Config(_) => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, axum::Json(MessageResponse::new(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_keeps_message() {
        let response = AppError::NotFound("Document not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Document not found");
    }

    #[tokio::test]
    async fn test_invalid_payload_is_bad_request() {
        let response = AppError::InvalidPayload("Document id is required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_payload_too_large_is_413() {
        let response =
            AppError::PayloadTooLarge("Request body exceeds the upload limit".into()).into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            body_json(response).await["message"],
            "Request body exceeds the upload limit"
        );
    }

    #[tokio::test]
    async fn test_store_failure_hides_detail() {
        let response =
            AppError::StoreUnavailable("connection refused at 10.0.0.7:27017".into())
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        let message = body["message"].as_str().unwrap();
        assert!(!message.contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn test_attachment_failure_is_server_error() {
        let response =
            AppError::AttachmentStoreUnavailable("bucket missing".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
