use thiserror::Error;

/// Application-wide error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Attachment store unavailable: {0}")]
    AttachmentStoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
