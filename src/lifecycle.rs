//! Document lifecycle: list, save (create / update / renew), delete.
//!
//! The manager is stateless. Persistence and blob storage are injected, and
//! every collaborator failure propagates unchanged to the caller.

use std::sync::Arc;

use chrono::Utc;

use crate::db::models::{ArchiveRecord, DocumentRecord, DocumentsResponse};
use crate::db::repository::RecordStore;
use crate::error::AppError;
use crate::storage::client::AttachmentStore;

/// A file accompanying a save call.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Client-side file name, used to derive the stored name.
    pub file_name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub payload: DocumentRecord,
    pub attachment: Option<Attachment>,
    /// Set on a renewal: the active document the payload supersedes.
    pub original_doc_id: Option<String>,
}

impl SaveRequest {
    pub fn new(payload: DocumentRecord) -> Self {
        Self {
            payload,
            attachment: None,
            original_doc_id: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn renewing(mut self, original_doc_id: impl Into<String>) -> Self {
        self.original_doc_id = Some(original_doc_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Id of the saved document.
    pub id: String,
    /// Id of the document moved to the archive, if a renewal archived one.
    pub archived: Option<String>,
}

#[derive(Clone)]
pub struct DocumentManager {
    records: Arc<dyn RecordStore>,
    attachments: Arc<dyn AttachmentStore>,
}

impl DocumentManager {
    pub fn new(records: Arc<dyn RecordStore>, attachments: Arc<dyn AttachmentStore>) -> Self {
        Self {
            records,
            attachments,
        }
    }

    pub fn attachments(&self) -> &dyn AttachmentStore {
        self.attachments.as_ref()
    }

    /// Both collections, each newest first.
    pub async fn list(&self) -> Result<DocumentsResponse, AppError> {
        let (documents, archives) =
            tokio::try_join!(self.records.list_documents(), self.records.list_archives())?;

        Ok(DocumentsResponse {
            documents,
            archives,
        })
    }

    /// Create, update or renew a document.
    ///
    /// Steps run in order and commit independently: store the attachment,
    /// archive the original (renewal only), upsert the payload. A failure
    /// leaves the earlier steps in place.
    pub async fn save(&self, request: SaveRequest) -> Result<SaveOutcome, AppError> {
        let SaveRequest {
            mut payload,
            attachment,
            original_doc_id,
        } = request;

        let id = payload.validate()?.to_string();

        if let Some(attachment) = attachment {
            let reference = self
                .attachments
                .store(&attachment.file_name, attachment.content)
                .await?;
            payload.set_attachment_path(reference);
        }

        let archived = match original_doc_id.filter(|original| !original.is_empty()) {
            Some(original_id) => self.archive(&original_id).await?,
            None => None,
        };

        self.records.upsert_document(payload).await?;

        tracing::info!(id = %id, archived = ?archived, "Document saved");

        Ok(SaveOutcome { id, archived })
    }

    /// Move an active document into the archive collection.
    ///
    /// A missing original is not an error: the renewal degrades to a plain
    /// save and only a warning is logged.
    async fn archive(&self, original_id: &str) -> Result<Option<String>, AppError> {
        let Some(original) = self.records.take_document(original_id).await? else {
            tracing::warn!(original_id, "Renewal target not found, saving without archiving");
            return Ok(None);
        };

        let record = ArchiveRecord::new(original.clone(), Utc::now());
        if let Err(e) = self.records.insert_archive(record).await {
            // The original is already out of `documents`; put it back rather
            // than lose it.
            tracing::error!(original_id, error = %e, "Archive insert failed, restoring original");
            if let Err(restore_err) = self.records.upsert_document(original).await {
                tracing::error!(
                    original_id,
                    error = %restore_err,
                    "Failed to restore original document"
                );
            }
            return Err(e);
        }

        tracing::info!(original_id, "Document archived");
        Ok(Some(original_id.to_string()))
    }

    /// Remove a document from the active collection. Archives are untouched.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        if self.records.delete_document(id).await? {
            tracing::info!(id, "Document deleted");
            Ok(())
        } else {
            Err(AppError::NotFound("Document not found".into()))
        }
    }
}
