use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use super::client::{attachment_file_name, is_safe_name, AttachmentStore};
use crate::error::AppError;

/// URL prefix the uploads directory is served under.
pub const UPLOADS_ROUTE: &str = "uploads";

/// Filesystem implementation of AttachmentStore.
///
/// Files land directly in `root`; the returned reference is
/// `uploads/<name>`, matching the static route mounted by the router.
#[derive(Debug, Clone)]
pub struct LocalAttachmentStore {
    root: PathBuf,
}

impl LocalAttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    async fn store(&self, suggested_name: &str, content: Vec<u8>) -> Result<String, AppError> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::AttachmentStoreUnavailable(format!(
                "Failed to create {}: {e}",
                self.root.display()
            ))
        })?;

        let name = attachment_file_name(suggested_name);
        let path = self.root.join(&name);
        let size = content.len();

        fs::write(&path, content).await.map_err(|e| {
            AppError::AttachmentStoreUnavailable(format!("Failed to write {}: {e}", path.display()))
        })?;

        tracing::debug!(path = %path.display(), size, "Attachment stored");

        Ok(format!("{UPLOADS_ROUTE}/{name}"))
    }

    async fn fetch(&self, name: &str) -> Result<Option<Vec<u8>>, AppError> {
        if !is_safe_name(name) {
            return Ok(None);
        }

        match fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::AttachmentStoreUnavailable(format!(
                "Failed to read attachment '{name}': {e}"
            ))),
        }
    }
}
