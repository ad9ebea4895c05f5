//! Flat-file record store.
//!
//! Each collection is a single JSON array on disk (`documents.json`,
//! `archives.json`), rewritten wholesale on every mutation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;

use crate::db::models::{sort_archives, sort_documents, ArchiveRecord, DocumentRecord};
use crate::db::repository::RecordStore;
use crate::error::AppError;

pub struct JsonFileRecordStore {
    documents_path: PathBuf,
    archives_path: PathBuf,
    /// Serialises read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileRecordStore {
    /// Open (and create, if needed) the data directory.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).await.map_err(|e| {
            AppError::StoreUnavailable(format!(
                "Failed to create data directory {}: {e}",
                data_dir.display()
            ))
        })?;

        tracing::info!(path = %data_dir.display(), "Using JSON file record store");

        Ok(Self {
            documents_path: data_dir.join("documents.json"),
            archives_path: data_dir.join("archives.json"),
            write_lock: Mutex::new(()),
        })
    }

    pub fn documents_path(&self) -> &Path {
        &self.documents_path
    }

    pub fn archives_path(&self) -> &Path {
        &self.archives_path
    }

    /// A missing or blank file is an empty collection.
    async fn read<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, AppError> {
        match fs::read(path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::StoreUnavailable(format!("Failed to parse {}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AppError::StoreUnavailable(format!(
                "Failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Write to a staging file and rename it into place, so readers never
    /// observe a half-written collection.
    async fn write<T: Serialize>(path: &Path, records: &[T]) -> Result<(), AppError> {
        let json = serde_json::to_vec_pretty(records).map_err(|e| {
            AppError::StoreUnavailable(format!("Failed to encode {}: {e}", path.display()))
        })?;

        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).await.map_err(|e| {
            AppError::StoreUnavailable(format!("Failed to write {}: {e}", staging.display()))
        })?;
        fs::rename(&staging, path).await.map_err(|e| {
            AppError::StoreUnavailable(format!("Failed to replace {}: {e}", path.display()))
        })?;

        tracing::debug!(path = %path.display(), records = records.len(), "Collection written");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, AppError> {
        let mut documents = Self::read::<DocumentRecord>(&self.documents_path).await?;
        sort_documents(&mut documents);
        Ok(documents)
    }

    async fn list_archives(&self) -> Result<Vec<ArchiveRecord>, AppError> {
        let mut archives = Self::read::<ArchiveRecord>(&self.archives_path).await?;
        sort_archives(&mut archives);
        Ok(archives)
    }

    async fn find_document(&self, id: &str) -> Result<Option<DocumentRecord>, AppError> {
        let documents = Self::read::<DocumentRecord>(&self.documents_path).await?;
        Ok(documents.into_iter().find(|doc| doc.id() == Some(id)))
    }

    async fn upsert_document(&self, record: DocumentRecord) -> Result<(), AppError> {
        let id = record.validate()?.to_string();

        let _guard = self.write_lock.lock().await;
        let mut documents = Self::read::<DocumentRecord>(&self.documents_path).await?;

        match documents.iter_mut().find(|doc| doc.id() == Some(id.as_str())) {
            Some(existing) => existing.merge(record),
            None => documents.push(record),
        }

        Self::write(&self.documents_path, &documents).await
    }

    async fn take_document(&self, id: &str) -> Result<Option<DocumentRecord>, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut documents = Self::read::<DocumentRecord>(&self.documents_path).await?;

        let Some(index) = documents.iter().position(|doc| doc.id() == Some(id)) else {
            return Ok(None);
        };
        let taken = documents.remove(index);

        Self::write(&self.documents_path, &documents).await?;
        Ok(Some(taken))
    }

    async fn delete_document(&self, id: &str) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let mut documents = Self::read::<DocumentRecord>(&self.documents_path).await?;

        let before = documents.len();
        documents.retain(|doc| doc.id() != Some(id));
        if documents.len() == before {
            return Ok(false);
        }

        Self::write(&self.documents_path, &documents).await?;
        Ok(true)
    }

    async fn insert_archive(&self, record: ArchiveRecord) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        let mut archives = Self::read::<ArchiveRecord>(&self.archives_path).await?;
        archives.push(record);
        Self::write(&self.archives_path, &archives).await
    }
}
