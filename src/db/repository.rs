use async_trait::async_trait;

use crate::db::models::{ArchiveRecord, DocumentRecord};
use crate::error::AppError;

/// Persistence for the `documents` and `archives` collections.
///
/// This trait allows swapping the flat-file and database backends, and
/// mocking the persistence layer in tests. Every failure is reported as
/// `AppError::StoreUnavailable`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All active documents, newest `issuanceDate` first.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, AppError>;

    /// All archived documents, most recent `archivedAt` first.
    async fn list_archives(&self) -> Result<Vec<ArchiveRecord>, AppError>;

    /// Find an active document by id.
    async fn find_document(&self, id: &str) -> Result<Option<DocumentRecord>, AppError>;

    /// Insert the record, or shallow-merge it into the active document with
    /// the same id.
    async fn upsert_document(&self, record: DocumentRecord) -> Result<(), AppError>;

    /// Remove an active document and hand it back, if it exists.
    ///
    /// Remove-if-present is atomic: of two concurrent calls for the same id,
    /// at most one gets the record.
    async fn take_document(&self, id: &str) -> Result<Option<DocumentRecord>, AppError>;

    /// Delete an active document. Returns `false` if nothing matched.
    async fn delete_document(&self, id: &str) -> Result<bool, AppError>;

    /// Append a record to the archive collection.
    async fn insert_archive(&self, record: ArchiveRecord) -> Result<(), AppError>;
}

/// MongoDB implementation of the RecordStore.
///
/// Only available when the `managed` feature is enabled.
#[cfg(feature = "managed")]
pub struct MongoRecordStore {
    documents: mongodb::Collection<mongodb::bson::Document>,
    archives: mongodb::Collection<mongodb::bson::Document>,
}

#[cfg(feature = "managed")]
impl MongoRecordStore {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            documents: db.collection("documents"),
            archives: db.collection("archives"),
        }
    }

    /// Connect and ping the server, so a bad URI fails at startup rather
    /// than on the first request.
    pub async fn connect(config: &crate::config::MongoConfig) -> Result<Self, AppError> {
        use mongodb::bson::doc;

        let client = mongodb::Client::with_uri_str(&config.uri)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;
        let db = client.database(&config.database);

        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("MongoDB ping failed: {e}")))?;

        Ok(Self::new(&db))
    }

    async fn find_sorted(
        collection: &mongodb::Collection<mongodb::bson::Document>,
        sort_field: &str,
    ) -> Result<Vec<mongodb::bson::Document>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder().sort(doc! { sort_field: -1 }).build();

        let mut cursor = collection
            .find(doc! {})
            .with_options(options)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        let mut records = Vec::new();
        while let Some(raw) = cursor
            .try_next()
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?
        {
            records.push(raw);
        }

        Ok(records)
    }
}

#[cfg(feature = "managed")]
fn encode<T: serde::Serialize>(record: &T) -> Result<mongodb::bson::Document, AppError> {
    let mut raw = mongodb::bson::to_document(record)
        .map_err(|e| AppError::StoreUnavailable(format!("Failed to encode record: {e}")))?;
    // `_id` belongs to MongoDB; a caller-supplied one must not reach `$set`.
    raw.remove("_id");
    Ok(raw)
}

#[cfg(feature = "managed")]
fn decode_json(mut raw: mongodb::bson::Document) -> serde_json::Value {
    raw.remove("_id");
    mongodb::bson::Bson::Document(raw).into_relaxed_extjson()
}

#[cfg(feature = "managed")]
fn decode_document(raw: mongodb::bson::Document) -> Result<DocumentRecord, AppError> {
    DocumentRecord::from_value(decode_json(raw))
        .map_err(|e| AppError::StoreUnavailable(format!("Malformed stored document: {e}")))
}

#[cfg(feature = "managed")]
fn decode_archive(raw: mongodb::bson::Document) -> Result<ArchiveRecord, AppError> {
    serde_json::from_value(decode_json(raw))
        .map_err(|e| AppError::StoreUnavailable(format!("Malformed stored archive: {e}")))
}

#[cfg(feature = "managed")]
#[async_trait]
impl RecordStore for MongoRecordStore {
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, AppError> {
        let mut documents =
            Self::find_sorted(&self.documents, crate::db::models::ISSUANCE_DATE_FIELD)
                .await?
                .into_iter()
                .map(decode_document)
                .collect::<Result<Vec<_>, _>>()?;

        // BSON ranks mixed types differently (booleans last); re-sort with
        // the shared order. Same-type values are already in place.
        crate::db::models::sort_documents(&mut documents);
        Ok(documents)
    }

    async fn list_archives(&self) -> Result<Vec<ArchiveRecord>, AppError> {
        Self::find_sorted(&self.archives, crate::db::models::ARCHIVED_AT_FIELD)
            .await?
            .into_iter()
            .map(decode_archive)
            .collect()
    }

    async fn find_document(&self, id: &str) -> Result<Option<DocumentRecord>, AppError> {
        use mongodb::bson::doc;

        self.documents
            .find_one(doc! { "id": id })
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?
            .map(decode_document)
            .transpose()
    }

    async fn upsert_document(&self, record: DocumentRecord) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::UpdateOptions;

        let id = record.validate()?.to_string();
        let fields = encode(&record)?;
        let options = UpdateOptions::builder().upsert(true).build();

        // `$set` merges field by field, which is exactly the shallow merge.
        self.documents
            .update_one(doc! { "id": id.as_str() }, doc! { "$set": fields })
            .with_options(options)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    async fn take_document(&self, id: &str) -> Result<Option<DocumentRecord>, AppError> {
        use mongodb::bson::doc;

        self.documents
            .find_one_and_delete(doc! { "id": id })
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?
            .map(decode_document)
            .transpose()
    }

    async fn delete_document(&self, id: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .documents
            .delete_one(doc! { "id": id })
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(result.deleted_count > 0)
    }

    async fn insert_archive(&self, record: ArchiveRecord) -> Result<(), AppError> {
        self.archives
            .insert_one(encode(&record)?)
            .await
            .map_err(|e| AppError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }
}
