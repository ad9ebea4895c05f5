use std::cmp::Ordering;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

pub const ID_FIELD: &str = "id";
pub const ISSUANCE_DATE_FIELD: &str = "issuanceDate";
pub const ATTACHMENT_PATH_FIELD: &str = "attachmentPath";
pub const ARCHIVED_AT_FIELD: &str = "archivedAt";

/// A document in the active collection.
///
/// Apart from `id` (required), `issuanceDate` (ordering) and
/// `attachmentPath` (set on upload), every field is caller-defined and
/// stored as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRecord(Map<String, Value>);

impl DocumentRecord {
    /// Build a record from an arbitrary JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, AppError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(AppError::InvalidPayload(format!(
                "Document must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// The record id, if present and a string.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Check the record carries a usable id and storable field names, and
    /// return the id.
    ///
    /// Top-level names may not start with `$` or contain `.`: MongoDB reads
    /// those as operators and paths, not as plain fields.
    pub fn validate(&self) -> Result<&str, AppError> {
        if let Some(field) = self
            .0
            .keys()
            .find(|field| field.starts_with('$') || field.contains('.'))
        {
            return Err(AppError::InvalidPayload(format!(
                "Field name '{field}' may not start with '$' or contain '.'"
            )));
        }

        match self.0.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => Ok(id.as_str()),
            Some(Value::String(_)) => {
                Err(AppError::InvalidPayload("Document id cannot be empty".into()))
            }
            Some(_) => Err(AppError::InvalidPayload(
                "Document id must be a string".into(),
            )),
            None => Err(AppError::InvalidPayload("Document id is required".into())),
        }
    }

    pub fn issuance_date(&self) -> Option<&Value> {
        self.0.get(ISSUANCE_DATE_FIELD)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn set_attachment_path(&mut self, reference: impl Into<String>) {
        self.0.insert(
            ATTACHMENT_PATH_FIELD.to_string(),
            Value::String(reference.into()),
        );
    }

    /// Shallow merge: every field of `patch` overwrites the field of the same
    /// name here, fields missing from `patch` are kept.
    pub fn merge(&mut self, patch: DocumentRecord) {
        for (field, value) in patch.0 {
            self.0.insert(field, value);
        }
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// A superseded document, moved out of the active collection by a renewal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    #[serde(flatten)]
    pub document: DocumentRecord,
    /// Set by the manager when the document is archived.
    #[serde(rename = "archivedAt", with = "iso_millis")]
    pub archived_at: DateTime<Utc>,
}

impl ArchiveRecord {
    pub fn new(mut document: DocumentRecord, archived_at: DateTime<Utc>) -> Self {
        // The timestamp is owned by the archive step; a stale one on the
        // document would otherwise be serialised twice.
        document.remove(ARCHIVED_AT_FIELD);
        Self {
            document,
            archived_at: archived_at.trunc_subsecs(3),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.document.id()
    }
}

/// `archivedAt` is stored as RFC 3339 with fixed millisecond precision so
/// that string order matches time order in every backend.
mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| at.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Total order over `issuanceDate` values.
///
/// missing < null < bool < number < string < array < object. Strings compare
/// lexically, which orders ISO dates chronologically.
pub fn compare_issuance(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Object(_)) => 6,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Newest `issuanceDate` first. Stable, so ties keep their stored order.
pub fn sort_documents(documents: &mut [DocumentRecord]) {
    documents.sort_by(|a, b| compare_issuance(b.issuance_date(), a.issuance_date()));
}

/// Most recently archived first.
pub fn sort_archives(archives: &mut [ArchiveRecord]) {
    archives.sort_by(|a, b| b.archived_at.cmp(&a.archived_at));
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Body of `GET /api/documents`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentsResponse {
    pub documents: Vec<DocumentRecord>,
    pub archives: Vec<ArchiveRecord>,
}

/// Acknowledgement body used by mutating endpoints and errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(value: Value) -> DocumentRecord {
        DocumentRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_merge_overwrites_and_preserves() {
        let mut existing = record(json!({"id": "x", "a": 1, "title": "Old"}));
        existing.merge(record(json!({"id": "x", "b": 2, "title": "New"})));

        assert_eq!(
            Value::Object(existing.into_inner()),
            json!({"id": "x", "a": 1, "b": 2, "title": "New"})
        );
    }

    #[test]
    fn test_merge_is_shallow() {
        let mut existing = record(json!({"id": "x", "meta": {"a": 1, "b": 2}}));
        existing.merge(record(json!({"id": "x", "meta": {"c": 3}})));

        assert_eq!(existing.get("meta"), Some(&json!({"c": 3})));
    }

    #[test]
    fn test_validate_accepts_string_id() {
        let doc = record(json!({"id": "d1", "title": "Permit"}));
        assert_eq!(doc.validate().unwrap(), "d1");
    }

    #[test]
    fn test_validate_rejects_bad_ids() {
        for payload in [json!({"title": "no id"}), json!({"id": ""}), json!({"id": 42})] {
            match record(payload).validate() {
                Err(AppError::InvalidPayload(_)) => {}
                other => panic!("Expected InvalidPayload, got: {:?}", other),
            }
        }
    }

    #[test]
    fn test_validate_rejects_operator_and_path_names() {
        for payload in [
            json!({"id": "d1", "meta.title": "Permit"}),
            json!({"id": "d1", "$inc": {"count": 1}}),
        ] {
            match record(payload).validate() {
                Err(AppError::InvalidPayload(msg)) => assert!(msg.contains("Field name")),
                other => panic!("Expected InvalidPayload, got: {:?}", other),
            }
        }

        // Nested names are stored verbatim.
        let doc = record(json!({"id": "d1", "meta": {"a.b": 1}}));
        assert_eq!(doc.validate().unwrap(), "d1");
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        match DocumentRecord::from_value(json!(["id", "d1"])) {
            Err(AppError::InvalidPayload(msg)) => assert!(msg.contains("an array")),
            other => panic!("Expected InvalidPayload, got: {:?}", other),
        }
    }

    #[test]
    fn test_set_attachment_path_overwrites() {
        let mut doc = record(json!({"id": "d1", "attachmentPath": "uploads/old.pdf"}));
        doc.set_attachment_path("uploads/new.pdf");
        assert_eq!(doc.get(ATTACHMENT_PATH_FIELD), Some(&json!("uploads/new.pdf")));
    }

    #[test]
    fn test_archive_record_serializes_flat() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let archive = ArchiveRecord::new(
            record(json!({"id": "d1", "issuanceDate": "2024-01-01"})),
            at,
        );

        let value = serde_json::to_value(&archive).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "d1",
                "issuanceDate": "2024-01-01",
                "archivedAt": "2024-06-01T10:00:00.000Z"
            })
        );

        let back: ArchiveRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, archive);
        assert!(back.document.get(ARCHIVED_AT_FIELD).is_none());
    }

    #[test]
    fn test_archive_record_replaces_caller_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let archive = ArchiveRecord::new(
            record(json!({"id": "d1", "archivedAt": "1999-01-01T00:00:00.000Z"})),
            at,
        );

        let json = serde_json::to_string(&archive).unwrap();
        assert_eq!(json.matches("archivedAt").count(), 1);
        assert!(json.contains("2024-06-01T10:00:00.000Z"));
    }

    #[test]
    fn test_sort_documents_newest_first() {
        let mut docs = vec![
            record(json!({"id": "a", "issuanceDate": "2023-05-01"})),
            record(json!({"id": "b"})),
            record(json!({"id": "c", "issuanceDate": "2024-06-01"})),
            record(json!({"id": "d", "issuanceDate": "2024-01-15"})),
        ];
        sort_documents(&mut docs);

        let ids: Vec<&str> = docs.iter().filter_map(DocumentRecord::id).collect();
        assert_eq!(ids, vec!["c", "d", "a", "b"]);
    }

    #[test]
    fn test_compare_issuance_mixed_types() {
        assert_eq!(
            compare_issuance(Some(&json!(2)), Some(&json!(10))),
            Ordering::Less
        );
        assert_eq!(
            compare_issuance(Some(&json!(2024)), Some(&json!("2023-01-01"))),
            Ordering::Less
        );
        assert_eq!(compare_issuance(None, Some(&Value::Null)), Ordering::Less);
        assert_eq!(
            compare_issuance(Some(&json!(true)), Some(&json!(1))),
            Ordering::Less
        );
    }

    #[test]
    fn test_sort_documents_mixed_types() {
        let mut docs = vec![
            record(json!({"id": "flag", "issuanceDate": true})),
            record(json!({"id": "none"})),
            record(json!({"id": "date", "issuanceDate": "2024-01-01"})),
            record(json!({"id": "num", "issuanceDate": 20240101})),
        ];
        sort_documents(&mut docs);

        let ids: Vec<&str> = docs.iter().filter_map(DocumentRecord::id).collect();
        assert_eq!(ids, vec!["date", "num", "flag", "none"]);
    }

    #[test]
    fn test_sort_archives_most_recent_first() {
        let doc = record(json!({"id": "x"}));
        let mut archives = vec![
            ArchiveRecord::new(doc.clone(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ArchiveRecord::new(doc.clone(), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            ArchiveRecord::new(doc, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
        ];
        sort_archives(&mut archives);

        let months: Vec<u32> = archives
            .iter()
            .map(|a| chrono::Datelike::month(&a.archived_at))
            .collect();
        assert_eq!(months, vec![3, 2, 1]);
    }
}
