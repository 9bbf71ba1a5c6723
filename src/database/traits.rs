//! Document database trait

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

use super::refs::{CollectionRef, WriteBatch};
use super::snapshot::{DocumentSnapshot, QuerySnapshot};
use crate::error::{DatabaseError, DatabaseResult};

/// Fields of a single document
pub type Document = Map<String, Value>;

/// Options for a document write
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Keep existing fields that the write does not mention, merging nested
    /// maps key by key (see [`merge_document`]). When false the document is
    /// replaced.
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }

    pub fn overwrite() -> Self {
        Self { merge: false }
    }
}

/// Validated location of a document: collection name plus document ID
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    collection: String,
    id: String,
}

impl DocumentPath {
    /// Build a path, rejecting segments a document database cannot address
    pub fn new(collection: &str, id: &str) -> DatabaseResult<Self> {
        validate_segment(collection)?;
        validate_segment(id)?;
        Ok(Self {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Check a collection name or document ID.
///
/// Segments must be non-empty, must not contain `/` and must not be `.` or `..`.
pub fn validate_segment(segment: &str) -> DatabaseResult<()> {
    if segment.is_empty() || segment == "." || segment == ".." || segment.contains('/') {
        return Err(DatabaseError::InvalidPath(segment.to_string()));
    }
    Ok(())
}

/// Merge `data` into `target` the way a merge write does.
///
/// A non-empty map merges into a stored map key by key, at any depth. Every
/// other value, an empty map included, replaces what is stored under its key.
pub fn merge_document(target: &mut Document, data: &Document) {
    for (key, value) in data {
        if let Value::Object(incoming) = value {
            if !incoming.is_empty() {
                if let Some(Value::Object(existing)) = target.get_mut(key) {
                    merge_document(existing, incoming);
                    continue;
                }
            }
        }
        target.insert(key.clone(), value.clone());
    }
}

/// A single write queued in a batch
#[derive(Clone, Debug, PartialEq)]
pub enum BatchOp {
    Set {
        path: DocumentPath,
        data: Document,
        options: SetOptions,
    },
    /// Deletes are unconditional: a missing document is not an error
    Delete { path: DocumentPath },
}

/// Client interface of a document database.
///
/// Documents live in named collections and are addressed by ID. Backends
/// report deleting a missing document as [`DatabaseError::NotFound`] and apply
/// a batch all-or-nothing.
#[async_trait]
pub trait DocumentDatabase: Send + Sync + 'static {
    /// Read one document. A missing document yields a snapshot with no data.
    async fn get_document(&self, path: &DocumentPath) -> DatabaseResult<DocumentSnapshot>;

    /// Create or update one document
    async fn set_document(
        &self,
        path: &DocumentPath,
        data: &Document,
        options: SetOptions,
    ) -> DatabaseResult<()>;

    /// Delete one document
    async fn delete_document(&self, path: &DocumentPath) -> DatabaseResult<()>;

    /// Read every document of a collection
    async fn list_documents(&self, collection: &str) -> DatabaseResult<QuerySnapshot>;

    /// Apply a group of writes atomically
    async fn commit_batch(&self, ops: Vec<BatchOp>) -> DatabaseResult<()>;

    /// Reference a collection by name
    fn collection(&self, name: &str) -> CollectionRef<'_, Self>
    where
        Self: Sized,
    {
        CollectionRef::new(self, name)
    }

    /// Start an empty write batch
    fn batch(&self) -> WriteBatch<'_, Self>
    where
        Self: Sized,
    {
        WriteBatch::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_path() {
        let path = DocumentPath::new("sessions", "abc-123").unwrap();
        assert_eq!(path.collection(), "sessions");
        assert_eq!(path.id(), "abc-123");
        assert_eq!(path.to_string(), "sessions/abc-123");
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_merge_document_nested_maps() {
        let mut stored = doc(serde_json::json!({
            "cookie": {"path": "/", "httpOnly": true, "opts": {"a": 1}},
            "user": "ann",
        }));
        merge_document(
            &mut stored,
            &doc(serde_json::json!({"cookie": {"maxAge": 10, "opts": {"b": 2}}, "views": 1})),
        );

        assert_eq!(
            stored,
            doc(serde_json::json!({
                "cookie": {"path": "/", "httpOnly": true, "maxAge": 10, "opts": {"a": 1, "b": 2}},
                "user": "ann",
                "views": 1,
            }))
        );
    }

    #[test]
    fn test_merge_document_replaces_non_maps() {
        let mut stored = doc(serde_json::json!({"a": {"x": 1}, "b": 5, "c": [1, 2], "d": {"y": 2}}));
        merge_document(
            &mut stored,
            &doc(serde_json::json!({"a": {}, "b": {"z": 3}, "c": [3], "d": null})),
        );

        assert_eq!(
            stored,
            doc(serde_json::json!({"a": {}, "b": {"z": 3}, "c": [3], "d": null}))
        );
    }

    #[test]
    fn test_invalid_segments() {
        for bad in ["", ".", "..", "a/b"] {
            assert!(matches!(
                DocumentPath::new("sessions", bad),
                Err(DatabaseError::InvalidPath(_))
            ));
            assert!(DocumentPath::new(bad, "id").is_err());
        }
    }
}
