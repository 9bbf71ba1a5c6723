//! Session store backed by a document database
//!
//! Each session is one document in a single collection, keyed by session ID:
//! - Collection: `StoreOptions::collection` (default: "sessions")
//! - Document ID: the session ID
//! - Document fields: the session data, unchanged

use async_trait::async_trait;
use std::sync::Arc;

use super::SessionStore;
use crate::config::StoreOptions;
use crate::database::{CollectionRef, DocumentDatabase, SetOptions};
use crate::error::{DatabaseError, SessionError};
use crate::session::SessionData;

/// Session store backed by a document database
///
/// Options are fixed at construction. Every operation is a single request to
/// the database; errors from the database are returned unchanged.
///
/// # Example
///
/// ```rust,ignore
/// use docstore_session::{DocumentStore, MemoryDatabase, SessionStore, StoreOptions};
///
/// let store = DocumentStore::with_options(
///     MemoryDatabase::new(),
///     StoreOptions::new().with_collection("custom").with_merge(false),
/// );
/// store.set("u1", &data).await?;
/// ```
pub struct DocumentStore<D: DocumentDatabase> {
    db: Arc<D>,
    options: StoreOptions,
}

impl<D: DocumentDatabase> DocumentStore<D> {
    /// Create a store with default options
    ///
    /// - Collection: "sessions"
    /// - Merge: true
    pub fn new(db: D) -> Self {
        Self::with_options(db, StoreOptions::default())
    }

    /// Create a store with custom options
    pub fn with_options(db: D, options: StoreOptions) -> Self {
        Self::from_shared(Arc::new(db), options)
    }

    /// Create a store over a database handle shared with other code
    pub fn from_shared(db: Arc<D>, options: StoreOptions) -> Self {
        Self { db, options }
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn collection(&self) -> &str {
        &self.options.collection
    }

    pub fn merge(&self) -> bool {
        self.options.merge
    }

    fn sessions(&self) -> CollectionRef<'_, D> {
        self.db.collection(&self.options.collection)
    }

    fn set_options(&self) -> SetOptions {
        SetOptions {
            merge: self.options.merge,
        }
    }
}

impl<D: DocumentDatabase> Clone for DocumentStore<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            options: self.options.clone(),
        }
    }
}

/// Log a database error and pass it on unchanged
fn propagate(op: &'static str, err: DatabaseError) -> SessionError {
    tracing::warn!(op, error = %err, "session store operation failed");
    SessionError::Database(err)
}

#[async_trait]
impl<D: DocumentDatabase> SessionStore for DocumentStore<D> {
    async fn get(&self, sid: &str) -> Result<SessionData, SessionError> {
        tracing::debug!(collection = %self.options.collection, sid, "loading session");

        let snapshot = self
            .sessions()
            .doc(sid)
            .get()
            .await
            .map_err(|e| propagate("get", e))?;

        match snapshot.into_data() {
            Some(data) => Ok(SessionData::from(data)),
            None => Err(SessionError::NotFound),
        }
    }

    async fn set(&self, sid: &str, session: &SessionData) -> Result<(), SessionError> {
        tracing::debug!(
            collection = %self.options.collection,
            sid,
            merge = self.options.merge,
            "saving session"
        );

        self.sessions()
            .doc(sid)
            .set(session.as_document(), self.set_options())
            .await
            .map_err(|e| propagate("set", e))
    }

    async fn destroy(&self, sid: &str) -> Result<(), SessionError> {
        tracing::debug!(collection = %self.options.collection, sid, "destroying session");

        // A missing document is reported by the database and passed through
        self.sessions()
            .doc(sid)
            .delete()
            .await
            .map_err(|e| propagate("destroy", e))
    }

    /// Delete every session in one atomic batch.
    ///
    /// The collection is scanned first, so sessions written between the scan
    /// and the commit are not deleted. Cost grows with the collection size.
    async fn clear(&self) -> Result<(), SessionError> {
        let snapshot = self
            .sessions()
            .get()
            .await
            .map_err(|e| propagate("clear", e))?;

        let mut batch = self.db.batch();
        for doc in &snapshot {
            batch.delete(doc.reference().clone());
        }
        tracing::debug!(
            collection = %self.options.collection,
            count = batch.len(),
            "clearing sessions"
        );

        batch.commit().await.map_err(|e| propagate("clear", e))
    }

    /// Read every session in the collection. Cost grows with the collection size.
    async fn all(&self) -> Result<Vec<SessionData>, SessionError> {
        let snapshot = self
            .sessions()
            .get()
            .await
            .map_err(|e| propagate("all", e))?;

        Ok(snapshot
            .into_iter()
            .filter_map(|doc| doc.into_data())
            .map(SessionData::from)
            .collect())
    }

    async fn length(&self) -> Result<usize, SessionError> {
        let snapshot = self
            .sessions()
            .get()
            .await
            .map_err(|e| propagate("length", e))?;
        Ok(snapshot.len())
    }

    async fn ids(&self) -> Result<Vec<String>, SessionError> {
        let snapshot = self
            .sessions()
            .get()
            .await
            .map_err(|e| propagate("ids", e))?;
        Ok(snapshot.iter().map(|doc| doc.id().to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{BatchOp, Document, DocumentPath, DocumentSnapshot, MemoryDatabase, QuerySnapshot};
    use crate::error::DatabaseResult;
    use serde_json::json;

    fn data(value: serde_json::Value) -> SessionData {
        SessionData::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_document_store_basic() {
        let store = DocumentStore::new(MemoryDatabase::new());

        let mut session = SessionData::new();
        session.set("user", "alice").unwrap();

        // Set session
        store.set("test-id", &session).await.unwrap();

        // Get session
        let retrieved = store.get("test-id").await.unwrap();
        assert_eq!(retrieved, session);
        assert_eq!(retrieved.get::<String>("user"), Some("alice".to_string()));

        // Destroy session
        store.destroy("test-id").await.unwrap();
        let err = store.get("test-id").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound));
        assert_eq!(err.to_string(), "Session not found");
    }

    #[tokio::test]
    async fn test_defaults() {
        let store = DocumentStore::new(MemoryDatabase::new());
        assert_eq!(store.collection(), "sessions");
        assert!(store.merge());

        store.set("s1", &data(json!({"a": 1}))).await.unwrap();
        assert_eq!(store.database().document_count("sessions"), 1);
    }

    #[tokio::test]
    async fn test_get_unknown_session_is_not_found() {
        let store = DocumentStore::new(MemoryDatabase::new());
        let err = store.get("never-written").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound));
    }

    #[tokio::test]
    async fn test_destroy_unknown_session_is_not_found() {
        let store = DocumentStore::new(MemoryDatabase::new());
        let err = store.destroy("never-written").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            err,
            SessionError::Database(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_does_not_create() {
        let db = MemoryDatabase::new();
        let store = DocumentStore::new(db.clone());
        let _ = store.get("ghost").await;
        let _ = store.destroy("ghost").await;
        assert_eq!(db.document_count("sessions"), 0);
    }

    #[tokio::test]
    async fn test_merge_keeps_existing_fields() {
        let store = DocumentStore::new(MemoryDatabase::new());

        store.set("s", &data(json!({"a": 1}))).await.unwrap();
        store.set("s", &data(json!({"b": 2}))).await.unwrap();

        assert_eq!(store.get("s").await.unwrap(), data(json!({"a": 1, "b": 2})));
    }

    #[tokio::test]
    async fn test_merge_combines_nested_maps() {
        let store = DocumentStore::new(MemoryDatabase::new());

        store
            .set("s", &data(json!({"cookie": {"path": "/", "httpOnly": true}})))
            .await
            .unwrap();
        store.set("s", &data(json!({"cookie": {"maxAge": 10}}))).await.unwrap();

        assert_eq!(
            store.get("s").await.unwrap(),
            data(json!({"cookie": {"path": "/", "httpOnly": true, "maxAge": 10}}))
        );
    }

    #[tokio::test]
    async fn test_overwrite_replaces_document() {
        let store = DocumentStore::with_options(
            MemoryDatabase::new(),
            StoreOptions::new().with_merge(false),
        );
        assert_eq!(store.collection(), "sessions");

        store.set("s", &data(json!({"a": 1}))).await.unwrap();
        store.set("s", &data(json!({"b": 2}))).await.unwrap();

        assert_eq!(store.get("s").await.unwrap(), data(json!({"b": 2})));
    }

    #[tokio::test]
    async fn test_custom_collection_overwrite_scenario() {
        let db = MemoryDatabase::new();
        let store = DocumentStore::with_options(
            db.clone(),
            StoreOptions::new().with_collection("custom").with_merge(false),
        );

        store.set("u1", &data(json!({"name": "Ann"}))).await.unwrap();
        assert_eq!(store.get("u1").await.unwrap(), data(json!({"name": "Ann"})));

        store.set("u1", &data(json!({"age": 30}))).await.unwrap();
        assert_eq!(store.get("u1").await.unwrap(), data(json!({"age": 30})));

        assert_eq!(db.document_count("custom"), 1);
        assert_eq!(db.document_count("sessions"), 0);
    }

    #[tokio::test]
    async fn test_clear_then_all_is_empty() {
        let store = DocumentStore::new(MemoryDatabase::new());
        for i in 0..5 {
            store
                .set(&format!("s{}", i), &data(json!({"n": i})))
                .await
                .unwrap();
        }
        assert_eq!(store.all().await.unwrap().len(), 5);
        assert_eq!(store.length().await.unwrap(), 5);

        store.clear().await.unwrap();
        assert!(store.all().await.unwrap().is_empty());
        assert_eq!(store.length().await.unwrap(), 0);

        // Clearing an empty collection is fine
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_only_touches_own_collection() {
        let db = MemoryDatabase::new();
        let sessions = DocumentStore::new(db.clone());
        let other = DocumentStore::with_options(db.clone(), StoreOptions::new().with_collection("other"));

        sessions.set("a", &data(json!({}))).await.unwrap();
        other.set("b", &data(json!({}))).await.unwrap();

        sessions.clear().await.unwrap();
        assert_eq!(db.document_count("sessions"), 0);
        assert_eq!(other.ids().await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_all_and_ids() {
        let store = DocumentStore::new(MemoryDatabase::new());
        store.set("b", &data(json!({"v": "b"}))).await.unwrap();
        store.set("a", &data(json!({"v": "a"}))).await.unwrap();

        let mut ids = store.ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);

        let mut values: Vec<String> = store
            .all()
            .await
            .unwrap()
            .iter()
            .filter_map(|s| s.get::<String>("v"))
            .collect();
        values.sort();
        assert_eq!(values, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_data_is_stored_verbatim() {
        let db = MemoryDatabase::new();
        let store = DocumentStore::new(db.clone());
        let session = data(json!({
            "cookie": {"originalMaxAge": null, "httpOnly": true, "path": "/"},
            "cart": [{"sku": "x", "qty": 2}],
            "": "odd key",
        }));

        store.set("s", &session).await.unwrap();
        let raw = db
            .collection("sessions")
            .doc("s")
            .get()
            .await
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(&raw, session.as_document());
    }

    #[tokio::test]
    async fn test_clones_share_database() {
        let store = DocumentStore::new(MemoryDatabase::new());
        let clone = store.clone();
        store.set("s", &data(json!({"x": 1}))).await.unwrap();
        assert_eq!(clone.get("s").await.unwrap(), data(json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_invalid_session_id_propagates_database_error() {
        let store = DocumentStore::new(MemoryDatabase::new());
        let err = store.get("a/b").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Database(DatabaseError::InvalidPath(_))
        ));
    }

    /// Database whose every call fails with the same error
    struct FailingDatabase;

    fn unavailable() -> DatabaseError {
        DatabaseError::Encoding("backend unavailable".to_string())
    }

    #[async_trait]
    impl DocumentDatabase for FailingDatabase {
        async fn get_document(&self, _path: &DocumentPath) -> DatabaseResult<DocumentSnapshot> {
            Err(unavailable())
        }

        async fn set_document(
            &self,
            _path: &DocumentPath,
            _data: &Document,
            _options: SetOptions,
        ) -> DatabaseResult<()> {
            Err(unavailable())
        }

        async fn delete_document(&self, _path: &DocumentPath) -> DatabaseResult<()> {
            Err(unavailable())
        }

        async fn list_documents(&self, _collection: &str) -> DatabaseResult<QuerySnapshot> {
            Err(unavailable())
        }

        async fn commit_batch(&self, _ops: Vec<BatchOp>) -> DatabaseResult<()> {
            Err(unavailable())
        }
    }

    #[tokio::test]
    async fn test_database_errors_propagate_unchanged() {
        let store = DocumentStore::new(FailingDatabase);
        let session = data(json!({"a": 1}));

        let errors = vec![
            store.get("s").await.unwrap_err(),
            store.set("s", &session).await.unwrap_err(),
            store.destroy("s").await.unwrap_err(),
            store.clear().await.unwrap_err(),
            store.all().await.unwrap_err(),
            store.length().await.unwrap_err(),
            store.ids().await.unwrap_err(),
        ];
        for err in errors {
            assert!(!err.is_not_found());
            assert_eq!(err.to_string(), "Encoding error: backend unavailable");
        }
    }

    /// Database whose scan succeeds but whose batch commit fails
    struct CommitFails(MemoryDatabase);

    #[async_trait]
    impl DocumentDatabase for CommitFails {
        async fn get_document(&self, path: &DocumentPath) -> DatabaseResult<DocumentSnapshot> {
            self.0.get_document(path).await
        }

        async fn set_document(
            &self,
            path: &DocumentPath,
            data: &Document,
            options: SetOptions,
        ) -> DatabaseResult<()> {
            self.0.set_document(path, data, options).await
        }

        async fn delete_document(&self, path: &DocumentPath) -> DatabaseResult<()> {
            self.0.delete_document(path).await
        }

        async fn list_documents(&self, collection: &str) -> DatabaseResult<QuerySnapshot> {
            self.0.list_documents(collection).await
        }

        async fn commit_batch(&self, _ops: Vec<BatchOp>) -> DatabaseResult<()> {
            Err(unavailable())
        }
    }

    #[tokio::test]
    async fn test_failed_clear_deletes_nothing() {
        let db = MemoryDatabase::new();
        let store = DocumentStore::new(CommitFails(db.clone()));
        store.set("a", &data(json!({}))).await.unwrap();
        store.set("b", &data(json!({}))).await.unwrap();

        assert!(store.clear().await.is_err());
        assert_eq!(db.document_count("sessions"), 2);
    }

    /// Store implementing only the required operations
    struct MinimalStore;

    #[async_trait]
    impl SessionStore for MinimalStore {
        async fn get(&self, _sid: &str) -> Result<SessionData, SessionError> {
            Err(SessionError::NotFound)
        }

        async fn set(&self, _sid: &str, _session: &SessionData) -> Result<(), SessionError> {
            Ok(())
        }

        async fn destroy(&self, _sid: &str) -> Result<(), SessionError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_optional_operations_default_to_unsupported() {
        let store = MinimalStore;
        assert!(matches!(store.clear().await, Err(SessionError::Unsupported("clear"))));
        assert!(matches!(store.all().await, Err(SessionError::Unsupported("all"))));
        assert!(matches!(store.length().await, Err(SessionError::Unsupported("length"))));
        assert!(matches!(store.ids().await, Err(SessionError::Unsupported("ids"))));
    }
}
