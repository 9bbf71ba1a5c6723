//! In-memory document database
//!
//! This is primarily for development and testing.
//! For production, use RedisDatabase, MongoDatabase or another persistent backend.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::snapshot::{DocumentSnapshot, QuerySnapshot};
use super::traits::{merge_document, BatchOp, Document, DocumentDatabase, DocumentPath, SetOptions};
use crate::error::{DatabaseError, DatabaseResult};

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// In-memory document database
///
/// Warning: This database is not suitable for production use because:
/// - Documents are lost on server restart
/// - Documents are not shared across multiple server instances
/// - Memory usage grows with number of documents
pub struct MemoryDatabase {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryDatabase {
    /// Create an empty memory database
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of documents in a collection
    pub fn document_count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryDatabase {
    fn clone(&self) -> Self {
        Self {
            collections: Arc::clone(&self.collections),
        }
    }
}

fn apply_set(collections: &mut Collections, path: &DocumentPath, data: &Document, options: SetOptions) {
    let documents = collections.entry(path.collection().to_string()).or_default();
    if options.merge {
        if let Some(existing) = documents.get_mut(path.id()) {
            merge_document(existing, data);
            return;
        }
    }
    documents.insert(path.id().to_string(), data.clone());
}

fn apply_delete(collections: &mut Collections, path: &DocumentPath) -> bool {
    let Some(documents) = collections.get_mut(path.collection()) else {
        return false;
    };
    let removed = documents.remove(path.id()).is_some();
    if documents.is_empty() {
        collections.remove(path.collection());
    }
    removed
}

#[async_trait]
impl DocumentDatabase for MemoryDatabase {
    async fn get_document(&self, path: &DocumentPath) -> DatabaseResult<DocumentSnapshot> {
        let collections = self.collections.read();
        let data = collections
            .get(path.collection())
            .and_then(|documents| documents.get(path.id()))
            .cloned();

        Ok(match data {
            Some(data) => DocumentSnapshot::found(path.clone(), data),
            None => DocumentSnapshot::missing(path.clone()),
        })
    }

    async fn set_document(
        &self,
        path: &DocumentPath,
        data: &Document,
        options: SetOptions,
    ) -> DatabaseResult<()> {
        apply_set(&mut self.collections.write(), path, data, options);
        Ok(())
    }

    async fn delete_document(&self, path: &DocumentPath) -> DatabaseResult<()> {
        if apply_delete(&mut self.collections.write(), path) {
            Ok(())
        } else {
            Err(DatabaseError::not_found(path.collection(), path.id()))
        }
    }

    async fn list_documents(&self, collection: &str) -> DatabaseResult<QuerySnapshot> {
        let collections = self.collections.read();
        let docs = match collections.get(collection) {
            Some(documents) => documents
                .iter()
                .map(|(id, data)| {
                    DocumentPath::new(collection, id)
                        .map(|path| DocumentSnapshot::found(path, data.clone()))
                })
                .collect::<DatabaseResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        Ok(QuerySnapshot::new(docs))
    }

    async fn commit_batch(&self, ops: Vec<BatchOp>) -> DatabaseResult<()> {
        // One write lock for the whole batch keeps it atomic to readers
        let mut collections = self.collections.write();
        for op in &ops {
            match op {
                BatchOp::Set {
                    path,
                    data,
                    options,
                } => apply_set(&mut collections, path, data, *options),
                BatchOp::Delete { path } => {
                    apply_delete(&mut collections, path);
                }
            }
        }
        Ok(())
    }
}
