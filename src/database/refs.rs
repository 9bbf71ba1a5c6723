//! Collection and document references
//!
//! These mirror the shape of hosted document-database clients:
//! `db.collection("sessions").doc(id).get()` and `db.batch().delete(..).commit()`.

use super::snapshot::{DocumentSnapshot, QuerySnapshot};
use super::traits::{validate_segment, BatchOp, Document, DocumentDatabase, DocumentPath, SetOptions};
use crate::error::DatabaseResult;

/// Reference to a named collection
pub struct CollectionRef<'a, D: DocumentDatabase> {
    db: &'a D,
    name: String,
}

impl<'a, D: DocumentDatabase> CollectionRef<'a, D> {
    pub fn new(db: &'a D, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference a document of this collection
    pub fn doc(&self, id: &str) -> DocumentRef<'a, D> {
        DocumentRef {
            db: self.db,
            collection: self.name.clone(),
            id: id.to_string(),
        }
    }

    /// Read every document in the collection
    pub async fn get(&self) -> DatabaseResult<QuerySnapshot> {
        validate_segment(&self.name)?;
        self.db.list_documents(&self.name).await
    }
}

/// Reference to a single document
pub struct DocumentRef<'a, D: DocumentDatabase> {
    db: &'a D,
    collection: String,
    id: String,
}

impl<'a, D: DocumentDatabase> DocumentRef<'a, D> {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Validated path of this document
    pub fn path(&self) -> DatabaseResult<DocumentPath> {
        DocumentPath::new(&self.collection, &self.id)
    }

    pub async fn get(&self) -> DatabaseResult<DocumentSnapshot> {
        let path = self.path()?;
        self.db.get_document(&path).await
    }

    pub async fn set(&self, data: &Document, options: SetOptions) -> DatabaseResult<()> {
        let path = self.path()?;
        self.db.set_document(&path, data, options).await
    }

    pub async fn delete(&self) -> DatabaseResult<()> {
        let path = self.path()?;
        self.db.delete_document(&path).await
    }
}

/// Writes collected locally and committed in one atomic call
pub struct WriteBatch<'a, D: DocumentDatabase> {
    db: &'a D,
    ops: Vec<BatchOp>,
}

impl<'a, D: DocumentDatabase> WriteBatch<'a, D> {
    pub fn new(db: &'a D) -> Self {
        Self { db, ops: Vec::new() }
    }

    pub fn set(&mut self, path: DocumentPath, data: Document, options: SetOptions) -> &mut Self {
        self.ops.push(BatchOp::Set {
            path,
            data,
            options,
        });
        self
    }

    pub fn delete(&mut self, path: DocumentPath) -> &mut Self {
        self.ops.push(BatchOp::Delete { path });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply all queued writes, or none of them
    pub async fn commit(self) -> DatabaseResult<()> {
        tracing::debug!(ops = self.ops.len(), "committing write batch");
        self.db.commit_batch(self.ops).await
    }
}
