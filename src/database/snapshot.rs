//! Read results returned by a document database

use super::traits::{Document, DocumentPath};

/// Result of reading one document
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    path: DocumentPath,
    data: Option<Document>,
}

impl DocumentSnapshot {
    /// Snapshot of an existing document
    pub fn found(path: DocumentPath, data: Document) -> Self {
        Self {
            path,
            data: Some(data),
        }
    }

    /// Snapshot of a document that does not exist
    pub fn missing(path: DocumentPath) -> Self {
        Self { path, data: None }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn id(&self) -> &str {
        self.path.id()
    }

    /// Path of the document, usable in a write batch
    pub fn reference(&self) -> &DocumentPath {
        &self.path
    }

    pub fn data(&self) -> Option<&Document> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<Document> {
        self.data
    }
}

/// Result of reading a whole collection
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuerySnapshot {
    docs: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn new(docs: Vec<DocumentSnapshot>) -> Self {
        Self { docs }
    }

    pub fn docs(&self) -> &[DocumentSnapshot] {
        &self.docs
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentSnapshot> {
        self.docs.iter()
    }
}

impl IntoIterator for QuerySnapshot {
    type Item = DocumentSnapshot;
    type IntoIter = std::vec::IntoIter<DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.into_iter()
    }
}

impl<'a> IntoIterator for &'a QuerySnapshot {
    type Item = &'a DocumentSnapshot;
    type IntoIter = std::slice::Iter<'a, DocumentSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.iter()
    }
}
