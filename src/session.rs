//! Session data stored as one document per session

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::database::Document;
use crate::error::SessionError;

/// Field mapping of a session record.
///
/// The store never inspects or validates the fields; whatever the
/// application puts in is written to the session's document as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionData(Document);

impl SessionData {
    /// Create empty session data
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build session data from a JSON value, which must be an object
    pub fn from_value(value: Value) -> Result<Self, SessionError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(SessionError::Serialization(format!(
                "session data must be an object, got {}",
                other
            ))),
        }
    }

    /// Get a value from session data
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.0.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get the raw JSON value for a key
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a value in session data
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), SessionError> {
        let v = serde_json::to_value(value)?;
        self.0.insert(key.to_string(), v);
        Ok(())
    }

    /// Remove a value from session data
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Check if a key exists
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Clear all session data
    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrow the underlying document fields
    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

impl From<Document> for SessionData {
    fn from(document: Document) -> Self {
        Self(document)
    }
}

impl From<SessionData> for Value {
    fn from(data: SessionData) -> Self {
        Value::Object(data.0)
    }
}

impl FromIterator<(String, Value)> for SessionData {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
