//! Session store configuration

/// Collection used when none is configured
pub const DEFAULT_COLLECTION: &str = "sessions";

/// Options for a document-backed session store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// Name of the collection holding one document per session (default: "sessions")
    pub collection: String,

    /// Whether writes merge into an existing document (default: true).
    /// When false, each write replaces the whole document.
    pub merge: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            merge: true,
        }
    }
}

impl StoreOptions {
    /// Create options with the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the collection name (default: "sessions")
    pub fn with_collection<S: Into<String>>(mut self, collection: S) -> Self {
        self.collection = collection.into();
        self
    }

    /// Set the merge flag (default: true)
    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = StoreOptions::default();
        assert_eq!(options.collection, "sessions");
        assert!(options.merge);
    }

    #[test]
    fn test_overrides_are_independent() {
        let options = StoreOptions::new().with_merge(false);
        assert_eq!(options.collection, DEFAULT_COLLECTION);
        assert!(!options.merge);

        let options = StoreOptions::new().with_collection("custom");
        assert_eq!(options.collection, "custom");
        assert!(options.merge);
    }
}
