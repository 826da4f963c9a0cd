//! Raw configuration items awaiting ingestion.

use serde_json::Value;

use crate::Metadata;

/// A `(class, value, metadata)` triple produced by a declaration parser.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeItem {
    class: String,
    value: Value,
    metadata: Metadata,
}

impl MergeItem {
    /// Construct an item without provenance metadata.
    #[must_use]
    pub fn new(class: impl Into<String>, value: Value) -> Self {
        Self {
            class: class.into(),
            value,
            metadata: Metadata::new(),
        }
    }

    /// Attach provenance metadata to the item.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the class name exactly as supplied.
    #[must_use]
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Returns the configuration value carried by the item.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the provenance metadata, empty when none was supplied.
    #[must_use]
    pub const fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Decompose the item into its class, value and metadata.
    #[must_use]
    pub fn into_parts(self) -> (String, Value, Metadata) {
        (self.class, self.value, self.metadata)
    }
}
