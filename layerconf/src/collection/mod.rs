//! Config collections: the stores that hold class config and answer lookups.
//!
//! Every collection keys classes by their case-folded name (see
//! [`crate::normalize_class`]) and exposes two views of a class:
//!
//! - the raw view (`include_middleware = false`), which is the stored ground
//!   truth and is what middleware and overlays read to avoid recursion;
//! - the resolved view (`include_middleware = true`), which passes the raw
//!   value through the collection's middleware pipeline.
//!
//! Absence is always reported as `Ok(None)`. A stored JSON `null` is present
//! and comes back as `Ok(Some(Value::Null))`.

mod cached;
mod delta;
mod memory;

pub use cached::{CACHE_KEY, CachingCollection, CachingCollectionBuilder, CollectionFactory};
pub use delta::DeltaCollection;
pub use memory::MemoryCollection;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ConfigResult, merge_array, normalize_class};

/// Raw config keyed by normalized class name.
pub type ConfigMap = Map<String, Value>;

/// Provenance data recorded alongside a class. Empty means "no metadata".
pub type Metadata = Map<String, Value>;

/// Metadata keyed by normalized class name.
pub type MetadataMap = BTreeMap<String, Metadata>;

/// Superseded values keyed by normalized class name, most recent first.
pub type HistoryMap = BTreeMap<String, Vec<HistoryEntry>>;

/// A value and its metadata as they were before being overwritten.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The superseded class value.
    pub value: Value,
    /// The metadata recorded with the superseded value.
    pub metadata: Metadata,
}

/// Read access to a collection of class config.
pub trait ConfigCollection: Send + Sync {
    /// Resolve the whole config for `class`.
    ///
    /// Implementations fold `class` to its canonical case themselves.
    ///
    /// # Errors
    ///
    /// Returns an error when middleware or a backing cache fails.
    fn class_config(&self, class: &str, include_middleware: bool) -> ConfigResult<Option<Value>>;

    /// Fetch the config for `class`, or a single `field` of it.
    ///
    /// # Errors
    ///
    /// Returns an error when middleware or a backing cache fails.
    fn get(
        &self,
        class: &str,
        field: Option<&str>,
        include_middleware: bool,
    ) -> ConfigResult<Option<Value>> {
        let config = self.class_config(class, include_middleware)?;
        Ok(match field {
            None => config,
            Some(name) => config.and_then(|value| field_value(value, name)),
        })
    }

    /// Returns `true` when `class` (or `field` within it) is present.
    ///
    /// # Errors
    ///
    /// Returns an error when middleware or a backing cache fails.
    fn exists(
        &self,
        class: &str,
        field: Option<&str>,
        include_middleware: bool,
    ) -> ConfigResult<bool> {
        Ok(self.get(class, field, include_middleware)?.is_some())
    }

    /// Returns a copy of every raw class value.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be read.
    fn get_all(&self) -> ConfigResult<ConfigMap>;

    /// Returns recorded metadata, empty unless tracking is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be read.
    fn metadata(&self) -> ConfigResult<MetadataMap>;

    /// Returns recorded history, empty unless tracking is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be read.
    fn history(&self) -> ConfigResult<HistoryMap>;

    /// Returns the metadata recorded for a single class.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be read.
    fn class_metadata(&self, class: &str) -> ConfigResult<Option<Metadata>> {
        Ok(self.metadata()?.remove(&normalize_class(class)))
    }
}

/// Write access to a collection of class config.
pub trait MutableConfigCollection: ConfigCollection {
    /// Store `value` for `class`, or for `field` within `class`.
    ///
    /// Setting a field creates the class object when it is missing and
    /// replaces a non-object class value with a fresh object.
    fn set(&mut self, class: &str, field: Option<&str>, value: Value, metadata: Metadata);

    /// Remove `class`, or only `field` within it.
    fn remove(&mut self, class: &str, field: Option<&str>);

    /// Remove every class together with any metadata and history.
    fn remove_all(&mut self);

    /// Merge `value` over the existing raw value at `class`/`field`.
    ///
    /// Containers merge with [`merge_array`]; anything else replaces the
    /// existing value.
    ///
    /// # Errors
    ///
    /// Returns an error when the existing raw value cannot be read.
    fn merge(&mut self, class: &str, field: Option<&str>, value: Value) -> ConfigResult<()> {
        let merged = match self.get(class, field, false)? {
            Some(existing) => merge_array(value, existing),
            None => value,
        };
        self.set(class, field, merged, Metadata::new());
        Ok(())
    }
}

fn field_value(value: Value, field: &str) -> Option<Value> {
    match value {
        Value::Object(mut map) => map.remove(field),
        _ => None,
    }
}
