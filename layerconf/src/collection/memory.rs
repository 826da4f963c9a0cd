//! Baseline mutable collection held in memory.

use std::sync::Arc;

use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use super::{
    ConfigCollection, ConfigMap, DeltaCollection, HistoryEntry, HistoryMap, Metadata, MetadataMap,
    MutableConfigCollection,
};
use crate::{
    ConfigError, ConfigResult, ConfigResultExt, Middleware, MiddlewarePipeline, Transformer,
    normalize_class,
};

/// Mutable class config stored in memory, with optional metadata and
/// history tracking.
///
/// Serialising a collection yields the JSON array
/// `[config, history, metadata, track_metadata]`. Middleware is runtime
/// wiring and is never part of that form; serialising a collection that has
/// middleware attached fails with [`ConfigError::MiddlewareSerialization`].
///
/// # Examples
///
/// ```rust
/// use layerconf::{ConfigCollection, MemoryCollection, Metadata, MutableConfigCollection};
/// use serde_json::json;
///
/// let mut config = MemoryCollection::new();
/// config.set("App\\Mailer", None, json!({"transport": "smtp"}), Metadata::new());
/// config.set("app\\mailer", Some("port"), json!(587), Metadata::new());
///
/// assert_eq!(config.get("APP\\MAILER", Some("port"), true)?, Some(json!(587)));
/// assert_eq!(config.get("app\\mailer", Some("missing"), true)?, None);
/// # Ok::<_, std::sync::Arc<layerconf::ConfigError>>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryCollection {
    config: ConfigMap,
    metadata: MetadataMap,
    history: HistoryMap,
    track_metadata: bool,
    middlewares: MiddlewarePipeline,
}

impl MemoryCollection {
    /// Create an empty collection without metadata tracking.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection, recording metadata and history when
    /// `track_metadata` is `true`.
    #[must_use]
    pub fn with_tracking(track_metadata: bool) -> Self {
        Self {
            track_metadata,
            ..Self::default()
        }
    }

    /// Create an untracked collection holding `config` verbatim.
    ///
    /// Keys are assumed to be normalized already, as they are in any map
    /// returned by [`ConfigCollection::get_all`].
    #[must_use]
    pub fn from_config(config: ConfigMap) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns `true` when metadata and history are being recorded.
    #[must_use]
    pub const fn is_tracking(&self) -> bool {
        self.track_metadata
    }

    /// Run `transformers` against this collection in order.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first transformer error.
    pub fn transform(&mut self, transformers: &[&dyn Transformer]) -> ConfigResult<()> {
        for transformer in transformers {
            transformer.transform(self)?;
        }
        Ok(())
    }

    /// Returns the middleware applied to resolved lookups.
    #[must_use]
    pub const fn middlewares(&self) -> &MiddlewarePipeline {
        &self.middlewares
    }

    /// Append `middleware` as the innermost layer of the pipeline.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Replace the whole middleware pipeline.
    pub fn set_middlewares(&mut self, middlewares: MiddlewarePipeline) {
        self.middlewares = middlewares;
    }

    /// Create an overlay for scoped edits that leave this collection intact.
    ///
    /// The overlay carries this collection's middleware, apart from layers
    /// that cache results.
    ///
    /// # Errors
    ///
    /// Never fails for an in-memory parent.
    pub fn nest(&self) -> ConfigResult<DeltaCollection<'_>> {
        DeltaCollection::new(self, self.middlewares.clone())
    }

    /// Encode the collection as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MiddlewareSerialization`] when middleware is
    /// attached, or [`ConfigError::Codec`] when encoding fails.
    pub fn to_blob(&self) -> ConfigResult<String> {
        if !self.middlewares.is_empty() {
            return Err(Arc::new(ConfigError::MiddlewareSerialization));
        }
        serde_json::to_string(self).into_config()
    }

    /// Decode a collection previously produced by [`Self::to_blob`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Codec`] when `blob` is not a valid encoding.
    pub fn from_blob(blob: &str) -> ConfigResult<Self> {
        serde_json::from_str(blob).into_config()
    }

    pub(crate) fn raw(&self, class: &str) -> Option<&Value> {
        self.config.get(class)
    }

    fn record_history(&mut self, class: &str) {
        if let (Some(value), Some(metadata)) = (self.config.get(class), self.metadata.get(class)) {
            let entry = HistoryEntry {
                value: value.clone(),
                metadata: metadata.clone(),
            };
            self.history
                .entry(class.to_owned())
                .or_default()
                .insert(0, entry);
        }
    }
}

impl ConfigCollection for MemoryCollection {
    fn class_config(&self, class: &str, include_middleware: bool) -> ConfigResult<Option<Value>> {
        let key = normalize_class(class);
        let Some(raw) = self.config.get(&key) else {
            return Ok(None);
        };
        if !include_middleware {
            return Ok(Some(raw.clone()));
        }
        self.middlewares.resolve(&key, &|requested| {
            Ok(self.config.get(&normalize_class(requested)).cloned())
        })
    }

    fn get_all(&self) -> ConfigResult<ConfigMap> {
        Ok(self.config.clone())
    }

    fn metadata(&self) -> ConfigResult<MetadataMap> {
        if !self.track_metadata {
            return Ok(MetadataMap::new());
        }
        Ok(self.metadata.clone())
    }

    fn history(&self) -> ConfigResult<HistoryMap> {
        if !self.track_metadata {
            return Ok(HistoryMap::new());
        }
        Ok(self.history.clone())
    }

    fn class_metadata(&self, class: &str) -> ConfigResult<Option<Metadata>> {
        if !self.track_metadata {
            return Ok(None);
        }
        Ok(self.metadata.get(&normalize_class(class)).cloned())
    }
}

impl MutableConfigCollection for MemoryCollection {
    fn set(&mut self, class: &str, field: Option<&str>, value: Value, metadata: Metadata) {
        let key = normalize_class(class);
        if self.track_metadata {
            self.record_history(&key);
            self.metadata.insert(key.clone(), metadata);
        }

        let Some(name) = field else {
            self.config.insert(key, value);
            return;
        };
        let slot = self
            .config
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        if let Value::Object(fields) = slot {
            fields.insert(name.to_owned(), value);
        }
    }

    fn remove(&mut self, class: &str, field: Option<&str>) {
        let key = normalize_class(class);
        match field {
            None => {
                self.config.shift_remove(&key);
            }
            Some(name) => {
                if let Some(Value::Object(fields)) = self.config.get_mut(&key) {
                    fields.shift_remove(name);
                }
            }
        }
    }

    fn remove_all(&mut self) {
        self.config.clear();
        self.metadata.clear();
        self.history.clear();
    }
}

impl Serialize for MemoryCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !self.middlewares.is_empty() {
            return Err(S::Error::custom(ConfigError::MiddlewareSerialization));
        }
        (&self.config, &self.history, &self.metadata, self.track_metadata).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MemoryCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (config, history, metadata, track_metadata): (ConfigMap, HistoryMap, MetadataMap, bool) =
            Deserialize::deserialize(deserializer)?;
        Ok(Self {
            config,
            metadata,
            history,
            track_metadata,
            middlewares: MiddlewarePipeline::new(),
        })
    }
}
