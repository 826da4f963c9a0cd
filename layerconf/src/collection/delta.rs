//! Copy-on-write overlay over a parent collection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use super::{
    ConfigCollection, ConfigMap, HistoryMap, MemoryCollection, Metadata, MetadataMap,
    MutableConfigCollection,
};
use crate::{ConfigResult, Middleware, MiddlewarePipeline, normalize_class};

/// Scoped, locally modifiable view of a parent collection.
///
/// On creation the overlay copies the parent's raw config into a private
/// store; later changes to the parent's raw config are never visible through
/// it. Resolved lookups for classes the overlay has not altered are
/// delegated to the parent, so they keep using whatever caching the parent
/// provides. Altered classes are resolved through the overlay's own
/// middleware, from which layers that cache results are dropped.
///
/// The overlay borrows its parent, which must outlive it.
///
/// # Examples
///
/// ```rust
/// use layerconf::{ConfigCollection, MemoryCollection, Metadata, MutableConfigCollection};
/// use serde_json::json;
///
/// let mut base = MemoryCollection::new();
/// base.set("mailer", None, json!({"transport": "smtp"}), Metadata::new());
///
/// let mut scoped = base.nest()?;
/// scoped.set("mailer", Some("transport"), json!("null"), Metadata::new());
///
/// assert_eq!(scoped.get("mailer", Some("transport"), true)?, Some(json!("null")));
/// assert_eq!(base.get("mailer", Some("transport"), true)?, Some(json!("smtp")));
/// # Ok::<_, std::sync::Arc<layerconf::ConfigError>>(())
/// ```
pub struct DeltaCollection<'p> {
    parent: &'p dyn ConfigCollection,
    store: MemoryCollection,
    altered: HashSet<String>,
    resolved: Mutex<HashMap<String, Option<Value>>>,
}

impl<'p> DeltaCollection<'p> {
    /// Snapshot `parent` and resolve altered classes through `middlewares`.
    ///
    /// Layers that cache results are left out of the overlay's pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error when the parent's raw config cannot be read.
    pub fn new(
        parent: &'p dyn ConfigCollection,
        middlewares: MiddlewarePipeline,
    ) -> ConfigResult<Self> {
        let mut store = MemoryCollection::from_config(parent.get_all()?);
        store.set_middlewares(middlewares.without_caches());
        Ok(Self {
            parent,
            store,
            altered: HashSet::new(),
            resolved: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the collection this overlay was created from.
    #[must_use]
    pub const fn parent(&self) -> &'p dyn ConfigCollection {
        self.parent
    }

    /// Returns `true` when `class` has been set or removed on this overlay.
    #[must_use]
    pub fn is_altered(&self, class: &str) -> bool {
        self.altered.contains(&normalize_class(class))
    }

    /// Returns the middleware used for altered classes.
    #[must_use]
    pub const fn middlewares(&self) -> &MiddlewarePipeline {
        self.store.middlewares()
    }

    /// Append `middleware` to the pipeline used for altered classes.
    ///
    /// A layer that caches results is ignored.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        if middleware.caches_results() {
            debug!("caching middleware ignored on config overlay");
            return;
        }
        self.store.add_middleware(middleware);
        self.resolved.get_mut().clear();
    }

    /// Replace the pipeline used for altered classes, dropping layers that
    /// cache results.
    pub fn set_middlewares(&mut self, middlewares: MiddlewarePipeline) {
        self.store.set_middlewares(middlewares.without_caches());
        self.resolved.get_mut().clear();
    }

    /// Create a further overlay on top of this one.
    ///
    /// # Errors
    ///
    /// Infallible in practice; kept fallible to match other parents.
    pub fn nest(&self) -> ConfigResult<DeltaCollection<'_>> {
        DeltaCollection::new(self, self.store.middlewares().clone())
    }

    fn alter(&mut self, key: &str) {
        self.resolved.get_mut().remove(key);
        self.altered.insert(key.to_owned());
    }
}

impl ConfigCollection for DeltaCollection<'_> {
    fn class_config(&self, class: &str, include_middleware: bool) -> ConfigResult<Option<Value>> {
        let key = normalize_class(class);
        let Some(raw) = self.store.raw(&key) else {
            return Ok(None);
        };
        if !include_middleware {
            return Ok(Some(raw.clone()));
        }
        if let Some(cached) = self.resolved.lock().get(&key) {
            return Ok(cached.clone());
        }

        let resolved = if self.altered.contains(&key) {
            self.store.class_config(&key, true)?
        } else {
            self.parent.get(&key, None, true)?
        };
        self.resolved.lock().insert(key, resolved.clone());
        Ok(resolved)
    }

    fn get_all(&self) -> ConfigResult<ConfigMap> {
        self.store.get_all()
    }

    fn metadata(&self) -> ConfigResult<MetadataMap> {
        self.store.metadata()
    }

    fn history(&self) -> ConfigResult<HistoryMap> {
        self.store.history()
    }
}

impl MutableConfigCollection for DeltaCollection<'_> {
    fn set(&mut self, class: &str, field: Option<&str>, value: Value, metadata: Metadata) {
        self.alter(&normalize_class(class));
        self.store.set(class, field, value, metadata);
    }

    fn remove(&mut self, class: &str, field: Option<&str>) {
        self.alter(&normalize_class(class));
        self.store.remove(class, field);
    }

    fn remove_all(&mut self) {
        self.store.remove_all();
        self.resolved.get_mut().clear();
    }
}
