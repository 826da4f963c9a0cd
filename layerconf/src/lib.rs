//! Core crate for the `layerconf` configuration engine.
//!
//! Configuration is grouped by class: each class name maps to a config
//! value, usually an object of fields. The crate provides:
//!
//! - [`merge_array`] and [`merge_items`], the priority merge that layers
//!   declarations over one another;
//! - [`MemoryCollection`], the mutable store populated by [`Transformer`]s;
//! - [`MiddlewarePipeline`], which decorates per-class lookups;
//! - [`DeltaCollection`], a copy-on-write overlay for scoped edits;
//! - [`CachingCollection`] and [`CacheMiddleware`], which memoize results in
//!   an injected [`CachePool`].
//!
//! # Example
//!
//! ```rust
//! use layerconf::{ConfigCollection, MemoryCollection, MergeComposer};
//! use serde_json::json;
//!
//! let mut base = MergeComposer::new();
//! base.push_value("Mailer", json!({"transport": "smtp", "hosts": ["mx1"]}));
//! let mut site = MergeComposer::new();
//! site.push_value("mailer", json!({"hosts": ["mx2"]}));
//!
//! let mut config = MemoryCollection::new();
//! config.transform(&[&base, &site])?;
//!
//! let hosts = config.get("MAILER", Some("hosts"), true)?;
//! assert_eq!(hosts, Some(json!(["mx1", "mx2"])));
//! # Ok::<_, std::sync::Arc<layerconf::ConfigError>>(())
//! ```

use std::sync::Arc;

mod collection;
mod error;
mod merge;
pub mod middleware;
mod pool;
mod result_ext;
mod transform;

pub use collection::{
    CACHE_KEY, CachingCollection, CachingCollectionBuilder, CollectionFactory, ConfigCollection,
    ConfigMap, DeltaCollection, HistoryEntry, HistoryMap, MemoryCollection, Metadata, MetadataMap,
    MutableConfigCollection,
};
pub use error::ConfigError;
pub use merge::{MergeItem, merge_array, merge_items};
pub use middleware::{
    CacheMiddleware, ExtensionMiddleware, ExtensionSource, Middleware, MiddlewarePipeline, Next,
};
pub use pool::{CacheItem, CachePool, normalize_cache_key};
pub use result_ext::ConfigResultExt;
pub use transform::{MergeComposer, Transformer};

/// Result alias used throughout the crate.
///
/// Errors are shared behind an [`Arc`] so cached failures can be handed to
/// several callers.
pub type ConfigResult<T> = Result<T, Arc<ConfigError>>;

/// Normalize a class name to the canonical case used for storage and lookup.
///
/// # Examples
///
/// ```rust
/// assert_eq!(layerconf::normalize_class("App\\Model\\Page"), "app\\model\\page");
/// ```
#[must_use]
pub fn normalize_class(class: &str) -> String {
    class.to_ascii_lowercase()
}
