//! The cache-pool capability consumed by the caching layers.
//!
//! The crate never implements a pool itself. Callers inject one backed by
//! whatever store suits them. Items are fetched, filled and saved either
//! immediately or as deferred writes that land on the next commit.

use crate::ConfigResult;

/// A single entry fetched from, or destined for, a [`CachePool`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheItem {
    key: String,
    value: Option<String>,
    hit: bool,
}

impl CacheItem {
    /// An item for `key` that was not found in the pool.
    #[must_use]
    pub fn miss(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
            hit: false,
        }
    }

    /// An item for `key` that was found in the pool holding `value`.
    #[must_use]
    pub fn hit(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            hit: true,
        }
    }

    /// Returns the key this item is stored under.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` when the lookup that produced this item found a value.
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        self.hit
    }

    /// Returns the stored value, if any.
    #[must_use]
    pub fn get(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Replace the value to be written when the item is saved.
    ///
    /// The hit flag still describes the original lookup.
    pub fn set(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    /// Decompose the item into its key and value.
    #[must_use]
    pub fn into_parts(self) -> (String, Option<String>) {
        (self.key, self.value)
    }
}

/// Persistent key/value store used for caching resolved configuration.
///
/// Implementations decide where items live; every method may perform I/O
/// and reports failures as [`crate::ConfigError::Pool`]. No retries happen at
/// this layer.
pub trait CachePool: Send + Sync {
    /// Fetch the item stored under `key`, or a miss.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be read.
    fn get_item(&self, key: &str) -> ConfigResult<CacheItem>;

    /// Persist `item` immediately.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be written.
    fn save(&self, item: CacheItem) -> ConfigResult<()>;

    /// Queue `item` to be persisted by the next [`CachePool::commit`].
    ///
    /// # Errors
    ///
    /// Returns an error when the item cannot be queued.
    fn save_deferred(&self, item: CacheItem) -> ConfigResult<()>;

    /// Persist every queued item.
    ///
    /// # Errors
    ///
    /// Returns an error when any queued item cannot be written.
    fn commit(&self) -> ConfigResult<()>;

    /// Remove every item from the pool.
    ///
    /// # Errors
    ///
    /// Returns an error when the store cannot be cleared.
    fn clear(&self) -> ConfigResult<()>;
}

/// Normalize a class name into a key accepted by strict pool backends.
///
/// Backslash namespace separators are reserved by some key formats, so they
/// become commas; the key is also lowercased.
///
/// # Examples
///
/// ```rust
/// use layerconf::normalize_cache_key;
///
/// assert_eq!(normalize_cache_key("App\\Model\\Page"), "app,model,page");
/// ```
#[must_use]
pub fn normalize_cache_key(class: &str) -> String {
    class.to_ascii_lowercase().replace('\\', ",")
}
