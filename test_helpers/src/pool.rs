//! Recording cache pool backed by a map.
//!
//! # Examples
//!
//! ```
//! use layerconf::{CacheItem, CachePool};
//! use layerconf_test_helpers::MemoryPool;
//!
//! let pool = MemoryPool::new();
//! pool.save_deferred(CacheItem::hit("k", "v")).ok();
//! assert_eq!(pool.stored("k"), None);
//! pool.commit().ok();
//! assert_eq!(pool.stored("k").as_deref(), Some("v"));
//! assert_eq!(pool.calls().commit, 1);
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use layerconf::{CacheItem, CachePool, ConfigError, ConfigResult};
use parking_lot::Mutex;

/// Number of times each pool operation has been invoked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolCalls {
    /// Calls to [`CachePool::get_item`].
    pub get_item: usize,
    /// Calls to [`CachePool::save`].
    pub save: usize,
    /// Calls to [`CachePool::save_deferred`].
    pub save_deferred: usize,
    /// Calls to [`CachePool::commit`].
    pub commit: usize,
    /// Calls to [`CachePool::clear`].
    pub clear: usize,
}

/// In-memory [`CachePool`] that records how it is used.
///
/// Deferred items become visible only after a successful commit; deferring
/// a key that is already queued replaces the queued item. Commit failures
/// can be injected with [`MemoryPool::fail_commits`].
#[derive(Debug, Default)]
pub struct MemoryPool {
    entries: Mutex<BTreeMap<String, String>>,
    deferred: Mutex<Vec<CacheItem>>,
    calls: Mutex<PoolCalls>,
    fail_commit: AtomicBool,
}

impl MemoryPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key` without recording a call.
    pub fn prime(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().insert(key.into(), value.into());
    }

    /// Returns the committed value stored under `key`.
    #[must_use]
    pub fn stored(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Returns the keys of all committed entries in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Returns the number of deferred items awaiting commit.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.deferred.lock().len()
    }

    /// Returns a snapshot of the call counters.
    #[must_use]
    pub fn calls(&self) -> PoolCalls {
        *self.calls.lock()
    }

    /// Make every subsequent commit fail while `fail` is `true`.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commit.store(fail, Ordering::SeqCst);
    }

    fn store(&self, item: CacheItem) {
        if let (key, Some(value)) = item.into_parts() {
            self.entries.lock().insert(key, value);
        }
    }
}

impl CachePool for MemoryPool {
    fn get_item(&self, key: &str) -> ConfigResult<CacheItem> {
        self.calls.lock().get_item += 1;
        Ok(self
            .stored(key)
            .map_or_else(|| CacheItem::miss(key), |value| CacheItem::hit(key, value)))
    }

    fn save(&self, item: CacheItem) -> ConfigResult<()> {
        self.calls.lock().save += 1;
        self.store(item);
        Ok(())
    }

    fn save_deferred(&self, item: CacheItem) -> ConfigResult<()> {
        self.calls.lock().save_deferred += 1;
        let mut deferred = self.deferred.lock();
        deferred.retain(|queued| queued.key() != item.key());
        deferred.push(item);
        Ok(())
    }

    fn commit(&self) -> ConfigResult<()> {
        self.calls.lock().commit += 1;
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(ConfigError::pool_arc("commit", "", "injected commit failure"));
        }
        let pending: Vec<CacheItem> = self.deferred.lock().drain(..).collect();
        for item in pending {
            self.store(item);
        }
        Ok(())
    }

    fn clear(&self) -> ConfigResult<()> {
        self.calls.lock().clear += 1;
        self.entries.lock().clear();
        self.deferred.lock().clear();
        Ok(())
    }
}
