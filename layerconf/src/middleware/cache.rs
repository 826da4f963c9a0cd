//! Per-class persistent caching of middleware-resolved config.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use super::{Middleware, Next};
use crate::{CachePool, ConfigResult, ConfigResultExt, normalize_cache_key};

/// Caches the output of the inner layers for each class, both in memory and
/// in a [`CachePool`].
///
/// Place it before the middleware whose output should be cached: every layer
/// after it runs only on a cache miss. Each class is stored under its own
/// key, so invalidating one class does not discard the others.
///
/// Overlays created with `nest` leave this layer out of their pipeline.
pub struct CacheMiddleware {
    pool: Arc<dyn CachePool>,
    memory: Mutex<HashMap<String, Option<Value>>>,
}

impl CacheMiddleware {
    /// Create the middleware over `pool`, clearing the pool first when
    /// `flush` is `true`.
    ///
    /// # Errors
    ///
    /// Returns the pool's error when clearing fails.
    pub fn new(pool: Arc<dyn CachePool>, flush: bool) -> ConfigResult<Self> {
        if flush {
            pool.clear()?;
        }
        Ok(Self {
            pool,
            memory: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the pool backing this middleware.
    #[must_use]
    pub const fn pool(&self) -> &Arc<dyn CachePool> {
        &self.pool
    }

    fn remember(&self, key: String, result: Option<Value>) {
        self.memory.lock().insert(key, result);
    }
}

impl Middleware for CacheMiddleware {
    fn class_config(&self, class: &str, next: Next<'_>) -> ConfigResult<Option<Value>> {
        let key = normalize_cache_key(class);
        if let Some(hit) = self.memory.lock().get(&key) {
            trace!(key = %key, "class config served from memory");
            return Ok(hit.clone());
        }

        let mut item = self.pool.get_item(&key)?;
        if item.is_hit()
            && let Some(blob) = item.get()
        {
            trace!(key = %key, "class config served from cache pool");
            let result: Option<Value> = serde_json::from_str(blob).into_config()?;
            self.remember(key, result.clone());
            return Ok(result);
        }

        let result = next.call(class)?;
        item.set(serde_json::to_string(&result).into_config()?);
        self.pool.save(item)?;
        self.remember(key, result.clone());
        Ok(result)
    }

    fn caches_results(&self) -> bool {
        true
    }
}
