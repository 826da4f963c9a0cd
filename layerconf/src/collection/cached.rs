//! Persistent caching of a whole collection behind a [`CachePool`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    ConfigCollection, ConfigMap, DeltaCollection, HistoryMap, MemoryCollection, MetadataMap,
};
use crate::{
    CacheItem, CachePool, ConfigError, ConfigResult, Middleware, MiddlewarePipeline, normalize_class,
};

/// Pool key under which the whole collection is cached.
pub const CACHE_KEY: &str = "__CONFIG__";

/// Builds a fully populated collection when the cache misses.
pub type CollectionFactory = Box<dyn Fn() -> ConfigResult<MemoryCollection> + Send + Sync>;

/// Builder for [`CachingCollection`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use layerconf::{CachePool, CachingCollection, ConfigCollection, MemoryCollection};
///
/// # fn run(pool: Arc<dyn CachePool>) -> layerconf::ConfigResult<()> {
/// let config = CachingCollection::builder(pool, || Ok(MemoryCollection::new()))
///     .flush(false)
///     .build()?;
/// let mailer = config.get("mailer", None, true)?;
/// config.close()?;
/// # let _ = mailer;
/// # Ok(())
/// # }
/// ```
pub struct CachingCollectionBuilder {
    pool: Arc<dyn CachePool>,
    factory: CollectionFactory,
    flush: bool,
    middlewares: MiddlewarePipeline,
    nested_middlewares: MiddlewarePipeline,
}

impl CachingCollectionBuilder {
    /// Start a builder over `pool`, building fresh collections with `factory`.
    #[must_use]
    pub fn new<F>(pool: Arc<dyn CachePool>, factory: F) -> Self
    where
        F: Fn() -> ConfigResult<MemoryCollection> + Send + Sync + 'static,
    {
        Self {
            pool,
            factory: Box::new(factory),
            flush: false,
            middlewares: MiddlewarePipeline::new(),
            nested_middlewares: MiddlewarePipeline::new(),
        }
    }

    /// Clear the pool on build and ignore any cached collection.
    #[must_use]
    pub const fn flush(mut self, flush: bool) -> Self {
        self.flush = flush;
        self
    }

    /// Append request-scoped middleware applied on top of the cached
    /// collection.
    #[must_use]
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Append middleware handed to overlays created by
    /// [`CachingCollection::nest`].
    #[must_use]
    pub fn nested_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.nested_middlewares.push(middleware);
        self
    }

    /// Finish the builder.
    ///
    /// # Errors
    ///
    /// Returns the pool's error when `flush` is set and clearing fails.
    pub fn build(self) -> ConfigResult<CachingCollection> {
        if self.flush {
            debug!("flushing config cache pool");
            self.pool.clear()?;
        }
        Ok(CachingCollection {
            pool: self.pool,
            factory: self.factory,
            flush: self.flush,
            dirty: AtomicBool::new(false),
            amended: AtomicBool::new(false),
            collection: Mutex::new(None),
            middlewares: self.middlewares,
            nested_middlewares: self.nested_middlewares,
            resolved: Mutex::new(HashMap::new()),
        })
    }
}

/// Collection cached as a single blob in a [`CachePool`].
///
/// The underlying [`MemoryCollection`] is loaded from the pool under
/// [`CACHE_KEY`] or, on a miss, built by the factory and queued as a
/// deferred write. A queued write marks the collection dirty; call
/// [`Self::close`] (or use [`Self::scoped`]) to commit it. Setup code may
/// change the collection with [`Self::amend`] before then; the amended state
/// replaces the queued write when the collection is closed. Dropping a dirty
/// collection logs a warning and discards the pending write.
///
/// Resolved lookups run this collection's own middleware over the cached raw
/// config, so the cached blob never contains context-dependent results.
pub struct CachingCollection {
    pool: Arc<dyn CachePool>,
    factory: CollectionFactory,
    flush: bool,
    dirty: AtomicBool,
    amended: AtomicBool,
    collection: Mutex<Option<Arc<MemoryCollection>>>,
    middlewares: MiddlewarePipeline,
    nested_middlewares: MiddlewarePipeline,
    resolved: Mutex<HashMap<(String, bool), Option<Value>>>,
}

impl CachingCollection {
    /// Start building a caching collection over `pool`.
    #[must_use]
    pub fn builder<F>(pool: Arc<dyn CachePool>, factory: F) -> CachingCollectionBuilder
    where
        F: Fn() -> ConfigResult<MemoryCollection> + Send + Sync + 'static,
    {
        CachingCollectionBuilder::new(pool, factory)
    }

    /// Returns the cached collection, loading or building it on first use.
    ///
    /// Every call in a process returns the same instance. The factory runs
    /// at most once, and only when the pool misses or flushing is enabled.
    /// The factory runs while the build slot is locked, so it must not read
    /// from this collection.
    ///
    /// # Errors
    ///
    /// Returns an error when the pool fails, the cached blob cannot be
    /// decoded, the factory fails, or the fresh collection cannot be
    /// serialised.
    pub fn collection(&self) -> ConfigResult<Arc<MemoryCollection>> {
        let mut slot = self.collection.lock();
        self.load(&mut slot)
    }

    /// Change the cached collection in place, loading or building it first.
    ///
    /// Setup code uses this to finish a fresh build before it is persisted.
    /// The change marks the collection dirty, and the amended state is
    /// encoded and written by the next [`Self::close`]. Handles returned
    /// earlier by [`Self::collection`] keep the state they were taken from.
    /// The build slot stays locked while `amend` runs, so it must not read
    /// from this collection.
    ///
    /// # Errors
    ///
    /// Returns an error when the collection cannot be loaded or built, the
    /// error returned by `amend`, or [`ConfigError::MiddlewareSerialization`]
    /// when `amend` attaches middleware. A failed amendment leaves the
    /// collection unchanged.
    pub fn amend<T, F>(&self, amend: F) -> ConfigResult<T>
    where
        F: FnOnce(&mut MemoryCollection) -> ConfigResult<T>,
    {
        let mut slot = self.collection.lock();
        let mut draft = MemoryCollection::clone(&*self.load(&mut slot)?);
        let outcome = amend(&mut draft)?;
        if !draft.middlewares().is_empty() {
            return Err(Arc::new(ConfigError::MiddlewareSerialization));
        }

        *slot = Some(Arc::new(draft));
        self.resolved.lock().clear();
        self.amended.store(true, Ordering::Release);
        self.dirty.store(true, Ordering::Release);
        debug!(key = CACHE_KEY, "config collection amended");
        Ok(outcome)
    }

    fn load(&self, slot: &mut Option<Arc<MemoryCollection>>) -> ConfigResult<Arc<MemoryCollection>> {
        if let Some(built) = slot.as_ref() {
            return Ok(Arc::clone(built));
        }

        let mut item = self.pool.get_item(CACHE_KEY)?;
        if !self.flush
            && item.is_hit()
            && let Some(blob) = item.get()
        {
            debug!(key = CACHE_KEY, "config collection loaded from cache");
            let cached = Arc::new(MemoryCollection::from_blob(blob)?);
            *slot = Some(Arc::clone(&cached));
            return Ok(cached);
        }

        debug!(key = CACHE_KEY, flush = self.flush, "building config collection");
        let fresh = (self.factory)()?;
        item.set(fresh.to_blob()?);
        self.pool.save_deferred(item)?;
        self.dirty.store(true, Ordering::Release);

        let built = Arc::new(fresh);
        *slot = Some(Arc::clone(&built));
        Ok(built)
    }

    /// Commit the pending deferred write, if any, and release the collection.
    ///
    /// The pool is committed exactly once when the collection is dirty and
    /// not at all otherwise. An amended collection is encoded now and queued
    /// in place of the write made when it was built.
    ///
    /// # Errors
    ///
    /// Returns an error when the amended collection cannot be encoded or
    /// queued, or the pool's commit error.
    pub fn close(mut self) -> ConfigResult<()> {
        self.commit_if_dirty()
    }

    /// Run `scope` against this collection, then close it on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the error from `scope` if it fails, otherwise any commit
    /// error. When both fail they are reported together as
    /// [`ConfigError::ScopedCommit`].
    pub fn scoped<T, F>(mut self, scope: F) -> ConfigResult<T>
    where
        F: FnOnce(&Self) -> ConfigResult<T>,
    {
        let outcome = scope(&self);
        let committed = self.commit_if_dirty();
        match (outcome, committed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(commit)) => Err(commit),
            (Err(scope_err), Ok(())) => Err(scope_err),
            (Err(scope_err), Err(commit)) => Err(Arc::new(ConfigError::ScopedCommit {
                scope: scope_err,
                commit,
            })),
        }
    }

    /// Toggle flushing. Enabling it clears the pool immediately so the next
    /// build overwrites any stale entry.
    ///
    /// # Errors
    ///
    /// Returns the pool's error when clearing fails.
    pub fn set_flush(&mut self, flush: bool) -> ConfigResult<()> {
        self.flush = flush;
        if flush {
            debug!("flushing config cache pool");
            self.pool.clear()?;
        }
        Ok(())
    }

    /// Returns `true` when the cached blob is being ignored.
    #[must_use]
    pub const fn is_flush(&self) -> bool {
        self.flush
    }

    /// Returns `true` when a deferred write awaits commit.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Returns the pool backing this collection.
    #[must_use]
    pub const fn pool(&self) -> &Arc<dyn CachePool> {
        &self.pool
    }

    /// Returns the request-scoped middleware.
    #[must_use]
    pub const fn middlewares(&self) -> &MiddlewarePipeline {
        &self.middlewares
    }

    /// Append request-scoped middleware, discarding memoized results.
    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
        self.resolved.get_mut().clear();
    }

    /// Replace the request-scoped middleware, discarding memoized results.
    pub fn set_middlewares(&mut self, middlewares: MiddlewarePipeline) {
        self.middlewares = middlewares;
        self.resolved.get_mut().clear();
    }

    /// Replace the middleware handed to nested overlays.
    pub fn set_nested_middlewares(&mut self, middlewares: MiddlewarePipeline) {
        self.nested_middlewares = middlewares;
    }

    /// Create an overlay whose parent is this caching collection, so classes
    /// the overlay leaves untouched keep both caching layers.
    ///
    /// # Errors
    ///
    /// Returns an error when the collection cannot be loaded or built.
    pub fn nest(&self) -> ConfigResult<DeltaCollection<'_>> {
        DeltaCollection::new(self, self.nested_middlewares.clone())
    }

    fn commit_if_dirty(&mut self) -> ConfigResult<()> {
        if !std::mem::replace(self.dirty.get_mut(), false) {
            return Ok(());
        }
        if std::mem::replace(self.amended.get_mut(), false)
            && let Some(amended) = self.collection.get_mut().as_ref()
        {
            let mut item = CacheItem::miss(CACHE_KEY);
            item.set(amended.to_blob()?);
            self.pool.save_deferred(item)?;
        }
        debug!(key = CACHE_KEY, "committing deferred config cache write");
        self.pool.commit()
    }
}

impl ConfigCollection for CachingCollection {
    fn class_config(&self, class: &str, include_middleware: bool) -> ConfigResult<Option<Value>> {
        let memo_key = (normalize_class(class), include_middleware);
        if let Some(cached) = self.resolved.lock().get(&memo_key) {
            return Ok(cached.clone());
        }

        let collection = self.collection()?;
        let resolved = if include_middleware {
            self.middlewares
                .resolve(&memo_key.0, &|requested| collection.get(requested, None, false))?
        } else {
            collection.get(&memo_key.0, None, false)?
        };
        self.resolved.lock().insert(memo_key, resolved.clone());
        Ok(resolved)
    }

    fn get_all(&self) -> ConfigResult<ConfigMap> {
        self.collection()?.get_all()
    }

    fn metadata(&self) -> ConfigResult<MetadataMap> {
        self.collection()?.metadata()
    }

    fn history(&self) -> ConfigResult<HistoryMap> {
        self.collection()?.history()
    }
}

impl Drop for CachingCollection {
    fn drop(&mut self) {
        if *self.dirty.get_mut() {
            warn!(
                key = CACHE_KEY,
                "config collection dropped with an uncommitted deferred write; call close() to persist it"
            );
        }
    }
}
