//! Middleware applied to per-class lookups.
//!
//! A pipeline is an ordered list of [`Middleware`] values. Resolution walks
//! the list front to back: the first registered middleware sees the request
//! first and the fully resolved value last, and the terminal resolver at the
//! end of the chain returns the raw stored value.
//!
//! ```rust
//! use layerconf::{ConfigResult, MiddlewarePipeline, middleware};
//! use serde_json::{Value, json};
//!
//! let pipeline = MiddlewarePipeline::new()
//!     .with(middleware::from_fn(|class, next| {
//!         let inner = next.call(class)?;
//!         Ok(inner.map(|value| json!({"outer": value})))
//!     }))
//!     .with(middleware::from_fn(|class, next| {
//!         let raw = next.call(class)?;
//!         Ok(raw.map(|value| json!({"inner": value})))
//!     }));
//!
//! let terminal = |_: &str| -> ConfigResult<Option<Value>> { Ok(Some(json!(1))) };
//! let resolved = pipeline.resolve("greeter", &terminal)?;
//! assert_eq!(resolved, Some(json!({"outer": {"inner": 1}})));
//! # Ok::<_, std::sync::Arc<layerconf::ConfigError>>(())
//! ```

mod cache;
mod extension;

pub use cache::CacheMiddleware;
pub use extension::{EXTENSIONS_KEY, ExtensionMiddleware, ExtensionSource};

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::ConfigResult;

/// The raw resolver that terminates a middleware chain.
pub type Terminal<'a> = &'a dyn Fn(&str) -> ConfigResult<Option<Value>>;

/// A decorator invoked while resolving one class.
///
/// Implementations may call `next` zero or more times: skipping it
/// short-circuits the rest of the chain, and calling it again re-runs the
/// inner layers. Middleware must therefore tolerate being asked for the same
/// class repeatedly.
pub trait Middleware: Send + Sync {
    /// Produce the config for `class`, usually by transforming `next`.
    ///
    /// # Errors
    ///
    /// Returns an error when a dependency declared by the config cannot be
    /// resolved, or when an inner layer fails.
    fn class_config(&self, class: &str, next: Next<'_>) -> ConfigResult<Option<Value>>;

    /// Returns `true` when this layer answers from results remembered across
    /// calls rather than from what `next` currently returns.
    ///
    /// Overlays drop such layers, since a result remembered for the parent
    /// does not reflect the overlay's own edits.
    fn caches_results(&self) -> bool {
        false
    }
}

/// Continuation for the remainder of a middleware chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    terminal: Terminal<'a>,
}

impl<'a> Next<'a> {
    /// Create a continuation running `chain` and then `terminal`.
    #[must_use]
    pub fn new(chain: &'a [Arc<dyn Middleware>], terminal: Terminal<'a>) -> Self {
        Self { chain, terminal }
    }

    /// Resolve `class` through the remaining layers.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by an inner layer or the terminal
    /// resolver.
    pub fn call(self, class: &str) -> ConfigResult<Option<Value>> {
        match self.chain.split_first() {
            Some((head, rest)) => head.class_config(class, Self::new(rest, self.terminal)),
            None => (self.terminal)(class),
        }
    }

    /// Number of middleware layers still ahead of the terminal resolver.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.chain.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Ordered list of middleware. Cloning shares the middleware instances.
#[derive(Clone, Default)]
pub struct MiddlewarePipeline {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewarePipeline {
    /// Create an empty pipeline.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Append `middleware` as the innermost layer.
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middlewares.push(middleware);
    }

    /// Builder-style variant of [`Self::push`].
    #[must_use]
    pub fn with(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.push(middleware);
        self
    }

    /// Number of registered middleware.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns `true` when no middleware is registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Iterate over the middleware, outermost first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Middleware>> {
        self.middlewares.iter()
    }

    /// Returns a copy of this pipeline without layers that cache results.
    #[must_use]
    pub fn without_caches(&self) -> Self {
        self.middlewares
            .iter()
            .filter(|middleware| !middleware.caches_results())
            .cloned()
            .collect()
    }

    /// Resolve `class` through every layer, ending at `terminal`.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised by a layer or by `terminal`.
    pub fn resolve(&self, class: &str, terminal: Terminal<'_>) -> ConfigResult<Option<Value>> {
        Next::new(&self.middlewares, terminal).call(class)
    }
}

impl fmt::Debug for MiddlewarePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewarePipeline")
            .field("len", &self.middlewares.len())
            .finish()
    }
}

impl FromIterator<Arc<dyn Middleware>> for MiddlewarePipeline {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Middleware>>>(iter: I) -> Self {
        Self {
            middlewares: iter.into_iter().collect(),
        }
    }
}

/// Middleware built from a closure.
pub struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&str, Next<'_>) -> ConfigResult<Option<Value>> + Send + Sync,
{
    fn class_config(&self, class: &str, next: Next<'_>) -> ConfigResult<Option<Value>> {
        (self.0)(class, next)
    }
}

/// Wrap a closure as shareable middleware.
#[must_use]
pub fn from_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(&str, Next<'_>) -> ConfigResult<Option<Value>> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware(f))
}
