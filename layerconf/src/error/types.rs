//! Primary error enum for configuration resolution flows.

use std::sync::Arc;

use thiserror::Error;

/// Boxed error reported by an injected capability such as a cache pool.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while resolving or caching configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A collection with middleware attached was asked to serialise itself.
    ///
    /// The raw and middleware-resolved views are different layers; writing
    /// only the raw layer would drop resolved state, so this is always a
    /// programming error on the caller's side.
    #[error("cannot serialise a config collection with middleware attached")]
    MiddlewareSerialization,

    /// Encoding or decoding a cached blob failed.
    #[error("failed to encode or decode cached configuration: {0}")]
    Codec(#[from] serde_json::Error),

    /// The injected cache pool reported a failure.
    #[error("cache pool {operation} failed for '{key}': {source}")]
    Pool {
        /// Pool operation that failed, such as `commit` or `get_item`.
        operation: &'static str,
        /// Cache key involved, or an empty string for pool-wide operations.
        key: String,
        /// Underlying error reported by the pool.
        #[source]
        source: BoxedSource,
    },

    /// A class declared an extension that cannot be resolved.
    #[error("'{class}' references nonexistent extension '{extension}'")]
    UnknownExtension {
        /// Class whose config declared the extension.
        class: String,
        /// Extension name that could not be found.
        extension: String,
    },

    /// A declared extension list had the wrong shape.
    #[error("invalid extension declaration on '{class}': {message}")]
    InvalidExtension {
        /// Class whose config declared the extensions.
        class: String,
        /// Human-readable explanation of the problem.
        message: String,
    },

    /// A scoped use of a caching collection failed and so did the commit
    /// that closed it.
    #[error("scoped config access failed ({scope}) and the deferred commit also failed: {commit}")]
    ScopedCommit {
        /// Error returned by the scope itself.
        scope: Arc<ConfigError>,
        /// Error returned by the pool commit.
        commit: Arc<ConfigError>,
    },

    /// The collection factory failed to build a fresh collection.
    #[error("failed to build config collection: {source}")]
    Factory {
        /// Underlying error reported by the factory.
        #[source]
        source: BoxedSource,
    },
}
