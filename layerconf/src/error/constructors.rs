//! Constructors for `ConfigError` variants that wrap foreign errors.

use std::sync::Arc;

use super::ConfigError;
use super::types::BoxedSource;

impl ConfigError {
    /// Construct a pool failure for `operation` on `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use layerconf::ConfigError;
    /// let err = ConfigError::pool("commit", "", "disk full");
    /// assert!(matches!(err, ConfigError::Pool { operation: "commit", .. }));
    /// ```
    #[must_use]
    pub fn pool(
        operation: &'static str,
        key: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Self {
        Self::Pool {
            operation,
            key: key.into(),
            source: source.into(),
        }
    }

    /// Construct a pool failure already wrapped in an [`Arc`].
    ///
    /// Pool implementations return `ConfigResult`, so this saves the
    /// `Arc::new` at every call site.
    #[must_use]
    pub fn pool_arc(
        operation: &'static str,
        key: impl Into<String>,
        source: impl Into<BoxedSource>,
    ) -> Arc<Self> {
        Arc::new(Self::pool(operation, key, source))
    }

    /// Construct a factory failure from any boxed error or message.
    ///
    /// # Examples
    ///
    /// ```
    /// use layerconf::ConfigError;
    /// let err = ConfigError::factory("manifest missing");
    /// assert_eq!(err.to_string(), "failed to build config collection: manifest missing");
    /// ```
    #[must_use]
    pub fn factory(source: impl Into<BoxedSource>) -> Self {
        Self::Factory {
            source: source.into(),
        }
    }

    /// Construct an unknown-extension failure.
    #[must_use]
    pub fn unknown_extension(class: impl Into<String>, extension: impl Into<String>) -> Self {
        Self::UnknownExtension {
            class: class.into(),
            extension: extension.into(),
        }
    }
}
