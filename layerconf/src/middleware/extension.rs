//! Merging config contributed by declared extensions.

use std::sync::Arc;

use serde_json::Value;

use super::{Middleware, Next};
use crate::{ConfigCollection, ConfigError, ConfigMap, ConfigResult, merge_array, normalize_class};

/// Field under which a class lists the extensions it applies.
pub const EXTENSIONS_KEY: &str = "extensions";

/// Looks up the config contributed by a named extension.
pub trait ExtensionSource: Send + Sync {
    /// Returns the extension's config, or `None` when no such extension
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying store fails.
    fn extension_config(&self, extension: &str) -> ConfigResult<Option<Value>>;
}

impl ExtensionSource for ConfigMap {
    fn extension_config(&self, extension: &str) -> ConfigResult<Option<Value>> {
        Ok(self.get(&normalize_class(extension)).cloned())
    }
}

impl<C> ExtensionSource for Arc<C>
where
    C: ConfigCollection + ?Sized,
{
    fn extension_config(&self, extension: &str) -> ConfigResult<Option<Value>> {
        self.get(extension, None, false)
    }
}

/// Applies the config of every extension a class declares.
///
/// A class opts in by listing extension names under [`EXTENSIONS_KEY`].
/// Entries may carry constructor arguments in the form `Name(args)`; only the
/// name is used for lookup. Each extension's config is merged over the
/// class config in declaration order with [`merge_array`]. An extension that
/// cannot be found is an error rather than being skipped.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use layerconf::{
///     ConfigCollection, ConfigError, ConfigMap, ExtensionMiddleware, MemoryCollection, Metadata,
///     MutableConfigCollection,
/// };
/// use serde_json::json;
///
/// let mut extensions = ConfigMap::new();
/// extensions.insert("versioned".into(), json!({"stages": ["draft", "live"]}));
///
/// let mut config = MemoryCollection::new();
/// config.add_middleware(Arc::new(ExtensionMiddleware::new(extensions)));
/// config.set("page", None, json!({"extensions": ["Versioned"]}), Metadata::new());
/// config.set("file", None, json!({"extensions": ["Missing"]}), Metadata::new());
///
/// let page = config.get("page", Some("stages"), true)?;
/// assert_eq!(page, Some(json!(["draft", "live"])));
///
/// let err = config.get("file", None, true).err().map(|e| e.to_string());
/// assert_eq!(err.as_deref(), Some("'file' references nonexistent extension 'Missing'"));
/// # Ok::<_, std::sync::Arc<ConfigError>>(())
/// ```
pub struct ExtensionMiddleware<S> {
    source: S,
}

impl<S: ExtensionSource> ExtensionMiddleware<S> {
    /// Resolve extensions against `source`.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    fn declared(class: &str, config: &Value) -> ConfigResult<Vec<String>> {
        let entries = match config.get(EXTENSIONS_KEY) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                return Err(Arc::new(ConfigError::InvalidExtension {
                    class: class.to_owned(),
                    message: format!("'{EXTENSIONS_KEY}' must be a list, found {other}"),
                }));
            }
        };
        entries
            .iter()
            .map(|entry| {
                entry.as_str().map(extension_name).ok_or_else(|| {
                    Arc::new(ConfigError::InvalidExtension {
                        class: class.to_owned(),
                        message: format!("extension entries must be strings, found {entry}"),
                    })
                })
            })
            .collect()
    }
}

impl<S: ExtensionSource> Middleware for ExtensionMiddleware<S> {
    fn class_config(&self, class: &str, next: Next<'_>) -> ConfigResult<Option<Value>> {
        let Some(mut config) = next.call(class)? else {
            return Ok(None);
        };
        for extension in Self::declared(class, &config)? {
            let extra = self
                .source
                .extension_config(&extension)?
                .ok_or_else(|| Arc::new(ConfigError::unknown_extension(class, &extension)))?;
            config = merge_array(extra, config);
        }
        Ok(Some(config))
    }
}

fn extension_name(entry: &str) -> String {
    entry
        .split_once('(')
        .map_or(entry, |(name, _)| name)
        .trim()
        .to_owned()
}
