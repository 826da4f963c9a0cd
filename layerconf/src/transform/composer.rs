//! Item composition helpers for priority merging.

use serde_json::Value;

use crate::{MergeItem, Metadata};

/// Builder that accumulates [`MergeItem`] values for ingestion.
///
/// Items are applied in push order, each one taking priority over what came
/// before it.
///
/// ```rust
/// use layerconf::{ConfigCollection, MemoryCollection, MergeComposer};
/// use serde_json::json;
///
/// let mut defaults = MergeComposer::new();
/// defaults.push_value("Greeter", json!({"greetings": ["Hello"], "punctuation": "."}));
///
/// let mut overrides = MergeComposer::new();
/// overrides.push_value("greeter", json!({"greetings": ["Hi"], "punctuation": "!"}));
///
/// let mut config = MemoryCollection::new();
/// config.transform(&[&defaults, &overrides])?;
///
/// assert_eq!(
///     config.get("greeter", None, false)?,
///     Some(json!({"greetings": ["Hello", "Hi"], "punctuation": "!"}))
/// );
/// # Ok::<_, std::sync::Arc<layerconf::ConfigError>>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct MergeComposer {
    items: Vec<MergeItem>,
}

impl MergeComposer {
    /// Create an empty composer.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Create a composer with preallocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    /// Push a value for `class` without metadata.
    pub fn push_value(&mut self, class: impl Into<String>, value: Value) {
        self.push_item(MergeItem::new(class, value));
    }

    /// Push a value for `class` together with its provenance.
    pub fn push_with_metadata(
        &mut self,
        class: impl Into<String>,
        value: Value,
        metadata: Metadata,
    ) {
        self.push_item(MergeItem::new(class, value).with_metadata(metadata));
    }

    /// Push an arbitrary item.
    pub fn push_item(&mut self, item: MergeItem) {
        self.items.push(item);
    }

    /// Returns the accumulated items in push order.
    #[must_use]
    pub fn items(&self) -> &[MergeItem] {
        &self.items
    }

    /// Returns `true` when no items have been pushed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for MergeComposer {
    type Item = MergeItem;
    type IntoIter = std::vec::IntoIter<MergeItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl Extend<MergeItem> for MergeComposer {
    fn extend<I: IntoIterator<Item = MergeItem>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}
