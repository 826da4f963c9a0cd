//! Priority merging of configuration values.
//!
//! Two rules drive every merge:
//!
//! - named keys (JSON object members) are overridden by the high-priority
//!   side, recursing when both sides hold a container of the same kind;
//! - indexed entries (JSON array elements) accumulate, with the high-priority
//!   elements appended after the low-priority ones.
//!
//! Declarative sources therefore extend lists while overriding individual
//! fields of maps.

mod item;

pub use item::MergeItem;

use serde_json::{Map, Value};

use crate::{ConfigResult, MutableConfigCollection};

/// Deep merge `high` over `low`, returning the merged value.
///
/// Behaviour:
/// - Two objects merge key by key in `high`'s order. Keys present only in
///   `low` keep their position; new keys are appended.
/// - Two arrays concatenate: every element of `high` is appended to `low`.
///   Elements are never merged or overwritten by position.
/// - Any other combination (a scalar on either side, or an object meeting an
///   array) yields `high` unchanged.
///
/// # Examples
///
/// ```rust
/// use layerconf::merge_array;
/// use serde_json::json;
///
/// let merged = merge_array(
///     json!({"db": {"host": "primary"}, "plugins": ["cache"]}),
///     json!({"db": {"host": "localhost", "port": 5432}, "plugins": ["auth"]}),
/// );
/// assert_eq!(
///     merged,
///     json!({"db": {"host": "primary", "port": 5432}, "plugins": ["auth", "cache"]})
/// );
/// ```
#[must_use]
pub fn merge_array(high: Value, low: Value) -> Value {
    match (high, low) {
        (Value::Object(high_map), Value::Object(low_map)) => {
            Value::Object(merge_objects(high_map, low_map))
        }
        (Value::Array(high_items), Value::Array(mut low_items)) => {
            low_items.extend(high_items);
            Value::Array(low_items)
        }
        (winner, _) => winner,
    }
}

fn merge_objects(high: Map<String, Value>, mut low: Map<String, Value>) -> Map<String, Value> {
    for (key, value) in high {
        match low.get_mut(&key) {
            Some(existing) => {
                let previous = std::mem::take(existing);
                *existing = merge_array(value, previous);
            }
            None => {
                low.insert(key, value);
            }
        }
    }
    low
}

/// Ingest `items` into `target` in order, each item taking priority over
/// whatever `target` already holds for its class.
///
/// Classes missing from `target` are set directly. Existing classes are
/// merged with [`merge_array`] against the target's raw value, so middleware
/// never leaks into stored config. Empty incoming metadata inherits the
/// target's current metadata for that class.
///
/// Merging is not idempotent: ingesting the same item twice appends its list
/// entries twice.
///
/// # Errors
///
/// Propagates any error raised while reading the target's raw values or
/// metadata.
///
/// # Examples
///
/// ```rust
/// use layerconf::{ConfigCollection, MemoryCollection, MergeItem, merge_items};
/// use serde_json::json;
///
/// let mut target = MemoryCollection::new();
/// merge_items([MergeItem::new("Mailer", json!({"hosts": ["a"], "tls": false}))], &mut target)?;
/// merge_items([MergeItem::new("mailer", json!({"hosts": ["b"], "tls": true}))], &mut target)?;
///
/// assert_eq!(
///     target.get("MAILER", None, false)?,
///     Some(json!({"hosts": ["a", "b"], "tls": true}))
/// );
/// # Ok::<_, std::sync::Arc<layerconf::ConfigError>>(())
/// ```
pub fn merge_items<I, C>(items: I, target: &mut C) -> ConfigResult<()>
where
    I: IntoIterator<Item = MergeItem>,
    C: MutableConfigCollection + ?Sized,
{
    for item in items {
        let (class, value, mut metadata) = item.into_parts();
        let Some(existing) = target.get(&class, None, false)? else {
            target.set(&class, None, value, metadata);
            continue;
        };

        let merged = merge_array(value, existing);
        if metadata.is_empty()
            && let Some(previous) = target.class_metadata(&class)?
        {
            metadata = previous;
        }
        target.set(&class, None, merged, metadata);
    }
    Ok(())
}

#[cfg(test)]
mod tests;
