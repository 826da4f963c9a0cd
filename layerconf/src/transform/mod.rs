//! Transformers populate a collection from raw declarations.
//!
//! Parsing declarations (files, environment, and so on) happens outside this
//! crate. A parser hands its output to a [`MergeComposer`], which ingests it
//! through [`merge_items`] so later sources take priority over earlier ones.

mod composer;

pub use composer::MergeComposer;

use crate::{ConfigResult, MutableConfigCollection, merge_items};

/// Loads configuration into a mutable collection.
pub trait Transformer {
    /// Apply this transformer's declarations to `collection`.
    ///
    /// # Errors
    ///
    /// Returns an error when the collection rejects a read or write.
    fn transform(&self, collection: &mut dyn MutableConfigCollection) -> ConfigResult<()>;
}

impl Transformer for MergeComposer {
    fn transform(&self, collection: &mut dyn MutableConfigCollection) -> ConfigResult<()> {
        merge_items(self.items().iter().cloned(), collection)
    }
}
