//! Collection factory that counts its invocations.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use layerconf::{ConfigError, ConfigResult, MemoryCollection};

/// Produces clones of a template collection and counts how often it runs.
///
/// # Examples
///
/// ```
/// use layerconf::MemoryCollection;
/// use layerconf_test_helpers::CountingFactory;
///
/// let factory = CountingFactory::new(MemoryCollection::new());
/// let build = factory.build_fn();
/// assert!(build().is_ok());
/// assert_eq!(factory.calls(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct CountingFactory {
    template: Option<MemoryCollection>,
    calls: Arc<AtomicUsize>,
}

impl CountingFactory {
    /// Build clones of `template`.
    #[must_use]
    pub fn new(template: MemoryCollection) -> Self {
        Self {
            template: Some(template),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A factory that fails every time it runs.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            template: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns how many times any closure from [`Self::build_fn`] has run.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns a closure suitable for
    /// [`CachingCollection::builder`](layerconf::CachingCollection::builder).
    #[must_use]
    pub fn build_fn(&self) -> impl Fn() -> ConfigResult<MemoryCollection> + Send + Sync + 'static {
        let template = self.template.clone();
        let calls = Arc::clone(&self.calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            template
                .clone()
                .ok_or_else(|| Arc::new(ConfigError::factory("template unavailable")))
        }
    }
}
