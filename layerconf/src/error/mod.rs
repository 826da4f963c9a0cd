//! Error types produced while resolving and caching configuration.

mod constructors;
mod types;

pub use types::ConfigError;
