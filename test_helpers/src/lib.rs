//! Test helpers shared across crates.
//!
//! This crate provides an in-memory [`CachePool`](layerconf::CachePool) that
//! records every call made against it, and a collection factory that counts
//! how often it is invoked.

pub mod factory;
pub mod pool;

pub use factory::CountingFactory;
pub use pool::{MemoryPool, PoolCalls};
