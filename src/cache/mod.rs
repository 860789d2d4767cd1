//! Time-bound caching for fetched record collections
//!
//! `TimedCache` is the in-memory read-through store used by the fetch
//! orchestrator. `CacheManager` persists its entries to disk between runs so
//! the TTL window survives across CLI invocations.

mod manager;
mod timed;

pub use manager::CacheManager;
pub use timed::{CacheEntry, CacheStats, TimedCache, DEFAULT_TTL};
