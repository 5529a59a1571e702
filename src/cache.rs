//! Short-TTL response cache with single-flight read deduplication.

pub mod entry;
pub mod signature;
pub mod store;

pub use entry::CacheEntry;
pub use signature::{Query, signature};
pub use store::{CacheOptions, CacheSnapshot, CacheStore, DEFAULT_TTL};
