//! Cache Module
//!
//! Provides the sharded in-memory search-result cache: LRU eviction, TTL
//! expiration, and tag-based invalidation behind the [`QueryCache`] façade.

mod entry;
mod recency;
mod router;
mod shard;
mod store;
mod tags;


// Re-export public types
pub use entry::CacheEntry;
pub use recency::{NodeId, RecencyList};
pub use router::ShardRouter;
pub use shard::{GetOutcome, PutReceipt, Shard};
pub use store::{Expiry, PutOptions, QueryCache};
pub use tags::InvalidationBus;
