//! querycache - A sharded in-memory search-result cache
//!
//! Sits between a search API and the underlying full-text/embedding lookup,
//! absorbing repeated queries with bounded memory use under concurrent load.
//! Capacity-bounded LRU eviction per shard, TTL expiration (lazy on read
//! plus a background sweeper), tag-based bulk invalidation, and a lock-free
//! metrics snapshot for SLA reporting.

pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod tasks;

pub use cache::{Expiry, PutOptions, QueryCache};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use metrics::MetricsSnapshot;
