//! Error types for the cache
//!
//! Provides unified error handling using thiserror.
//!
//! Only configuration errors are hard failures. Everything else degrades
//! gracefully: an oversized value is simply not cached, a sweep error skips
//! that shard for one cycle. A missing or expired key is not an error at all
//! and is reported through `Option`/`bool` return values.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid construction configuration; the cache is never usable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A single value is larger than a whole shard; the put is rejected
    #[error("entry of {size} bytes exceeds shard capacity of {capacity} bytes")]
    EntryTooLarge { size: usize, capacity: usize },

    /// Internal bookkeeping disagreement detected during a sweep
    #[error("internal bookkeeping error: {0}")]
    Internal(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
