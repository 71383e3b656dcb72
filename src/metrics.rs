//! Cache Metrics Module
//!
//! Tracks cache performance counters and operation latency.
//!
//! Everything here is lock-free with respect to the cache hot path: counters
//! are plain atomics and the latency histograms are fixed arrays of atomic
//! buckets, so recording a hit or a latency sample never contends with the
//! shard locks that serialize actual cache traffic. `Snapshot` reads are
//! therefore safe to call from a reporting loop at any frequency.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

// == Latency Histogram ==
/// Number of power-of-two buckets; bucket `i` covers `[2^i, 2^(i+1))` ns.
const BUCKET_COUNT: usize = 64;

/// Bounded lock-free latency histogram.
///
/// Samples are bucketed by the floor of `log2(nanoseconds)`, which keeps the
/// structure a fixed 64 counters wide regardless of traffic volume while
/// still resolving percentiles to within a factor of two. That is plenty for
/// validating a sub-second P95 target.
#[derive(Debug)]
pub struct LatencyHistogram {
    buckets: [AtomicU64; BUCKET_COUNT],
}

impl LatencyHistogram {
    /// Creates an empty histogram.
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    // == Record ==
    /// Records one duration sample.
    pub fn record(&self, duration: Duration) {
        let nanos = duration.as_nanos().min(u64::MAX as u128) as u64;
        // log2 bucket; zero-duration samples land in bucket 0
        let index = (63 - nanos.max(1).leading_zeros()) as usize;
        self.buckets[index].fetch_add(1, Ordering::Relaxed);
    }

    // == Count ==
    /// Returns the total number of recorded samples.
    pub fn count(&self) -> u64 {
        self.buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .sum()
    }

    // == Percentile ==
    /// Returns an upper bound for the given percentile (e.g. 95.0).
    ///
    /// Returns `Duration::ZERO` when no samples have been recorded. The
    /// result is the upper edge of the bucket containing the requested rank,
    /// so it over-reports by at most 2x.
    pub fn percentile(&self, p: f64) -> Duration {
        let counts: Vec<u64> = self
            .buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let rank = ((p / 100.0) * total as f64).ceil().max(1.0) as u64;
        let mut seen = 0u64;
        for (index, count) in counts.iter().enumerate() {
            seen += count;
            if seen >= rank {
                let upper_nanos = if index >= 63 {
                    u64::MAX
                } else {
                    (1u64 << (index + 1)) - 1
                };
                return Duration::from_nanos(upper_nanos);
            }
        }

        // Unreachable when total > 0, but stay total anyway.
        Duration::from_nanos(u64::MAX)
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

// == Metrics Recorder ==
/// Aggregates hit/miss/eviction counters and latency samples.
///
/// One recorder is shared by every shard of a cache. All increments happen
/// after the relevant shard lock has been released.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions_by_capacity: AtomicU64,
    evictions_by_ttl: AtomicU64,
    invalidations: AtomicU64,
    rejected_oversized_puts: AtomicU64,
    get_latency: LatencyHistogram,
    put_latency: LatencyHistogram,
}

impl MetricsRecorder {
    /// Creates a new recorder with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Counter Updates ==
    /// Records a successful cache retrieval.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed cache retrieval (missing or expired key).
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records entries removed to make room under capacity pressure.
    pub fn record_capacity_evictions(&self, count: u64) {
        if count > 0 {
            self.evictions_by_capacity.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Records entries removed because their TTL elapsed.
    pub fn record_ttl_evictions(&self, count: u64) {
        if count > 0 {
            self.evictions_by_ttl.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Records entries removed through tag invalidation.
    pub fn record_invalidations(&self, count: u64) {
        if count > 0 {
            self.invalidations.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Records a put rejected because the value exceeds shard capacity.
    pub fn record_rejected_oversized_put(&self) {
        self.rejected_oversized_puts.fetch_add(1, Ordering::Relaxed);
    }

    // == Latency ==
    /// Records the duration of one `get` call.
    pub fn record_get_latency(&self, duration: Duration) {
        self.get_latency.record(duration);
    }

    /// Records the duration of one `put` call.
    pub fn record_put_latency(&self, duration: Duration) {
        self.put_latency.record(duration);
    }

    // == Snapshot ==
    /// Produces a point-in-time snapshot of all metrics.
    ///
    /// `total_entries` and `total_size_bytes` are supplied by the caller,
    /// which reads them from the shards; the recorder itself never touches
    /// shard state.
    pub fn snapshot(&self, total_entries: usize, total_size_bytes: usize) -> MetricsSnapshot {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };

        MetricsSnapshot {
            hits,
            misses,
            hit_rate,
            evictions_by_capacity: self.evictions_by_capacity.load(Ordering::Relaxed),
            evictions_by_ttl: self.evictions_by_ttl.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            rejected_oversized_puts: self.rejected_oversized_puts.load(Ordering::Relaxed),
            total_entries,
            total_size_bytes,
            get_p50_us: self.get_latency.percentile(50.0).as_micros() as u64,
            get_p95_us: self.get_latency.percentile(95.0).as_micros() as u64,
            get_p99_us: self.get_latency.percentile(99.0).as_micros() as u64,
            put_p50_us: self.put_latency.percentile(50.0).as_micros() as u64,
            put_p95_us: self.put_latency.percentile(95.0).as_micros() as u64,
            put_p99_us: self.put_latency.percentile(99.0).as_micros() as u64,
        }
    }
}

// == Metrics Snapshot ==
/// Point-in-time view of cache metrics, serializable for export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key not found or expired)
    pub misses: u64,
    /// hits / (hits + misses), 0.0 when no lookups have been made
    pub hit_rate: f64,
    /// Entries evicted to stay under shard capacity
    pub evictions_by_capacity: u64,
    /// Entries removed because their TTL elapsed (swept or lazily on read)
    pub evictions_by_ttl: u64,
    /// Entries removed through tag invalidation
    pub invalidations: u64,
    /// Puts rejected because a single value exceeded shard capacity
    pub rejected_oversized_puts: u64,
    /// Current number of entries across all shards
    pub total_entries: usize,
    /// Current summed entry size across all shards
    pub total_size_bytes: usize,
    /// Get latency percentiles, microseconds (bucket upper bounds)
    pub get_p50_us: u64,
    pub get_p95_us: u64,
    pub get_p99_us: u64,
    /// Put latency percentiles, microseconds (bucket upper bounds)
    pub put_p50_us: u64,
    pub put_p95_us: u64,
    pub put_p99_us: u64,
}
