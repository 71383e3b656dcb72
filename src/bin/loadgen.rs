//! Load generator for the search-result cache
//!
//! Drives configurable concurrent read/write load against one cache
//! instance, prints the JSON metrics snapshot, and checks the service-level
//! targets the cache is built for: P95 latency under one second and a hit
//! rate above 70% under sustained concurrent traffic.
//!
//! # Environment Variables
//! - `WORKERS` - Concurrent worker threads (default: 64)
//! - `DURATION_SECS` - How long to run (default: 10)
//! - `KEYSPACE` - Number of distinct query keys (default: 5000)
//! - `READ_RATIO` - Fraction of operations that are lookups (default: 0.9)
//!
//! Cache construction also honors `SHARD_COUNT`, `CAPACITY_PER_SHARD`,
//! `DEFAULT_TTL_SECS`, and `SWEEP_INTERVAL_SECS`.

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use querycache::{CacheConfig, PutOptions, QueryCache};

/// SLA targets validated after the run.
const TARGET_P95: Duration = Duration::from_secs(1);
const TARGET_HIT_RATE: f64 = 0.70;

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loadgen=info,querycache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let workers: usize = env_or("WORKERS", 64);
    let duration = Duration::from_secs(env_or("DURATION_SECS", 10));
    let keyspace: usize = env_or("KEYSPACE", 5000);
    let read_ratio: f64 = env_or("READ_RATIO", 0.9);

    let config = CacheConfig::from_env();
    info!(
        "loadgen: {} workers, {}s, keyspace {}, read ratio {:.2}",
        workers,
        duration.as_secs(),
        keyspace,
        read_ratio
    );

    let cache: Arc<QueryCache<String>> =
        Arc::new(QueryCache::new(config, |v: &String| v.len())?);

    // Pre-warm so the first seconds are not all compulsory misses.
    for id in 0..keyspace.min(1000) {
        cache.put(key_for(id), payload_for(id), PutOptions::new())?;
    }

    let deadline = Instant::now() + duration;
    let mut handles = Vec::with_capacity(workers);
    for _ in 0..workers {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            worker_loop(&cache, deadline, keyspace, read_ratio)
        }));
    }

    let mut total_ops: u64 = 0;
    for handle in handles {
        match handle.join() {
            Ok(ops) => total_ops += ops,
            Err(_) => bail!("worker thread panicked"),
        }
    }

    cache.close();

    let snapshot = cache.metrics();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    let throughput = total_ops as f64 / duration.as_secs_f64();
    info!("completed {} operations ({:.0} ops/s)", total_ops, throughput);

    let p95 = Duration::from_micros(snapshot.get_p95_us.max(snapshot.put_p95_us));
    let mut failed = false;
    if p95 >= TARGET_P95 {
        warn!("SLA FAIL: p95 {:?} >= {:?}", p95, TARGET_P95);
        failed = true;
    }
    if snapshot.hit_rate <= TARGET_HIT_RATE {
        warn!(
            "SLA FAIL: hit rate {:.3} <= {:.2}",
            snapshot.hit_rate, TARGET_HIT_RATE
        );
        failed = true;
    }

    if failed {
        bail!("SLA check failed");
    }
    info!(
        "SLA PASS: p95 {:?}, hit rate {:.3}",
        p95, snapshot.hit_rate
    );
    Ok(())
}

/// One worker: random reads and writes against a skewed keyspace until the
/// deadline. 80% of operations target the hottest 20% of keys, which is the
/// shape repeated search queries actually have.
fn worker_loop(
    cache: &QueryCache<String>,
    deadline: Instant,
    keyspace: usize,
    read_ratio: f64,
) -> u64 {
    let mut rng = rand::rng();
    let hot_keys = (keyspace / 5).max(1);
    let mut ops: u64 = 0;

    while Instant::now() < deadline {
        let id = if rng.random::<f64>() < 0.8 {
            rng.random_range(0..hot_keys)
        } else {
            rng.random_range(0..keyspace)
        };
        let key = key_for(id);

        if rng.random::<f64>() < read_ratio {
            if cache.get(&key).is_none() {
                // Miss: the real search API would recompute, then fill.
                let _ = cache.put(key, payload_for(id), PutOptions::new());
            }
        } else {
            let _ = cache.put(
                key,
                payload_for(id),
                PutOptions::new().tag(format!("category:{}", id % 17)),
            );
        }
        ops += 1;
    }
    ops
}

fn key_for(id: usize) -> String {
    format!("search:q{}:filters=none:sort=rank:page=1", id)
}

fn payload_for(id: usize) -> String {
    format!("{{\"results\":[{}],\"total\":42}}", id).repeat(8)
}
