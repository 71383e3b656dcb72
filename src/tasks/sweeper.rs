//! TTL Sweeper Module
//!
//! Background reclamation of expired cache entries, independent of read and
//! write traffic, so memory held by expired-but-unaccessed entries stays
//! bounded without relying on callers to trigger cleanup.
//!
//! The sweeper is an explicit Stopped→Running→Stopped state machine rather
//! than an uncontrolled timer: tests can start and stop it deterministically
//! and assert that no background activity survives `stop`. It runs on a
//! dedicated thread driven by a crossbeam ticker, keeping the cache's public
//! API free of any async runtime requirement.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{bounded, tick, Sender};
use crossbeam::select;
use parking_lot::Mutex;
use tracing::{debug, info};

// == Sweeper State ==
#[derive(Debug)]
enum SweeperState {
    Stopped,
    Running {
        stop_tx: Sender<()>,
        handle: JoinHandle<()>,
    },
}

// == TTL Sweeper ==
/// Periodic background sweep driver.
///
/// The sweep work itself is supplied as a closure (the cache façade passes
/// one that walks its shards), which keeps this type independent of the
/// cache's value type.
#[derive(Debug)]
pub struct TtlSweeper {
    state: Mutex<SweeperState>,
}

impl TtlSweeper {
    // == Constructor ==
    /// Creates a sweeper in the Stopped state.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SweeperState::Stopped),
        }
    }

    // == Start ==
    /// Transitions Stopped→Running, waking every `interval` to run `sweep`.
    ///
    /// Starting an already-running sweeper is a no-op. The sweep closure is
    /// responsible for its own error handling; a failed cycle must not
    /// panic, it is simply retried on the next tick.
    pub fn start<F>(&self, interval: Duration, sweep: F)
    where
        F: Fn() + Send + 'static,
    {
        let mut state = self.state.lock();
        if matches!(*state, SweeperState::Running { .. }) {
            return;
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(interval);

        let handle = std::thread::spawn(move || {
            info!(
                "TTL sweeper started with interval of {}ms",
                interval.as_millis()
            );
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => sweep(),
                }
            }
            debug!("TTL sweeper stopped");
        });

        *state = SweeperState::Running { stop_tx, handle };
    }

    // == Stop ==
    /// Signals cancellation and blocks until the sweep thread has exited.
    ///
    /// A sweep cycle in progress when `stop` is called runs to completion;
    /// no sweep runs after `stop` returns. Stopping an already-stopped
    /// sweeper is a no-op, so `stop` is safe to call repeatedly.
    pub fn stop(&self) {
        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut *state, SweeperState::Stopped)
        };

        if let SweeperState::Running { stop_tx, handle } = previous {
            // The send fails only if the thread already exited; join either way.
            let _ = stop_tx.send(());
            let _ = handle.join();
        }
    }

    // == Is Running ==
    /// Returns true while the sweep thread is active.
    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), SweeperState::Running { .. })
    }
}

impl Default for TtlSweeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TtlSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
