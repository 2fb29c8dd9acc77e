//! Background eviction of stale entries from the active set.
//!
//! Runs as an independent task that periodically sweeps the store at the
//! clock's current time. A failed cycle is logged and the loop carries on;
//! only cancellation ends it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::MAX_WINDOW_SECS;
use crate::error::SinkResult;
use crate::store::EntryStore;

pub struct Sweeper {
    store: Arc<EntryStore>,
    clock: Arc<dyn Clock>,
    /// How often to sweep
    interval: Duration,
    /// Entries at least this old leave the active set
    max_age: Duration,
}

impl Sweeper {
    pub fn new(
        store: Arc<EntryStore>,
        clock: Arc<dyn Clock>,
        interval: Duration,
        max_age: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            interval: interval.min(Duration::from_secs(MAX_WINDOW_SECS)),
            max_age,
        }
    }

    /// One sweep at the current time. Returns the number of evicted entries.
    pub fn sweep_once(&self) -> SinkResult<usize> {
        self.store.sweep(self.clock.now(), self.max_age)
    }

    /// Run the sweep loop until `shutdown` is cancelled. The first sweep
    /// happens one interval after start.
    pub async fn run(self, shutdown: CancellationToken) {
        let now = Instant::now();
        let start = now.checked_add(self.interval).unwrap_or(now);
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Sweeper started (interval {:?}, max age {:?})",
            self.interval, self.max_age
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.sweep_once() {
                        Ok(0) => {}
                        Ok(evicted) => debug!("Sweeper evicted {} stale entries", evicted),
                        Err(e) => warn!("Sweep cycle failed: {}", e),
                    }
                }
            }
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
