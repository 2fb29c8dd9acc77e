//! Ingestion and query operations over a shared [`EntryStore`].
//!
//! The HTTP layer is a thin wrapper around [`TelemetrySink`]; everything
//! with invariants (single clock read per entry, append-then-sweep, sweep
//! before reading the active set) lives here.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SinkConfig;
use crate::entry::{DeviceKind, Entry, Payload};
use crate::error::SinkResult;
use crate::store::EntryStore;
use crate::sweeper::Sweeper;

/// Acknowledgement for an accepted reading.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
    pub received: Payload,
    /// Display form of the entry's `received_at`.
    pub timestamp: String,
}

/// Active entries as of `as_of`, after sweeping at that instant.
#[derive(Debug, Clone)]
pub struct ActiveView {
    pub entries: Vec<Arc<Entry>>,
    pub as_of: DateTime<Utc>,
}

pub struct TelemetrySink {
    kind: DeviceKind,
    store: Arc<EntryStore>,
    clock: Arc<dyn Clock>,
    time_limit: Duration,
}

impl TelemetrySink {
    pub fn new(store: Arc<EntryStore>, clock: Arc<dyn Clock>, time_limit: Duration) -> Self {
        Self {
            kind: DeviceKind::Espa,
            store,
            clock,
            time_limit,
        }
    }

    /// A fresh store on the wall clock, windowed by `config`.
    pub fn from_config(config: &SinkConfig) -> Self {
        Self::new(
            Arc::new(EntryStore::new()),
            Arc::new(SystemClock),
            config.time_limit(),
        )
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn store(&self) -> &Arc<EntryStore> {
        &self.store
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Background sweeper sharing this sink's store, clock and window.
    pub fn sweeper(&self, interval: Duration) -> Sweeper {
        Sweeper::new(
            self.store.clone(),
            self.clock.clone(),
            interval,
            self.time_limit,
        )
    }

    /// Record one reading. Unparseable bodies are stored as a raw fallback;
    /// only store faults are returned as errors.
    pub fn ingest(&self, body: &[u8]) -> SinkResult<IngestReceipt> {
        let payload = Payload::from_body(body);
        let now = self.clock.now();
        let entry = Entry::new(self.kind, now, payload.clone());
        let timestamp = entry.display_time().to_string();

        self.store.append(entry)?;
        if payload.is_raw_fallback() {
            debug!("Body was not JSON; stored as raw text");
        }
        info!(
            "Received {} data: {}",
            self.kind.as_str(),
            serde_json::to_string(&payload).unwrap_or_default()
        );

        // Entry is stored at this point; sweep failures are only logged.
        match self.store.sweep(now, self.time_limit) {
            Ok(evicted) if evicted > 0 => debug!("Evicted {} stale entries after ingest", evicted),
            Ok(_) => {}
            Err(e) => warn!("Sweep after ingest failed: {}", e),
        }

        Ok(IngestReceipt {
            received: payload,
            timestamp,
        })
    }

    pub fn active_view(&self) -> SinkResult<ActiveView> {
        let as_of = self.clock.now();
        let evicted = self.store.sweep(as_of, self.time_limit)?;
        if evicted > 0 {
            debug!("Evicted {} stale entries before active query", evicted);
        }
        Ok(ActiveView {
            entries: self.store.snapshot_active()?,
            as_of,
        })
    }

    /// Full history, most recent first.
    pub fn history(&self) -> SinkResult<Vec<Arc<Entry>>> {
        self.store.snapshot_history()
    }

    /// Active count without sweeping; advisory only.
    pub fn active_count(&self) -> SinkResult<usize> {
        self.store.active_len()
    }
}
