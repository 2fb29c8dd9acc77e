//! Entry store: the active set and the history log behind one lock.
//!
//! Responsibilities:
//! - Append each entry to both collections in a single critical section.
//! - Evict entries older than the freshness window from the active set only.
//! - Hand out point-in-time snapshots that later mutation cannot change.
//!
//! Entries are shared as `Arc<Entry>` between the two collections and every
//! snapshot, so copies are cheap and the entries themselves stay immutable.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::entry::Entry;
use crate::error::{SinkError, SinkResult};

#[derive(Debug, Default)]
struct Collections {
    active: Vec<Arc<Entry>>,
    history: Vec<Arc<Entry>>,
}

#[derive(Debug, Default)]
pub struct EntryStore {
    inner: Mutex<Collections>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SinkResult<MutexGuard<'_, Collections>> {
        self.inner.lock().map_err(|_| SinkError::LockPoisoned)
    }

    /// Append to the end of both collections. Either both grow or neither does.
    pub fn append(&self, entry: Entry) -> SinkResult<()> {
        let entry = Arc::new(entry);
        let mut guard = self.lock()?;
        guard.active.push(entry.clone());
        guard.history.push(entry);
        Ok(())
    }

    /// Drop every active entry with `now - received_at >= max_age`.
    ///
    /// Returns how many entries were evicted. Entries stamped after `now`
    /// count as fresh.
    pub fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> SinkResult<usize> {
        let mut guard = self.lock()?;
        let before = guard.active.len();
        guard.active.retain(|entry| is_fresh(entry, now, max_age));
        Ok(before - guard.active.len())
    }

    /// Active entries in insertion order.
    pub fn snapshot_active(&self) -> SinkResult<Vec<Arc<Entry>>> {
        Ok(self.lock()?.active.clone())
    }

    /// All history, most recent first. Equal timestamps keep insertion order.
    pub fn snapshot_history(&self) -> SinkResult<Vec<Arc<Entry>>> {
        let mut logs = self.snapshot_history_in_insertion_order()?;
        logs.sort_by(|a, b| b.received_at().cmp(&a.received_at()));
        Ok(logs)
    }

    /// All history in the order it was appended.
    pub fn snapshot_history_in_insertion_order(&self) -> SinkResult<Vec<Arc<Entry>>> {
        Ok(self.lock()?.history.clone())
    }

    pub fn active_len(&self) -> SinkResult<usize> {
        Ok(self.lock()?.active.len())
    }

    pub fn history_len(&self) -> SinkResult<usize> {
        Ok(self.lock()?.history.len())
    }

    /// Poison the lock by panicking while holding it.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.inner.lock();
            panic!("poisoning entry store");
        }));
    }
}

fn is_fresh(entry: &Entry, now: DateTime<Utc>, max_age: Duration) -> bool {
    match now.signed_duration_since(entry.received_at()).to_std() {
        Ok(age) => age < max_age,
        // negative age: clock went backwards
        Err(_) => true,
    }
}
