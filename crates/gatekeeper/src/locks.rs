//! Per-destination async locks
//!
//! Admissions and report ingests for the same destination queue behind one
//! `tokio::sync::Mutex`; different destinations never contend. Entries are
//! created on demand and pruned when the last holder releases.

use dashmap::DashMap;
use optgate_core::Destination;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Table of per-destination mutexes, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct DestinationLocks {
    table: Arc<LockTable>,
}

/// Held while a destination's check-then-write runs
#[derive(Debug)]
pub struct DestinationGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable>,
}

impl DestinationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `destination`
    pub async fn acquire(&self, destination: &Destination) -> DestinationGuard {
        let key = destination.as_str().to_string();
        let mutex = self
            .table
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let guard = mutex.lock_owned().await;
        DestinationGuard {
            key,
            guard: Some(guard),
            table: Arc::clone(&self.table),
        }
    }

    /// Number of destinations with a live lock entry
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl DestinationGuard {
    pub fn destination(&self) -> &str {
        &self.key
    }
}

impl Drop for DestinationGuard {
    fn drop(&mut self) {
        // Release first so an idle entry holds the only reference
        drop(self.guard.take());
        self.table
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
