//! Service context shared by the Gatekeeper, Report Ingest and Compliance
//! Aggregator.

use crate::config::GatekeeperConfig;
use crate::error::{GatekeeperError, GatekeeperResult};
use crate::locks::{DestinationGuard, DestinationLocks};
use optgate_core::Destination;
use optgate_persistence::LedgerStore;
use std::future::Future;
use tracing::{debug, warn};

/// Context for gatekeeper operations - store, locks and tuning
#[derive(Debug, Clone)]
pub struct ServiceContext {
    store: LedgerStore,
    locks: DestinationLocks,
    config: GatekeeperConfig,
}

impl ServiceContext {
    pub fn new(store: LedgerStore, config: GatekeeperConfig) -> Self {
        Self {
            store,
            locks: DestinationLocks::new(),
            config,
        }
    }

    /// Open (and migrate) the store described by `config`
    pub async fn open(config: GatekeeperConfig) -> GatekeeperResult<Self> {
        let store = LedgerStore::open(&config.store_options()).await?;
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn locks(&self) -> &DestinationLocks {
        &self.locks
    }

    pub fn config(&self) -> &GatekeeperConfig {
        &self.config
    }

    /// Take the in-process lock for `destination`
    pub(crate) async fn lock(&self, destination: &Destination) -> DestinationGuard {
        let guard = self.locks.acquire(destination).await;
        debug!(destination = %destination, "destination lock acquired");
        guard
    }

    /// Run one transactional attempt, retrying only on storage conflicts.
    ///
    /// Every other error, denials included, is returned as is. When all
    /// attempts hit a conflict the result is `TransientConflict`.
    pub(crate) async fn with_conflict_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        destination: &Destination,
        mut attempt: F,
    ) -> GatekeeperResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GatekeeperResult<T>>,
    {
        let max_attempts = self.config.max_conflict_attempts.max(1);
        let mut tries = 0;

        loop {
            tries += 1;
            match attempt().await {
                Err(err) if err.is_conflict() => {
                    if tries >= max_attempts {
                        warn!(
                            operation,
                            destination = %destination,
                            attempts = tries,
                            "conflict retries exhausted"
                        );
                        return Err(GatekeeperError::TransientConflict {
                            attempts: tries,
                            message: err.to_string(),
                        });
                    }

                    let backoff = self.config.retry_backoff(tries);
                    warn!(
                        operation,
                        destination = %destination,
                        attempt = tries,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "storage conflict, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                result => return result,
            }
        }
    }
}
