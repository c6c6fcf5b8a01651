use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use caisson_core::accounts::{AccountDatabase, AccountId, AccountRegistry};
use caisson_core::config::StoreConfig;
use caisson_core::housekeeping::CoordinatorHandle;

use crate::config::ServerSection;
use crate::error::ServerError;

/// Shared application state, wrapped in Arc for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub config: ServerSection,
    pub store: StoreConfig,
    pub start_time: std::time::Instant,

    /// Account database handle; its mtime-based invalidation keeps it in
    /// step with the admin tool's edits.
    accounts: Mutex<AccountDatabase>,

    /// Owner-side end of the coordinator channel to the housekeeping
    /// worker.
    housekeeping: Mutex<CoordinatorHandle>,
}

pub(crate) fn lock_unpoisoned<'a, T>(
    lock: &'a Mutex<T>,
    lock_name: &'static str,
) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(lock = lock_name, "mutex poisoned; continuing with inner state");
            poisoned.into_inner()
        }
    }
}

impl AppState {
    pub fn new(
        config: ServerSection,
        store: StoreConfig,
        accounts: AccountDatabase,
        housekeeping: CoordinatorHandle,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                start_time: std::time::Instant::now(),
                accounts: Mutex::new(accounts),
                housekeeping: Mutex::new(housekeeping),
            }),
        }
    }

    /// Resolve an account to its root directory and block size.
    pub fn account_root(&self, id: AccountId) -> Result<(PathBuf, u64), ServerError> {
        let mut db = lock_unpoisoned(&self.inner.accounts, "accounts");
        let registry = AccountRegistry::new(&self.inner.store);
        let (root, disc_set) = registry.account_root(&mut db, id)?;
        Ok((root, disc_set.block_size))
    }

    /// Ask the housekeeping worker to abandon an account so its write lock
    /// frees up. Returns false if the worker is gone.
    pub fn request_account_release(&self, id: AccountId) -> bool {
        lock_unpoisoned(&self.inner.housekeeping, "housekeeping").request_account_release(id)
    }

    /// Forward a reload request to the housekeeping worker.
    pub fn request_housekeeping_reload(&self) -> bool {
        lock_unpoisoned(&self.inner.housekeeping, "housekeeping").request_reload()
    }

    /// Forward a terminate request to the housekeeping worker.
    pub fn request_housekeeping_terminate(&self) -> bool {
        lock_unpoisoned(&self.inner.housekeeping, "housekeeping").request_terminate()
    }

    /// Drain any pending worker reports into the log.
    pub fn drain_worker_reports(&self) {
        let handle = lock_unpoisoned(&self.inner.housekeeping, "housekeeping");
        while let Some(report) = handle.try_recv_report() {
            match report {
                caisson_core::housekeeping::WorkerReport::RunFinished(stats) => {
                    tracing::debug!(?stats, "housekeeping run finished");
                }
                caisson_core::housekeeping::WorkerReport::Fatal(msg) => {
                    tracing::error!(error = %msg, "housekeeping worker reported a fatal error");
                }
            }
        }
    }
}
