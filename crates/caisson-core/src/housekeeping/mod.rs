pub mod account;
pub mod coordinator;

pub use account::{AccountHousekeeper, PassStats};
pub use coordinator::{
    coordinator_channel, Command, CoordinatorHandle, WorkerEndpoint, WorkerReport,
};

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::accounts::{AccountDatabase, AccountId, AccountRegistry};
use crate::config::StoreConfig;
use crate::error::{CaissonError, Result};
use crate::store::LocalObjectStore;

/// Aggregate statistics for one housekeeping run across all accounts.
#[derive(Debug, Default, Clone, Copy)]
pub struct HousekeepingStats {
    pub accounts_processed: u64,
    pub accounts_skipped_locked: u64,
    pub accounts_failed: u64,
    pub files_deleted: u64,
    pub empty_directories_deleted: u64,
    pub blocks_freed: i64,
}

/// Spawn the housekeeping worker on its own thread, returning the
/// owner-side coordinator handle and the thread's join handle.
///
/// The worker owns no shared state with its caller: all communication goes
/// over the returned channel.
pub fn spawn(config: StoreConfig) -> std::io::Result<(CoordinatorHandle, JoinHandle<()>)> {
    let (handle, endpoint) = coordinator_channel();
    let join = std::thread::Builder::new()
        .name("housekeeping".into())
        .spawn(move || HousekeepingWorker::new(config, endpoint).run_loop())?;
    Ok((handle, join))
}

/// The reclamation worker: wakes on a configured interval, walks every
/// account, and reclaims old/deleted object versions, staying responsive
/// to coordinator commands throughout.
pub struct HousekeepingWorker {
    config: StoreConfig,
    endpoint: WorkerEndpoint,
    last_run: Option<Instant>,
}

impl HousekeepingWorker {
    pub fn new(config: StoreConfig, endpoint: WorkerEndpoint) -> HousekeepingWorker {
        HousekeepingWorker {
            config,
            endpoint,
            last_run: None,
        }
    }

    /// The worker's main loop. Returns when terminate is requested, the
    /// owner goes away, or a coordinator protocol violation makes carrying
    /// on unsafe.
    pub fn run_loop(mut self) {
        loop {
            if self.endpoint.terminate_wanted() {
                break;
            }

            let interval = Duration::from_secs(self.config.housekeeping.interval_seconds);
            let due = match self.last_run {
                None => true,
                Some(at) => at.elapsed() >= interval,
            };

            if due {
                self.last_run = Some(Instant::now());
                match self.run_once() {
                    Ok(stats) => self.endpoint.report(WorkerReport::RunFinished(stats)),
                    Err(e @ CaissonError::CoordinatorProtocol(_)) => {
                        error!(error = %e, "housekeeping worker desynchronized from owner");
                        self.endpoint.report(WorkerReport::Fatal(e.to_string()));
                        return;
                    }
                    Err(e) => {
                        // A failed run (e.g. unreadable account database) is
                        // not fatal to the worker; the operator may fix the
                        // store before the next run.
                        error!(error = %e, "housekeeping run failed");
                    }
                }
            }

            if self.endpoint.terminate_wanted() {
                break;
            }

            // Wait for the next run while staying responsive to control
            // messages: block on the channel for the remaining time,
            // clamped to [1, 60] seconds.
            let interval = Duration::from_secs(self.config.housekeeping.interval_seconds);
            let elapsed = self.last_run.map(|at| at.elapsed()).unwrap_or(interval);
            let seconds_to_go = interval.saturating_sub(elapsed).as_secs().clamp(1, 60);
            match self
                .endpoint
                .check_for_command(None, Duration::from_secs(seconds_to_go))
            {
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "housekeeping worker desynchronized from owner");
                    self.endpoint.report(WorkerReport::Fatal(e.to_string()));
                    return;
                }
            }

            if self.endpoint.take_reload_wanted() {
                self.reload_config();
            }
        }
        info!("housekeeping worker stopped");
    }

    fn reload_config(&mut self) {
        match self.config.reload() {
            Ok(config) => {
                info!("housekeeping configuration reloaded");
                self.config = config;
            }
            Err(e) => error!(error = %e, "failed to reload configuration, keeping previous"),
        }
    }

    /// One full housekeeping run over the current account list.
    pub fn run_once(&mut self) -> Result<HousekeepingStats> {
        info!("starting housekeeping");

        let mut db = AccountDatabase::read(&self.config.account_database)?;
        let account_ids = db.account_ids()?;
        let registry = AccountRegistry::new(&self.config);
        let mut stats = HousekeepingStats::default();

        for id in account_ids {
            match self.housekeep_account(&registry, &mut db, id) {
                Ok(pass) if pass.skipped_locked => stats.accounts_skipped_locked += 1,
                Ok(pass) => {
                    stats.accounts_processed += 1;
                    stats.files_deleted += pass.files_deleted;
                    stats.empty_directories_deleted += pass.empty_directories_deleted;
                    stats.blocks_freed += pass.blocks_freed;
                }
                Err(e @ CaissonError::CoordinatorProtocol(_)) => return Err(e),
                Err(e) => {
                    // One corrupt account must not block reclamation for
                    // all the others.
                    error!(
                        account = %id,
                        error = %e,
                        "housekeeping failed for account, continuing with the next"
                    );
                    stats.accounts_failed += 1;
                }
            }

            // Service pending yield/reload/terminate commands promptly
            // between accounts, not just at the top of the outer loop.
            self.endpoint
                .check_for_command(None, Duration::from_millis(10))?;
            if self.endpoint.terminate_wanted() {
                break;
            }
        }

        info!(
            accounts = stats.accounts_processed,
            skipped = stats.accounts_skipped_locked,
            failed = stats.accounts_failed,
            files_deleted = stats.files_deleted,
            directories_deleted = stats.empty_directories_deleted,
            blocks_freed = stats.blocks_freed,
            "finished housekeeping"
        );
        Ok(stats)
    }

    fn housekeep_account(
        &self,
        registry: &AccountRegistry<'_>,
        db: &mut AccountDatabase,
        id: AccountId,
    ) -> Result<PassStats> {
        let (root, disc_set) = registry.account_root(db, id)?;
        let store = LocalObjectStore::open(&root, disc_set.block_size);
        let retention =
            Duration::from_secs(self.config.housekeeping.deleted_retention_seconds);
        AccountHousekeeper::new(id, &store, &root, &self.endpoint, retention).run()
    }
}
