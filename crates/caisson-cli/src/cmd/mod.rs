pub(crate) mod check;
pub(crate) mod create;
pub(crate) mod delete;
pub(crate) mod info;
pub(crate) mod setlimit;

use caisson_core::accounts::{AccountDatabase, AccountId, AccountRegistry};
use caisson_core::config::StoreConfig;
use caisson_core::error::Result;
use caisson_core::store::AccountLock;

/// Lock retry policy for administrative commands: a live daemon session or
/// housekeeping pass usually finishes within seconds.
const LOCK_ATTEMPTS: usize = 8;
const LOCK_RETRY_DELAY_MS: u64 = 1000;

pub(crate) fn open_database(config: &StoreConfig) -> Result<AccountDatabase> {
    AccountDatabase::read(&config.account_database)
}

/// Resolve an account and take its write lock with bounded retries.
pub(crate) fn lock_account(
    config: &StoreConfig,
    db: &mut AccountDatabase,
    id: AccountId,
) -> Result<(std::path::PathBuf, u64, AccountLock)> {
    let registry = AccountRegistry::new(config);
    let (root, disc_set) = registry.account_root(db, id)?;
    let lock = AccountLock::acquire_with_retry(&root, LOCK_ATTEMPTS, LOCK_RETRY_DELAY_MS)?;
    Ok((root, disc_set.block_size, lock))
}
