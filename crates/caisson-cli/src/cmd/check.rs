use caisson_core::accounts::{AccountId, AccountRegistry};
use caisson_core::config::StoreConfig;
use caisson_core::error::Result;
use caisson_core::store::check::{check_account, CheckStats};
use caisson_core::store::LocalObjectStore;

use super::{lock_account, open_database};

/// Returns true if errors were found and not all fixed.
pub(crate) fn run(config: &StoreConfig, account: &str, fix: bool, quiet: bool) -> Result<bool> {
    let id: AccountId = account.parse()?;
    let mut db = open_database(config)?;

    // A dry check only reads; fixing rewrites state and needs the lock.
    if fix {
        let (root, block_size, _lock) = lock_account(config, &mut db, id)?;
        let store = LocalObjectStore::open(&root, block_size);
        let stats = check_account(&store, &root, true, quiet)?;
        report(account, &stats, quiet);
        return Ok(stats.errors_found > stats.errors_fixed);
    }

    let registry = AccountRegistry::new(config);
    let (root, disc_set) = registry.account_root(&mut db, id)?;
    let store = LocalObjectStore::open(&root, disc_set.block_size);
    let stats = check_account(&store, &root, false, quiet)?;
    report(account, &stats, quiet);
    Ok(stats.errors_found > 0)
}

fn report(account: &str, stats: &CheckStats, quiet: bool) {
    if stats.errors_found == 0 {
        if !quiet {
            println!("Account {account} is clean");
        }
    } else {
        println!(
            "Account {account}: {} error(s) found, {} fixed",
            stats.errors_found, stats.errors_fixed
        );
    }
}
