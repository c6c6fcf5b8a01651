use std::io::BufRead;

use caisson_core::accounts::{AccountId, AccountRegistry};
use caisson_core::config::StoreConfig;
use caisson_core::error::Result;

use super::{lock_account, open_database};

pub(crate) fn run(config: &StoreConfig, account: &str, yes: bool) -> Result<()> {
    let id: AccountId = account.parse()?;
    let mut db = open_database(config)?;

    // Something this destructive definitely needs the write lock.
    let (_root, _block_size, _lock) = lock_account(config, &mut db, id)?;

    if !yes {
        println!("Really delete account {id}? (type 'yes' to confirm)");
        let mut response = String::new();
        std::io::stdin().lock().read_line(&mut response)?;
        if response.trim() != "yes" {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    let registry = AccountRegistry::new(config);
    registry.delete_account(&mut db, id)?;

    println!("Account {id} deleted");
    Ok(())
}
