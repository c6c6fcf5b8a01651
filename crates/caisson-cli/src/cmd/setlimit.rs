use caisson_core::accounts::AccountId;
use caisson_core::config::{parse_size_in_blocks, StoreConfig};
use caisson_core::error::Result;
use caisson_core::store::AccountUsageInfo;

use super::{lock_account, open_database};

pub(crate) fn run(
    config: &StoreConfig,
    account: &str,
    soft_limit: &str,
    hard_limit: &str,
) -> Result<()> {
    let id: AccountId = account.parse()?;
    let mut db = open_database(config)?;

    // The write lock keeps a live daemon or housekeeping pass from
    // rewriting the usage file underneath us.
    let (root, block_size, _lock) = lock_account(config, &mut db, id)?;

    let soft = parse_size_in_blocks(soft_limit, block_size)?;
    let hard = parse_size_in_blocks(hard_limit, block_size)?;

    let mut usage = AccountUsageInfo::load(&root)?;
    usage.set_limits(soft, hard)?;
    usage.save(&root)?;

    println!("Account {id} limits set: soft {soft} blocks, hard {hard} blocks");
    Ok(())
}
