use caisson_core::accounts::{AccountId, AccountRegistry};
use caisson_core::config::{parse_size_in_blocks, StoreConfig};
use caisson_core::error::Result;

use super::open_database;

pub(crate) fn run(
    config: &StoreConfig,
    account: &str,
    disc_num: i32,
    soft_limit: &str,
    hard_limit: &str,
) -> Result<()> {
    let id: AccountId = account.parse()?;
    let block_size = config.disc_set(disc_num)?.block_size;
    let soft = parse_size_in_blocks(soft_limit, block_size)?;
    let hard = parse_size_in_blocks(hard_limit, block_size)?;

    let mut db = open_database(config)?;
    let registry = AccountRegistry::new(config);
    registry.create_account(&mut db, id, disc_num, soft, hard)?;

    println!("Account {id} created on disc set {disc_num}");
    Ok(())
}
