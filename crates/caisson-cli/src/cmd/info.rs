use caisson_core::accounts::{AccountId, AccountRegistry};
use caisson_core::config::StoreConfig;
use caisson_core::error::Result;
use caisson_core::store::AccountUsageInfo;

use crate::format::{format_blocks, usage_bar};

use super::open_database;

pub(crate) fn run(config: &StoreConfig, account: &str, machine: bool) -> Result<()> {
    let id: AccountId = account.parse()?;
    let mut db = open_database(config)?;
    let registry = AccountRegistry::new(config);
    let (root, disc_set) = registry.account_root(&mut db, id)?;

    // Reads need no lock; the usage file is replaced atomically by writers.
    let usage = AccountUsageInfo::load(&root)?;

    if machine {
        println!("account_id: {id}");
        println!("disc_set: {}", disc_set.num);
        println!("blocks_used: {}", usage.blocks_used);
        println!("blocks_in_old_files: {}", usage.blocks_in_old_files);
        println!("blocks_in_deleted_files: {}", usage.blocks_in_deleted_files);
        println!("blocks_in_directories: {}", usage.blocks_in_directories);
        println!("blocks_soft_limit: {}", usage.blocks_soft_limit);
        println!("blocks_hard_limit: {}", usage.blocks_hard_limit);
        println!("last_object_id_used: {}", usage.last_object_id_used);
        println!("client_store_marker: {}", usage.client_store_marker);
        return Ok(());
    }

    let bs = disc_set.block_size;
    println!("Account ID:          {id}");
    println!("Disc set:            {}", disc_set.num);
    println!(
        "Blocks used:         {} {}",
        format_blocks(usage.blocks_used, bs),
        usage_bar(usage.blocks_used, usage.blocks_hard_limit)
    );
    println!(
        "  in old files:      {}",
        format_blocks(usage.blocks_in_old_files, bs)
    );
    println!(
        "  in deleted files:  {}",
        format_blocks(usage.blocks_in_deleted_files, bs)
    );
    println!(
        "  in directories:    {}",
        format_blocks(usage.blocks_in_directories, bs)
    );
    println!(
        "Soft limit:          {}",
        format_blocks(usage.blocks_soft_limit, bs)
    );
    println!(
        "Hard limit:          {}",
        format_blocks(usage.blocks_hard_limit, bs)
    );
    println!("Last object ID:      {}", usage.last_object_id_used);
    println!("Client store marker: {}", usage.client_store_marker);
    Ok(())
}
