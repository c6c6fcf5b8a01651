use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::config::{DiscSetConfig, StoreConfig};
use crate::error::{CaissonError, Result};
use crate::store::usage::check_limits;
use crate::store::{AccountUsageInfo, LocalObjectStore, StoreDirectory, ROOT_DIRECTORY_ID};

use super::{AccountDatabase, AccountId};

/// Derives on-disk roots for accounts from their ID and disc set, and
/// creates/destroys accounts.
pub struct AccountRegistry<'a> {
    config: &'a StoreConfig,
}

impl<'a> AccountRegistry<'a> {
    pub fn new(config: &'a StoreConfig) -> AccountRegistry<'a> {
        AccountRegistry { config }
    }

    pub fn disc_set(&self, num: i32) -> Result<&'a DiscSetConfig> {
        self.config.disc_set(num)
    }

    /// Root directory for an account on a given disc set:
    /// `<discset root>/<low byte hex>/<8-hex id>`. The two-level layout
    /// keeps per-directory fanout bounded.
    pub fn account_root_dir(&self, id: AccountId, disc_set: i32) -> Result<PathBuf> {
        let ds = self.disc_set(disc_set)?;
        Ok(ds
            .root
            .join(format!("{:02x}", id.0 & 0xff))
            .join(format!("{:08x}", id.0)))
    }

    /// Resolve an existing account to its root directory and disc set.
    pub fn account_root(
        &self,
        db: &mut AccountDatabase,
        id: AccountId,
    ) -> Result<(PathBuf, &'a DiscSetConfig)> {
        let entry = db.entry(id)?;
        let root = self.account_root_dir(id, entry.disc_set)?;
        Ok((root, self.disc_set(entry.disc_set)?))
    }

    /// Create a new account: root directory, empty root store directory,
    /// initial usage counters, and the database entry.
    pub fn create_account(
        &self,
        db: &mut AccountDatabase,
        id: AccountId,
        disc_set: i32,
        soft_limit: i64,
        hard_limit: i64,
    ) -> Result<()> {
        check_limits(soft_limit, hard_limit)?;
        if db.entry_exists(id)? {
            return Err(CaissonError::AccountExists(id));
        }
        let ds = self.disc_set(disc_set)?;
        let root = self.account_root_dir(id, disc_set)?;
        fs::create_dir_all(&root)?;

        let store = LocalObjectStore::open(&root, ds.block_size);
        let root_dir = StoreDirectory::new(ROOT_DIRECTORY_ID, ROOT_DIRECTORY_ID);
        let root_dir_blocks = root_dir.save(&store)?;

        let mut usage = AccountUsageInfo::new(id, soft_limit, hard_limit);
        usage.blocks_used = root_dir_blocks;
        usage.blocks_in_directories = root_dir_blocks;
        usage.save(&root)?;

        db.add_entry(id, disc_set)?;
        db.write()?;

        info!(account = %id, disc_set, "account created");
        Ok(())
    }

    /// Remove an account's database entry and its whole on-disk tree.
    /// The caller must hold the account's write lock.
    pub fn delete_account(&self, db: &mut AccountDatabase, id: AccountId) -> Result<()> {
        let entry = db.entry(id)?;
        let root = self.account_root_dir(id, entry.disc_set)?;

        db.delete_entry(id)?;
        db.write()?;

        // The lock file lives inside the root; the caller's open descriptor
        // keeps the flock valid until its guard drops.
        fs::remove_dir_all(&root)?;

        info!(account = %id, "account deleted");
        Ok(())
    }
}
