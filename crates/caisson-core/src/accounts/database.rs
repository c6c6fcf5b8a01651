use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{CaissonError, Result};

use super::AccountId;

/// One line of the account database: which disc set an account lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountEntry {
    pub id: AccountId,
    pub disc_set: i32,
}

/// The on-disk database of accounts: one `<hex id>:<discset>` line each.
///
/// The admin tool and the long-running daemon are separate processes sharing
/// this file with no other synchronization, so every read operation first
/// compares the file's modification time against the one recorded at load
/// and transparently reloads on mismatch.
pub struct AccountDatabase {
    path: PathBuf,
    entries: BTreeMap<AccountId, AccountEntry>,
    loaded_mtime: Option<SystemTime>,
}

impl AccountDatabase {
    /// Load the database from `path`.
    pub fn read(path: impl Into<PathBuf>) -> Result<AccountDatabase> {
        let mut db = AccountDatabase {
            path: path.into(),
            entries: BTreeMap::new(),
            loaded_mtime: None,
        };
        db.read_file()?;
        Ok(db)
    }

    /// Create an empty database file (refusing to clobber an existing one)
    /// and return the loaded handle.
    pub fn create(path: impl Into<PathBuf>) -> Result<AccountDatabase> {
        let path = path.into();
        if path.exists() {
            return Err(CaissonError::BadAccountDatabase(format!(
                "{} already exists",
                path.display()
            )));
        }
        fs::write(&path, "")?;
        Self::read(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&mut self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let mut entries = BTreeMap::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (id_part, disc_part) = line.split_once(':').ok_or_else(|| {
                CaissonError::BadAccountDatabase(format!("malformed line '{line}'"))
            })?;
            let id = u32::from_str_radix(id_part, 16).map_err(|_| {
                CaissonError::BadAccountDatabase(format!("bad account ID in line '{line}'"))
            })?;
            let disc_set: i32 = disc_part.parse().map_err(|_| {
                CaissonError::BadAccountDatabase(format!("bad disc set in line '{line}'"))
            })?;
            let id = AccountId(id);
            entries.insert(id, AccountEntry { id, disc_set });
        }

        self.entries = entries;
        self.loaded_mtime = Some(fs::metadata(&self.path)?.modified()?);
        Ok(())
    }

    /// Reload if the backing file changed since we last read it.
    fn check_up_to_date(&mut self) -> Result<()> {
        let mtime = fs::metadata(&self.path)?.modified()?;
        if self.loaded_mtime != Some(mtime) {
            self.read_file()?;
        }
        Ok(())
    }

    pub fn entry_exists(&mut self, id: AccountId) -> Result<bool> {
        self.check_up_to_date()?;
        Ok(self.entries.contains_key(&id))
    }

    pub fn entry(&mut self, id: AccountId) -> Result<AccountEntry> {
        self.check_up_to_date()?;
        self.entries
            .get(&id)
            .copied()
            .ok_or(CaissonError::NoSuchAccount(id))
    }

    /// All account IDs, in ascending order.
    pub fn account_ids(&mut self) -> Result<Vec<AccountId>> {
        self.check_up_to_date()?;
        Ok(self.entries.keys().copied().collect())
    }

    pub fn add_entry(&mut self, id: AccountId, disc_set: i32) -> Result<()> {
        self.check_up_to_date()?;
        self.entries.insert(id, AccountEntry { id, disc_set });
        Ok(())
    }

    pub fn delete_entry(&mut self, id: AccountId) -> Result<()> {
        self.check_up_to_date()?;
        if self.entries.remove(&id).is_none() {
            return Err(CaissonError::NoSuchAccount(id));
        }
        Ok(())
    }

    /// Rewrite the whole file from the in-memory entries. Not a log append:
    /// the file is truncated and every entry written back in ID order.
    pub fn write(&self) -> Result<()> {
        let mut out = String::new();
        for entry in self.entries.values() {
            // fmt::Write on String cannot fail
            let _ = writeln!(out, "{:x}:{}", entry.id.0, entry.disc_set);
        }
        fs::write(&self.path, out)?;
        Ok(())
    }
}
