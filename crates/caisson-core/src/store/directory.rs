use std::ops::BitOr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CaissonError, Result};

use super::backend::ObjectStore;
use super::ObjectId;

/// Flag bits carried by a directory entry, wire-compatible with the client
/// protocol's bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryFlags(pub u16);

impl EntryFlags {
    pub const NONE: EntryFlags = EntryFlags(0);
    pub const FILE: EntryFlags = EntryFlags(1);
    pub const DIR: EntryFlags = EntryFlags(2);
    /// Tombstoned by the client; awaiting reclamation.
    pub const DELETED: EntryFlags = EntryFlags(4);
    /// Superseded content of a logical filename.
    pub const OLD_VERSION: EntryFlags = EntryFlags(8);
    /// Housekeeping must reclaim this on its next pass regardless of quota.
    pub const REMOVE_ASAP: EntryFlags = EntryFlags(16);

    pub fn contains(self, other: EntryFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit of `other` is set.
    pub fn intersects(self, other: EntryFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: EntryFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: EntryFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for EntryFlags {
    type Output = EntryFlags;

    fn bitor(self, rhs: EntryFlags) -> EntryFlags {
        EntryFlags(self.0 | rhs.0)
    }
}

/// One object within a store directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub object_id: ObjectId,

    /// Client-encoded (possibly encrypted) filename; opaque to the server.
    pub name: String,

    pub flags: EntryFlags,
    pub size_in_blocks: i64,
    pub attributes_hash: u64,
    pub modification_time: DateTime<Utc>,

    /// Client store marker generation this version was uploaded under.
    pub mark_number: u32,
}

impl DirectoryEntry {
    pub fn is_file(&self) -> bool {
        self.flags.contains(EntryFlags::FILE)
    }

    pub fn is_dir(&self) -> bool {
        self.flags.contains(EntryFlags::DIR)
    }

    /// The latest, non-deleted content for its logical filename.
    pub fn is_current(&self) -> bool {
        !self
            .flags
            .intersects(EntryFlags::OLD_VERSION | EntryFlags::DELETED)
    }
}

/// The logical directory of objects for one level of an account's tree.
/// Stored as a distinct object in the account's object namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDirectory {
    pub object_id: ObjectId,

    /// The directory this one is an entry of. The root directory contains
    /// itself.
    pub container_id: ObjectId,

    entries: Vec<DirectoryEntry>,
}

impl StoreDirectory {
    pub fn new(object_id: ObjectId, container_id: ObjectId) -> StoreDirectory {
        StoreDirectory {
            object_id,
            container_id,
            entries: Vec::new(),
        }
    }

    pub fn load(store: &dyn ObjectStore, id: ObjectId) -> Result<StoreDirectory> {
        let data = store.get(id)?.ok_or(CaissonError::ObjectNotFound(id))?;
        let dir: StoreDirectory = serde_json::from_slice(&data)
            .map_err(|e| CaissonError::InvalidDirectory(format!("object {id}: {e}")))?;
        if dir.object_id != id {
            return Err(CaissonError::InvalidDirectory(format!(
                "object {id} claims to be directory {}",
                dir.object_id
            )));
        }
        Ok(dir)
    }

    /// Write the directory back to the store, returning its new size in
    /// blocks.
    pub fn save(&self, store: &dyn ObjectStore) -> Result<i64> {
        let data = serde_json::to_vec(self)?;
        store.put(self.object_id, &data)?;
        store.usage_in_blocks(self.object_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.iter()
    }

    /// Entries with every bit of `must_be_set` present.
    pub fn entries_with(&self, must_be_set: EntryFlags) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.iter().filter(move |e| e.flags.contains(must_be_set))
    }

    pub fn find_entry(&self, id: ObjectId) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| e.object_id == id)
    }

    pub fn find_entry_mut(&mut self, id: ObjectId) -> Option<&mut DirectoryEntry> {
        self.entries.iter_mut().find(|e| e.object_id == id)
    }

    /// The current (non-old, non-deleted) version for a logical filename.
    pub fn current_entry(&self, name: &str) -> Option<&DirectoryEntry> {
        self.entries.iter().find(|e| e.name == name && e.is_current())
    }

    pub fn current_entry_mut(&mut self, name: &str) -> Option<&mut DirectoryEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.name == name && e.is_current())
    }

    pub fn add_entry(&mut self, entry: DirectoryEntry) {
        self.entries.push(entry);
    }

    pub fn remove_entry(&mut self, id: ObjectId) -> Option<DirectoryEntry> {
        let idx = self.entries.iter().position(|e| e.object_id == id)?;
        Some(self.entries.remove(idx))
    }

    /// Demote the current version of `name` (if any) to an old version,
    /// returning its size in blocks.
    pub fn demote_current(&mut self, name: &str) -> Option<i64> {
        let entry = self.current_entry_mut(name)?;
        entry.flags.insert(EntryFlags::OLD_VERSION);
        Some(entry.size_in_blocks)
    }
}
