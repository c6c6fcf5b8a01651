use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use crate::accounts::AccountId;
use crate::error::Result;
use crate::store::backend::blocks_for;
use crate::store::{
    AccountUsageInfo, DirectoryEntry, EntryFlags, LocalObjectStore, ObjectId, ObjectStore,
    StoreDirectory, ROOT_DIRECTORY_ID,
};

/// Block size used by test stores: large enough that every directory
/// object occupies exactly one block, keeping the arithmetic predictable.
pub const TEST_BLOCK_SIZE: u64 = 65536;

pub const TEST_ACCOUNT: AccountId = AccountId(0x05);

/// In-memory object store for tests that don't need a real filesystem.
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<ObjectId, Vec<u8>>>,
    block_size: u64,
}

impl MemoryObjectStore {
    pub fn new() -> MemoryObjectStore {
        MemoryObjectStore {
            objects: Mutex::new(HashMap::new()),
            block_size: TEST_BLOCK_SIZE,
        }
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, id: ObjectId) -> Result<Option<Vec<u8>>> {
        Ok(self.objects.lock().unwrap().get(&id).cloned())
    }

    fn put(&self, id: ObjectId, data: &[u8]) -> Result<()> {
        self.objects.lock().unwrap().insert(id, data.to_vec());
        Ok(())
    }

    fn delete(&self, id: ObjectId) -> Result<()> {
        match self.objects.lock().unwrap().remove(&id) {
            Some(_) => Ok(()),
            None => Err(crate::error::CaissonError::ObjectNotFound(id)),
        }
    }

    fn exists(&self, id: ObjectId) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(&id))
    }

    fn list_objects(&self) -> Result<Vec<ObjectId>> {
        let mut ids: Vec<ObjectId> = self.objects.lock().unwrap().keys().copied().collect();
        ids.sort();
        Ok(ids)
    }

    fn usage_in_blocks(&self, id: ObjectId) -> Result<i64> {
        match self.objects.lock().unwrap().get(&id) {
            Some(data) => Ok(blocks_for(data.len() as u64, self.block_size)),
            None => Err(crate::error::CaissonError::ObjectNotFound(id)),
        }
    }

    fn block_size(&self) -> u64 {
        self.block_size
    }
}

/// A throwaway on-disk account root with an empty root directory and a
/// seeded usage file.
pub struct TestAccount {
    pub tmp: TempDir,
    pub store: LocalObjectStore,
    pub id: AccountId,
}

impl TestAccount {
    pub fn root(&self) -> &Path {
        self.tmp.path()
    }

    pub fn usage(&self) -> AccountUsageInfo {
        AccountUsageInfo::load(self.root()).unwrap()
    }

    pub fn save_usage(&self, usage: &AccountUsageInfo) {
        usage.save(self.root()).unwrap();
    }
}

/// Create an on-disk test account with the given limits. The usage file
/// starts out accounting only for the root directory.
pub fn test_account(soft_limit: i64, hard_limit: i64) -> TestAccount {
    let tmp = tempfile::tempdir().unwrap();
    let store = LocalObjectStore::open(tmp.path(), TEST_BLOCK_SIZE);

    let root_dir = StoreDirectory::new(ROOT_DIRECTORY_ID, ROOT_DIRECTORY_ID);
    let root_blocks = root_dir.save(&store).unwrap();

    let mut usage = AccountUsageInfo::new(TEST_ACCOUNT, soft_limit, hard_limit);
    usage.blocks_used = root_blocks;
    usage.blocks_in_directories = root_blocks;
    usage.save(tmp.path()).unwrap();

    TestAccount {
        tmp,
        store,
        id: TEST_ACCOUNT,
    }
}

/// Add a file entry to a directory: stores a small payload object and
/// appends an entry claiming `size_in_blocks`.
pub fn add_file(
    store: &dyn ObjectStore,
    dir_id: ObjectId,
    object_id: ObjectId,
    name: &str,
    flags: EntryFlags,
    size_in_blocks: i64,
    modification_time: DateTime<Utc>,
) {
    store.put(object_id, name.as_bytes()).unwrap();
    let mut dir = StoreDirectory::load(store, dir_id).unwrap();
    dir.add_entry(DirectoryEntry {
        object_id,
        name: name.to_string(),
        flags: flags | EntryFlags::FILE,
        size_in_blocks,
        attributes_hash: 0,
        modification_time,
        mark_number: 0,
    });
    dir.save(store).unwrap();
}

/// Create a subdirectory object and add its entry (flagged `extra_flags`
/// in addition to DIR) to the containing directory.
pub fn add_subdirectory(
    store: &dyn ObjectStore,
    container_id: ObjectId,
    object_id: ObjectId,
    name: &str,
    extra_flags: EntryFlags,
) {
    let sub = StoreDirectory::new(object_id, container_id);
    let blocks = sub.save(store).unwrap();
    let mut container = StoreDirectory::load(store, container_id).unwrap();
    container.add_entry(DirectoryEntry {
        object_id,
        name: name.to_string(),
        flags: extra_flags | EntryFlags::DIR,
        size_in_blocks: blocks,
        attributes_hash: 0,
        modification_time: Utc::now(),
        mark_number: 0,
    });
    container.save(store).unwrap();
}

/// Recompute the sum of blocks for every object reachable from the root:
/// directory disc usage plus entry sizes.
pub fn tree_blocks(store: &dyn ObjectStore) -> i64 {
    let mut total = 0;
    let mut pending = vec![ROOT_DIRECTORY_ID];
    while let Some(dir_id) = pending.pop() {
        let dir = StoreDirectory::load(store, dir_id).unwrap();
        total += store.usage_in_blocks(dir_id).unwrap();
        for entry in dir.entries() {
            if entry.is_dir() {
                pending.push(entry.object_id);
            } else {
                total += entry.size_in_blocks;
            }
        }
    }
    total
}
