use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{CaissonError, Result};

use super::ObjectId;

/// Storage access for one account's object namespace.
///
/// The physical redundant-disk driver sits behind this seam; the engine only
/// needs whole-object reads/writes and block-granular usage accounting.
pub trait ObjectStore: Send + Sync {
    fn get(&self, id: ObjectId) -> Result<Option<Vec<u8>>>;
    fn put(&self, id: ObjectId, data: &[u8]) -> Result<()>;
    fn delete(&self, id: ObjectId) -> Result<()>;
    fn exists(&self, id: ObjectId) -> Result<bool>;
    fn list_objects(&self) -> Result<Vec<ObjectId>>;

    /// Disc usage of a stored object, in blocks.
    fn usage_in_blocks(&self, id: ObjectId) -> Result<i64>;

    /// Accounting granularity in bytes.
    fn block_size(&self) -> u64;
}

/// Number of blocks a payload of `len` bytes occupies. Every stored object
/// occupies at least one block.
pub fn blocks_for(len: u64, block_size: u64) -> i64 {
    (len.max(1).div_ceil(block_size)) as i64
}

/// Objects stored as plain files `o<hex id>` directly under an account root.
pub struct LocalObjectStore {
    root: PathBuf,
    block_size: u64,
}

impl LocalObjectStore {
    pub fn open(root: impl Into<PathBuf>, block_size: u64) -> LocalObjectStore {
        LocalObjectStore {
            root: root.into(),
            block_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, id: ObjectId) -> PathBuf {
        self.root.join(format!("o{:x}", id.0))
    }
}

impl ObjectStore for LocalObjectStore {
    fn get(&self, id: ObjectId) -> Result<Option<Vec<u8>>> {
        match fs::read(self.object_path(id)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, id: ObjectId, data: &[u8]) -> Result<()> {
        fs::write(self.object_path(id), data)?;
        Ok(())
    }

    fn delete(&self, id: ObjectId) -> Result<()> {
        match fs::remove_file(self.object_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(CaissonError::ObjectNotFound(id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, id: ObjectId) -> Result<bool> {
        Ok(self.object_path(id).exists())
    }

    fn list_objects(&self) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(hex) = name.to_str().and_then(|n| n.strip_prefix('o')) else {
                continue;
            };
            if let Ok(id) = u64::from_str_radix(hex, 16) {
                ids.push(ObjectId(id));
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn usage_in_blocks(&self, id: ObjectId) -> Result<i64> {
        match fs::metadata(self.object_path(id)) {
            Ok(meta) => Ok(blocks_for(meta.len(), self.block_size)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(CaissonError::ObjectNotFound(id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn block_size(&self) -> u64 {
        self.block_size
    }
}
