pub mod backend;
pub mod check;
pub mod directory;
pub mod lock;
pub mod usage;

pub use backend::{LocalObjectStore, ObjectStore};
pub use directory::{DirectoryEntry, EntryFlags, StoreDirectory};
pub use lock::AccountLock;
pub use usage::AccountUsageInfo;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CaissonError;

/// Identifier of a stored object (file content or a serialized directory).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

/// Every account's root directory has this well-known object ID.
pub const ROOT_DIRECTORY_ID: ObjectId = ObjectId(1);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = CaissonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches("0x");
        u64::from_str_radix(hex, 16)
            .map(ObjectId)
            .map_err(|_| CaissonError::InvalidDirectory(format!("'{s}' is not an object ID")))
    }
}
