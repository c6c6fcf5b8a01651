use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::accounts::AccountId;
use crate::error::{CaissonError, Result};

use super::{ObjectId, ROOT_DIRECTORY_ID};

/// Filename of the usage counters file inside an account root.
pub const USAGE_INFO_FILENAME: &str = "usage.json";

/// The soft limit may not exceed this percentage of the hard limit.
pub const MAX_SOFT_LIMIT_PERCENT: i64 = 97;

/// Persisted per-account counters and quota limits. Mutated only by the
/// account's sole current writer — a client session or the housekeeping
/// worker, never both; the account write lock enforces that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUsageInfo {
    pub account_id: AccountId,
    pub last_object_id_used: ObjectId,
    pub blocks_used: i64,
    pub blocks_in_old_files: i64,
    pub blocks_in_deleted_files: i64,
    pub blocks_in_directories: i64,
    pub blocks_soft_limit: i64,
    pub blocks_hard_limit: i64,
    pub client_store_marker: u64,
}

impl AccountUsageInfo {
    pub fn new(account_id: AccountId, soft_limit: i64, hard_limit: i64) -> AccountUsageInfo {
        AccountUsageInfo {
            account_id,
            last_object_id_used: ROOT_DIRECTORY_ID,
            blocks_used: 0,
            blocks_in_old_files: 0,
            blocks_in_deleted_files: 0,
            blocks_in_directories: 0,
            blocks_soft_limit: soft_limit,
            blocks_hard_limit: hard_limit,
            client_store_marker: 0,
        }
    }

    pub fn load(account_root: &Path) -> Result<AccountUsageInfo> {
        let path = account_root.join(USAGE_INFO_FILENAME);
        let data = fs::read(&path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Persist via write-to-temp + rename so a crashed writer never leaves a
    /// torn usage file behind.
    pub fn save(&self, account_root: &Path) -> Result<()> {
        let path = account_root.join(USAGE_INFO_FILENAME);
        let tmp = account_root.join(format!("{USAGE_INFO_FILENAME}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    pub fn set_limits(&mut self, soft_limit: i64, hard_limit: i64) -> Result<()> {
        check_limits(soft_limit, hard_limit)?;
        self.blocks_soft_limit = soft_limit;
        self.blocks_hard_limit = hard_limit;
        Ok(())
    }

    /// Allocate the next object ID for this account.
    pub fn next_object_id(&mut self) -> ObjectId {
        self.last_object_id_used = ObjectId(self.last_object_id_used.0 + 1);
        self.last_object_id_used
    }
}

/// Validate a soft/hard limit pair: the soft limit must be strictly below
/// the hard limit and no more than 97% of it.
pub fn check_limits(soft_limit: i64, hard_limit: i64) -> Result<()> {
    if soft_limit <= 0 || hard_limit <= 0 {
        return Err(CaissonError::BadLimits(
            "limits must be positive block counts".into(),
        ));
    }
    if soft_limit >= hard_limit {
        return Err(CaissonError::BadLimits(
            "soft limit must be less than the hard limit".into(),
        ));
    }
    if soft_limit > hard_limit * MAX_SOFT_LIMIT_PERCENT / 100 {
        return Err(CaissonError::BadLimits(format!(
            "soft limit must not exceed {MAX_SOFT_LIMIT_PERCENT}% of the hard limit"
        )));
    }
    Ok(())
}
