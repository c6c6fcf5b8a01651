pub mod database;
pub mod registry;

pub use database::{AccountDatabase, AccountEntry};
pub use registry::AccountRegistry;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CaissonError;

/// 32-bit account identifier. Displays as zero-padded lowercase hex.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AccountId(pub u32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = CaissonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches("0x");
        u32::from_str_radix(hex, 16)
            .map(AccountId)
            .map_err(|_| CaissonError::BadAccountId(s.to_string()))
    }
}
