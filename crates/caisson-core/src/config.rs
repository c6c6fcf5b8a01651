use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CaissonError, Result};

/// Store-wide configuration shared by the daemon and the admin tool.
///
/// The two run as separate processes against the same YAML file; the daemon
/// re-reads it when asked to reload (SIGHUP forwarded over the coordinator
/// channel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the flat-file account database.
    pub account_database: PathBuf,

    /// Physical storage groups accounts are assigned to.
    pub disc_sets: Vec<DiscSetConfig>,

    #[serde(default)]
    pub housekeeping: HousekeepingConfig,

    #[serde(skip)]
    source_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscSetConfig {
    /// Disc set number referenced by account database entries.
    pub num: i32,

    /// Directory that account roots for this set live under.
    pub root: PathBuf,

    /// Accounting granularity, in bytes.
    #[serde(default = "default_block_size")]
    pub block_size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HousekeepingConfig {
    /// Seconds between housekeeping runs.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Tombstoned entries younger than this are not reclaimed.
    #[serde(default)]
    pub deleted_retention_seconds: u64,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            deleted_retention_seconds: 0,
        }
    }
}

fn default_block_size() -> u64 {
    4096
}

fn default_interval_seconds() -> u64 {
    3600
}

impl StoreConfig {
    /// Build a configuration programmatically, with no backing file.
    pub fn new(
        account_database: impl Into<PathBuf>,
        disc_sets: Vec<DiscSetConfig>,
    ) -> StoreConfig {
        StoreConfig {
            account_database: account_database.into(),
            disc_sets,
            housekeeping: HousekeepingConfig::default(),
            source_path: None,
        }
    }

    pub fn load(path: &Path) -> Result<StoreConfig> {
        let text = std::fs::read_to_string(path)?;
        let mut config: StoreConfig = serde_yaml::from_str(&text)
            .map_err(|e| CaissonError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Re-read the configuration from the file it was loaded from.
    pub fn reload(&self) -> Result<StoreConfig> {
        match &self.source_path {
            Some(path) => Self::load(path),
            None => Ok(self.clone()),
        }
    }

    pub fn disc_set(&self, num: i32) -> Result<&DiscSetConfig> {
        self.disc_sets
            .iter()
            .find(|ds| ds.num == num)
            .ok_or(CaissonError::NoSuchDiscSet(num))
    }

    fn validate(&self) -> Result<()> {
        if self.disc_sets.is_empty() {
            return Err(CaissonError::Config(
                "at least one disc set must be configured".into(),
            ));
        }
        for ds in &self.disc_sets {
            if ds.block_size == 0 {
                return Err(CaissonError::Config(format!(
                    "disc set {} has a zero block size",
                    ds.num
                )));
            }
            if self.disc_sets.iter().filter(|d| d.num == ds.num).count() > 1 {
                return Err(CaissonError::Config(format!(
                    "disc set {} is defined more than once",
                    ds.num
                )));
            }
        }
        Ok(())
    }
}

/// Parse a size argument with a units suffix: `B` for blocks, `M` for
/// megabytes, `G` for gigabytes. Byte units are converted using the disc
/// set's block size.
pub fn parse_size_in_blocks(s: &str, block_size: u64) -> Result<i64> {
    let s = s.trim();
    let digits_end = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| CaissonError::BadSizeString(s.to_string()))?;
    let (number, suffix) = s.split_at(digits_end);
    let n: i64 = number
        .parse()
        .map_err(|_| CaissonError::BadSizeString(s.to_string()))?;

    match suffix {
        "B" | "b" => Ok(n),
        "M" | "m" => Ok(n * 1024 * 1024 / block_size as i64),
        "G" | "g" => Ok(n * 1024 * 1024 * 1024 / block_size as i64),
        _ => Err(CaissonError::BadSizeString(s.to_string())),
    }
}
