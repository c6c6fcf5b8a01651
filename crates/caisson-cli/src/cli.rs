use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "caisson",
    version,
    about = "Manage accounts on a caisson backup store",
    after_help = "\
Size arguments take a units suffix: B for blocks, M for megabytes,
G for gigabytes. Byte units are converted with the account's disc set
block size, e.g. `caisson create 5 0 200G 250G`."
)]
pub(crate) struct Cli {
    /// Path to the store configuration file
    #[arg(short, long, default_value = "/etc/caisson/caisson.yaml")]
    pub config: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Create a new account on a disc set
    Create {
        /// Account ID (hex)
        account: String,

        /// Disc set number to store the account on
        disc_num: i32,

        /// Soft limit (suffix B/M/G)
        soft_limit: String,

        /// Hard limit (suffix B/M/G)
        hard_limit: String,
    },

    /// Print an account's usage counters and limits
    Info {
        /// Account ID (hex)
        account: String,

        /// Machine-readable output (plain block counts)
        #[arg(short, long)]
        machine: bool,
    },

    /// Change an account's soft and hard limits
    Setlimit {
        /// Account ID (hex)
        account: String,

        /// Soft limit (suffix B/M/G)
        soft_limit: String,

        /// Hard limit (suffix B/M/G)
        hard_limit: String,
    },

    /// Delete an account and all its stored data
    Delete {
        /// Account ID (hex)
        account: String,

        /// Skip interactive confirmation (for scripting)
        #[arg(long)]
        yes: bool,
    },

    /// Check an account's tree and counters for consistency
    Check {
        /// Account ID (hex)
        account: String,

        /// Repair what can be repaired (needs the write lock)
        #[arg(long)]
        fix: bool,

        /// Only report errors
        #[arg(long)]
        quiet: bool,
    },
}
