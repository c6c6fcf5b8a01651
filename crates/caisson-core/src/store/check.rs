use std::collections::HashSet;
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;

use super::{AccountUsageInfo, EntryFlags, ObjectId, ObjectStore, StoreDirectory, ROOT_DIRECTORY_ID};

/// Results of a consistency check over one account.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheckStats {
    pub directories_scanned: u64,
    pub files_seen: u64,
    pub orphaned_objects: u64,
    pub errors_found: u64,
    pub errors_fixed: u64,

    // Counters recomputed from the tree.
    pub blocks_used: i64,
    pub blocks_in_old_files: i64,
    pub blocks_in_deleted_files: i64,
    pub blocks_in_directories: i64,
}

/// Walk an account's directory tree, recompute the usage counters, and
/// detect drift and orphaned objects. With `fix`, orphans are deleted and
/// the usage file is rewritten with the recomputed values.
///
/// The caller must hold the account's write lock when fixing.
pub fn check_account(
    store: &dyn ObjectStore,
    account_root: &Path,
    fix: bool,
    quiet: bool,
) -> Result<CheckStats> {
    let mut stats = CheckStats::default();
    let mut referenced: HashSet<ObjectId> = HashSet::new();
    let mut highest_id = ROOT_DIRECTORY_ID;

    let mut pending = vec![ROOT_DIRECTORY_ID];
    referenced.insert(ROOT_DIRECTORY_ID);

    while let Some(dir_id) = pending.pop() {
        let dir = StoreDirectory::load(store, dir_id)?;
        stats.directories_scanned += 1;

        let dir_blocks = store.usage_in_blocks(dir_id)?;
        stats.blocks_used += dir_blocks;
        stats.blocks_in_directories += dir_blocks;

        for entry in dir.entries() {
            referenced.insert(entry.object_id);
            if entry.object_id > highest_id {
                highest_id = entry.object_id;
            }

            if entry.is_dir() {
                pending.push(entry.object_id);
                continue;
            }

            stats.files_seen += 1;
            stats.blocks_used += entry.size_in_blocks;
            if entry.flags.contains(EntryFlags::OLD_VERSION) {
                stats.blocks_in_old_files += entry.size_in_blocks;
            }
            if entry.flags.contains(EntryFlags::DELETED) {
                stats.blocks_in_deleted_files += entry.size_in_blocks;
            }

            if !store.exists(entry.object_id)? {
                stats.errors_found += 1;
                warn!(
                    object = %entry.object_id,
                    directory = %dir_id,
                    "directory references a missing object"
                );
            }
        }
    }

    // Objects on disc that no directory references.
    for id in store.list_objects()? {
        if referenced.contains(&id) {
            continue;
        }
        stats.orphaned_objects += 1;
        stats.errors_found += 1;
        if fix {
            store.delete(id)?;
            stats.errors_fixed += 1;
            if !quiet {
                info!(object = %id, "deleted orphaned object");
            }
        } else {
            warn!(object = %id, "orphaned object (not referenced by any directory)");
        }
    }

    // Compare recomputed counters with the stored usage file.
    let mut usage = AccountUsageInfo::load(account_root)?;
    let drifted = usage.blocks_used != stats.blocks_used
        || usage.blocks_in_old_files != stats.blocks_in_old_files
        || usage.blocks_in_deleted_files != stats.blocks_in_deleted_files
        || usage.blocks_in_directories != stats.blocks_in_directories;
    if drifted {
        stats.errors_found += 1;
        warn!(
            stored_used = usage.blocks_used,
            calculated_used = stats.blocks_used,
            "stored usage counters do not match calculated sizes"
        );
    }
    if usage.last_object_id_used < highest_id {
        stats.errors_found += 1;
        warn!(
            stored = %usage.last_object_id_used,
            highest_seen = %highest_id,
            "last allocated object ID is behind the tree"
        );
    }

    if fix && (drifted || usage.last_object_id_used < highest_id) {
        usage.blocks_used = stats.blocks_used;
        usage.blocks_in_old_files = stats.blocks_in_old_files;
        usage.blocks_in_deleted_files = stats.blocks_in_deleted_files;
        usage.blocks_in_directories = stats.blocks_in_directories;
        if usage.last_object_id_used < highest_id {
            usage.last_object_id_used = highest_id;
        }
        usage.save(account_root)?;
        stats.errors_fixed += 1;
        if !quiet {
            info!("usage counters corrected");
        }
    }

    if !quiet {
        info!(
            directories = stats.directories_scanned,
            files = stats.files_seen,
            errors = stats.errors_found,
            fixed = stats.errors_fixed,
            "account check finished"
        );
    }

    Ok(stats)
}
