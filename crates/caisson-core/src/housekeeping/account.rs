use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::accounts::AccountId;
use crate::error::{CaissonError, Result};
use crate::store::{
    AccountLock, AccountUsageInfo, EntryFlags, ObjectId, ObjectStore, StoreDirectory,
    ROOT_DIRECTORY_ID,
};

use super::coordinator::WorkerEndpoint;

/// Check the control channel every this many units of work (directories
/// scanned / files deleted).
const COMMAND_CHECK_INTERVAL: u32 = 32;

/// Outcome of one account's reclamation pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassStats {
    pub files_deleted: u64,
    pub empty_directories_deleted: u64,
    pub blocks_freed: i64,
    /// The pass was abandoned early on a control message; persisted counters
    /// are still consistent.
    pub interrupted: bool,
    /// The account was locked by a live session; nothing was done.
    pub skipped_locked: bool,
}

/// Which reclamation class a candidate belongs to. Tombstones go first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum CandidateClass {
    Tombstone,
    OldVersion,
}

/// A reclaimable entry found during the scan. The derived ordering is the
/// deletion priority: tombstones before old versions, then oldest
/// modification time, then smallest mark number, then smallest object ID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct DeletionCandidate {
    class: CandidateClass,
    modification_time: DateTime<Utc>,
    mark_number: u32,
    object_id: ObjectId,
    in_directory: ObjectId,
    size_in_blocks: i64,
}

/// One account's reclamation pass: scan the tree, reclaim flagged and
/// excess old/deleted versions until usage is back under the soft limit,
/// and leave the persisted counters matching the tree.
pub struct AccountHousekeeper<'a> {
    account_id: AccountId,
    store: &'a dyn ObjectStore,
    account_root: &'a Path,
    control: &'a WorkerEndpoint,
    deleted_retention: chrono::Duration,

    deletion_target: i64,
    potential: BTreeSet<DeletionCandidate>,
    potential_total_size: i64,
    max_candidate_size: i64,
    empty_directories: Vec<ObjectId>,

    // Totals recomputed from the tree during the scan.
    blocks_used: i64,
    blocks_in_old_files: i64,
    blocks_in_deleted_files: i64,
    blocks_in_directories: i64,

    // Deltas from deletions performed this pass.
    blocks_used_delta: i64,
    blocks_in_old_files_delta: i64,
    blocks_in_deleted_files_delta: i64,
    blocks_in_directories_delta: i64,

    files_deleted: u64,
    empty_directories_deleted: u64,
    scan_blocks_freed: i64,
    command_check_countdown: u32,
}

impl<'a> AccountHousekeeper<'a> {
    pub fn new(
        account_id: AccountId,
        store: &'a dyn ObjectStore,
        account_root: &'a Path,
        control: &'a WorkerEndpoint,
        deleted_retention: Duration,
    ) -> AccountHousekeeper<'a> {
        AccountHousekeeper {
            account_id,
            store,
            account_root,
            control,
            deleted_retention: chrono::Duration::from_std(deleted_retention)
                .unwrap_or_else(|_| chrono::Duration::seconds(0)),
            deletion_target: 0,
            potential: BTreeSet::new(),
            potential_total_size: 0,
            max_candidate_size: 0,
            empty_directories: Vec::new(),
            blocks_used: 0,
            blocks_in_old_files: 0,
            blocks_in_deleted_files: 0,
            blocks_in_directories: 0,
            blocks_used_delta: 0,
            blocks_in_old_files_delta: 0,
            blocks_in_deleted_files_delta: 0,
            blocks_in_directories_delta: 0,
            files_deleted: 0,
            empty_directories_deleted: 0,
            scan_blocks_freed: 0,
            command_check_countdown: COMMAND_CHECK_INTERVAL,
        }
    }

    /// Run the pass. Takes the account write lock non-blockingly; if a
    /// client session holds it the account is skipped — it will be
    /// revisited on the next run.
    pub fn run(mut self) -> Result<PassStats> {
        let _lock = match AccountLock::try_acquire(self.account_root) {
            Ok(lock) => lock,
            Err(CaissonError::Locked(_)) => {
                return Ok(PassStats {
                    skipped_locked: true,
                    ..PassStats::default()
                })
            }
            Err(e) => return Err(e),
        };

        let mut usage = AccountUsageInfo::load(self.account_root)?;
        self.deletion_target = (usage.blocks_used - usage.blocks_soft_limit).max(0);

        let scan_completed = self.scan_directory(ROOT_DIRECTORY_ID)?;
        if !scan_completed {
            // Abandoned mid-scan. Fold in whatever RemoveASAP deletions
            // already happened so the persisted counters stay consistent.
            if self.any_delta() {
                self.apply_deltas(&mut usage);
                usage.save(self.account_root)?;
            }
            return Ok(self.stats(true));
        }

        // The scan recomputed the true totals for the tree as it stands
        // now; correct the stored counters if they drifted.
        let drifted = usage.blocks_used != self.blocks_used
            || usage.blocks_in_old_files != self.blocks_in_old_files
            || usage.blocks_in_deleted_files != self.blocks_in_deleted_files
            || usage.blocks_in_directories != self.blocks_in_directories;
        if drifted {
            warn!(
                account = %self.account_id,
                stored_used = usage.blocks_used,
                calculated_used = self.blocks_used,
                "stored usage counters do not match calculated sizes, correcting"
            );
        }
        usage.blocks_used = self.blocks_used;
        usage.blocks_in_old_files = self.blocks_in_old_files;
        usage.blocks_in_deleted_files = self.blocks_in_deleted_files;
        usage.blocks_in_directories = self.blocks_in_directories;

        // The deltas so far covered RemoveASAP deletions, which the
        // recomputed totals already reflect. Reset them; phase two
        // accumulates fresh ones.
        self.scan_blocks_freed = -self.blocks_used_delta;
        self.reset_deltas();

        let mut interrupted = self.delete_files()?;
        if !interrupted {
            interrupted = self.delete_empty_directories()?;
        }

        if self.files_deleted > 0 || self.empty_directories_deleted > 0 {
            info!(
                account = %self.account_id,
                blocks_freed = self.scan_blocks_freed - self.blocks_used_delta,
                files_deleted = self.files_deleted,
                directories_deleted = self.empty_directories_deleted,
                interrupted,
                "housekeeping reclaimed space"
            );
        }

        self.apply_deltas(&mut usage);

        // A pending release request for this account must be observed
        // before the counters are persisted.
        let abandon = self
            .control
            .check_for_command(Some(self.account_id), Duration::ZERO)?;
        usage.save(self.account_root)?;

        Ok(self.stats(interrupted || abandon))
    }

    fn stats(&self, interrupted: bool) -> PassStats {
        PassStats {
            files_deleted: self.files_deleted,
            empty_directories_deleted: self.empty_directories_deleted,
            blocks_freed: self.scan_blocks_freed - self.blocks_used_delta,
            interrupted,
            skipped_locked: false,
        }
    }

    fn any_delta(&self) -> bool {
        self.blocks_used_delta != 0
            || self.blocks_in_old_files_delta != 0
            || self.blocks_in_deleted_files_delta != 0
            || self.blocks_in_directories_delta != 0
    }

    fn reset_deltas(&mut self) {
        self.blocks_used_delta = 0;
        self.blocks_in_old_files_delta = 0;
        self.blocks_in_deleted_files_delta = 0;
        self.blocks_in_directories_delta = 0;
    }

    /// Add the deltas into the stored counters, clamping at zero in case
    /// the store was modified under us between correction and persistence.
    fn apply_deltas(&self, usage: &mut AccountUsageInfo) {
        usage.blocks_used = (usage.blocks_used + self.blocks_used_delta).max(0);
        usage.blocks_in_old_files =
            (usage.blocks_in_old_files + self.blocks_in_old_files_delta).max(0);
        usage.blocks_in_deleted_files =
            (usage.blocks_in_deleted_files + self.blocks_in_deleted_files_delta).max(0);
        usage.blocks_in_directories =
            (usage.blocks_in_directories + self.blocks_in_directories_delta).max(0);
    }

    /// Bounded-rate control check: true means abandon the account now.
    fn check_command(&mut self) -> Result<bool> {
        self.command_check_countdown -= 1;
        if self.command_check_countdown > 0 {
            return Ok(false);
        }
        self.command_check_countdown = COMMAND_CHECK_INTERVAL;
        self.control
            .check_for_command(Some(self.account_id), Duration::ZERO)
    }

    /// Scan one directory (and recurse): reclaim RemoveASAP entries, record
    /// reclamation candidates, recompute usage totals. Returns false if the
    /// scan must stop.
    fn scan_directory(&mut self, dir_id: ObjectId) -> Result<bool> {
        if self.check_command()? {
            return Ok(false);
        }

        let mut dir = StoreDirectory::load(self.store, dir_id)?;

        // Entries flagged RemoveASAP are reclaimed on this pass regardless
        // of quota pressure.
        loop {
            let victim = dir
                .entries_with(EntryFlags::FILE)
                .find(|e| {
                    e.flags.contains(EntryFlags::REMOVE_ASAP)
                        && e.flags
                            .intersects(EntryFlags::DELETED | EntryFlags::OLD_VERSION)
                })
                .map(|e| e.object_id);
            let Some(victim) = victim else { break };
            self.delete_entry_from(&mut dir, victim)?;
        }

        // Account for the directory itself and its surviving entries.
        let dir_blocks = self.store.usage_in_blocks(dir_id)?;
        self.blocks_in_directories += dir_blocks;
        self.blocks_used += dir_blocks;

        if dir.is_empty() {
            self.empty_directories.push(dir_id);
        }

        let now = Utc::now();
        for entry in dir.entries_with(EntryFlags::FILE) {
            let size = entry.size_in_blocks;
            self.blocks_used += size;

            let is_old = entry.flags.contains(EntryFlags::OLD_VERSION);
            let is_deleted = entry.flags.contains(EntryFlags::DELETED);
            if is_old {
                self.blocks_in_old_files += size;
            }
            if is_deleted {
                self.blocks_in_deleted_files += size;
            }

            let class = if is_deleted {
                if now.signed_duration_since(entry.modification_time) < self.deleted_retention {
                    // Tombstone still within its retention window.
                    continue;
                }
                CandidateClass::Tombstone
            } else if is_old {
                CandidateClass::OldVersion
            } else {
                continue;
            };

            self.push_candidate(DeletionCandidate {
                class,
                modification_time: entry.modification_time,
                mark_number: entry.mark_number,
                object_id: entry.object_id,
                in_directory: dir_id,
                size_in_blocks: size,
            });
        }

        let subdirs: Vec<ObjectId> = dir
            .entries_with(EntryFlags::DIR)
            .map(|e| e.object_id)
            .collect();
        for sub in subdirs {
            if !self.scan_directory(sub)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Record a candidate, keeping the set bounded: once the queued total
    /// exceeds the deletion target plus the largest candidate, the
    /// lowest-priority tail can never be needed and is dropped.
    fn push_candidate(&mut self, candidate: DeletionCandidate) {
        self.potential_total_size += candidate.size_in_blocks;
        if candidate.size_in_blocks > self.max_candidate_size {
            self.max_candidate_size = candidate.size_in_blocks;
        }
        self.potential.insert(candidate);

        let keep_size = self.deletion_target + self.max_candidate_size;
        if self.potential_total_size <= keep_size {
            return;
        }

        let mut excess = self.potential_total_size - keep_size;
        let mut recalc_max = false;
        while excess > 0 {
            let Some(last) = self.potential.last().cloned() else {
                break;
            };
            if excess <= last.size_in_blocks {
                break;
            }
            excess -= last.size_in_blocks;
            self.potential_total_size -= last.size_in_blocks;
            if last.size_in_blocks >= self.max_candidate_size {
                recalc_max = true;
            }
            self.potential.remove(&last);
        }
        if recalc_max {
            self.max_candidate_size = self
                .potential
                .iter()
                .map(|c| c.size_in_blocks)
                .max()
                .unwrap_or(0);
        }
    }

    /// Delete queued candidates, highest priority first, until the deletion
    /// target is met. Returns true if interrupted.
    fn delete_files(&mut self) -> Result<bool> {
        // Without a target, old versions are left alone: deleting one file
        // per run would erode retained history for accounts under no quota
        // pressure.
        if self.deletion_target <= 0 {
            return Ok(false);
        }

        let candidates = std::mem::take(&mut self.potential);
        for candidate in candidates {
            if self.check_command()? {
                return Ok(true);
            }

            let mut dir = StoreDirectory::load(self.store, candidate.in_directory)?;
            self.delete_entry_from(&mut dir, candidate.object_id)?;

            // Checking after the deletion rather than before tends to land
            // usage slightly below the soft limit, which lets the client
            // resume uploads.
            if -self.blocks_used_delta >= self.deletion_target {
                break;
            }
        }

        Ok(false)
    }

    /// Remove one entry from its directory and reclaim its object. The
    /// directory is rewritten before the object is deleted so a crash never
    /// leaves a dangling reference.
    fn delete_entry_from(&mut self, dir: &mut StoreDirectory, object_id: ObjectId) -> Result<()> {
        let Some(entry) = dir.find_entry(object_id) else {
            warn!(
                account = %self.account_id,
                object = %object_id,
                directory = %dir.object_id,
                "object not found in directory, store may need a check run"
            );
            return Ok(());
        };

        let was_deleted = entry.flags.contains(EntryFlags::DELETED);
        let was_old = entry.flags.contains(EntryFlags::OLD_VERSION);
        if !was_deleted && !was_old {
            // Re-flagged since the scan; no longer reclaimable.
            return Ok(());
        }
        let size = entry.size_in_blocks;

        let old_dir_blocks = self.store.usage_in_blocks(dir.object_id)?;
        dir.remove_entry(object_id);
        let new_dir_blocks = dir.save(self.store)?;
        let adjust = new_dir_blocks - old_dir_blocks;
        self.blocks_used_delta += adjust;
        self.blocks_in_directories_delta += adjust;

        self.store.delete(object_id)?;

        self.files_deleted += 1;
        self.blocks_used_delta -= size;
        if was_deleted {
            self.blocks_in_deleted_files_delta -= size;
        }
        if was_old {
            self.blocks_in_old_files_delta -= size;
        }

        if dir.is_empty() {
            self.empty_directories.push(dir.object_id);
        }

        Ok(())
    }

    /// Remove empty directories whose entry in their container is flagged
    /// deleted, working leaf-first; a container emptied this way is
    /// examined on the next round. Returns true if interrupted.
    fn delete_empty_directories(&mut self) -> Result<bool> {
        while !self.empty_directories.is_empty() {
            let batch = std::mem::take(&mut self.empty_directories);
            for dir_id in batch {
                if self.check_command()? {
                    return Ok(true);
                }

                if dir_id == ROOT_DIRECTORY_ID {
                    continue;
                }
                // The list can carry duplicates; the first round deletes it.
                if !self.store.exists(dir_id)? {
                    continue;
                }
                let dir = StoreDirectory::load(self.store, dir_id)?;
                if !dir.is_empty() {
                    continue;
                }
                let dir_blocks = self.store.usage_in_blocks(dir_id)?;

                let mut container = StoreDirectory::load(self.store, dir.container_id)?;
                let deletable = container
                    .find_entry(dir_id)
                    .is_some_and(|e| e.flags.contains(EntryFlags::DELETED));
                if !deletable {
                    continue;
                }

                container.remove_entry(dir_id);
                if container.is_empty() {
                    self.empty_directories.push(container.object_id);
                }

                let old_blocks = self.store.usage_in_blocks(container.object_id)?;
                let new_blocks = container.save(self.store)?;
                let adjust = new_blocks - old_blocks;
                self.blocks_used_delta += adjust;
                self.blocks_in_directories_delta += adjust;

                self.store.delete(dir_id)?;
                self.blocks_used_delta -= dir_blocks;
                self.blocks_in_directories_delta -= dir_blocks;
                self.empty_directories_deleted += 1;
            }
        }

        Ok(false)
    }
}
