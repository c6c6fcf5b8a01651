use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::error::{CaissonError, Result};

/// Name of the lock file inside an account root.
pub const WRITE_LOCK_FILENAME: &str = "write.lock";

/// Exclusive advisory lock on an account root directory.
///
/// Backed by `flock(2)` on a lock file inside the root, so the lock vanishes
/// with the holding process and a crashed writer cannot wedge the account.
#[derive(Debug)]
pub struct AccountLock {
    file: File,
    path: PathBuf,
}

impl AccountLock {
    /// Non-blocking attempt. `Err(Locked)` when another process holds it.
    pub fn try_acquire(account_root: &Path) -> Result<AccountLock> {
        let path = account_root.join(WRITE_LOCK_FILENAME);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(&path)?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                return Err(CaissonError::Locked(path.display().to_string()));
            }
            return Err(err.into());
        }

        Ok(AccountLock { file, path })
    }

    /// Acquire with bounded retry and jittered linear backoff.
    pub fn acquire_with_retry(
        account_root: &Path,
        max_attempts: usize,
        base_delay_ms: u64,
    ) -> Result<AccountLock> {
        let mut attempt = 0;
        loop {
            match Self::try_acquire(account_root) {
                Ok(lock) => return Ok(lock),
                Err(CaissonError::Locked(holder)) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(CaissonError::Locked(holder));
                    }
                    let jitter = rand::thread_rng().gen_range(0..=base_delay_ms / 4);
                    let delay = base_delay_ms + jitter;
                    debug!(
                        attempt,
                        max_attempts,
                        delay_ms = delay,
                        lock = %holder,
                        "account lock contention, retrying"
                    );
                    std::thread::sleep(Duration::from_millis(delay));
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AccountLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
