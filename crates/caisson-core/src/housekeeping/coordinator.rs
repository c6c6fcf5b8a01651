use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use tracing::{debug, info};

use crate::accounts::AccountId;
use crate::error::{CaissonError, Result};

use super::HousekeepingStats;

/// Control commands sent from the owning process to the housekeeping
/// worker. On the wire each command is a single newline-terminated ASCII
/// line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `h` — re-read configuration after the current unit of work.
    ReloadConfig,
    /// `t` — stop once the account currently in progress is left in a
    /// consistent state.
    Terminate,
    /// `r<hex id>` — the owner wants this account's write lock; if the
    /// worker is processing that account it must abandon it.
    ReleaseAccount(AccountId),
}

impl Command {
    pub fn parse(line: &str) -> Result<Command> {
        let line = line.trim_end_matches('\n');
        match line {
            "h" => Ok(Command::ReloadConfig),
            "t" => Ok(Command::Terminate),
            _ => {
                if let Some(hex) = line.strip_prefix('r') {
                    if let Ok(id) = u32::from_str_radix(hex, 16) {
                        return Ok(Command::ReleaseAccount(AccountId(id)));
                    }
                }
                Err(CaissonError::CoordinatorProtocol(format!(
                    "unrecognised command line '{line}'"
                )))
            }
        }
    }

    pub fn as_line(&self) -> String {
        match self {
            Command::ReloadConfig => "h\n".into(),
            Command::Terminate => "t\n".into(),
            Command::ReleaseAccount(id) => format!("r{:x}\n", id.0),
        }
    }
}

/// Reports flowing back from the worker to its owner.
#[derive(Debug)]
pub enum WorkerReport {
    /// A full housekeeping run completed.
    RunFinished(HousekeepingStats),
    /// The worker hit an unrecoverable error and is exiting.
    Fatal(String),
}

/// Owner-side end of the coordinator channel.
pub struct CoordinatorHandle {
    commands: Sender<String>,
    reports: Receiver<WorkerReport>,
}

impl CoordinatorHandle {
    /// Send a raw command line. Returns false if the worker is gone.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command.as_line()).is_ok()
    }

    /// Ask the worker to abandon `id` so its write lock becomes free.
    pub fn request_account_release(&self, id: AccountId) -> bool {
        self.send(Command::ReleaseAccount(id))
    }

    pub fn request_reload(&self) -> bool {
        self.send(Command::ReloadConfig)
    }

    pub fn request_terminate(&self) -> bool {
        self.send(Command::Terminate)
    }

    /// Non-blocking poll for a worker report.
    pub fn try_recv_report(&self) -> Option<WorkerReport> {
        self.reports.try_recv().ok()
    }

    /// Inject a raw (possibly malformed) line, bypassing the typed API.
    #[cfg(test)]
    pub(crate) fn send_raw_for_tests(&self, line: &str) -> bool {
        self.commands.send(line.to_string()).is_ok()
    }

    /// Wait up to `max_wait` for a worker report.
    pub fn recv_report_timeout(&self, max_wait: Duration) -> Option<WorkerReport> {
        self.reports.recv_timeout(max_wait).ok()
    }
}

/// Worker-side end of the coordinator channel.
pub struct WorkerEndpoint {
    commands: Receiver<String>,
    reports: Sender<WorkerReport>,
    reload_wanted: AtomicBool,
    terminate_wanted: AtomicBool,
}

/// Build the private duplex channel between the owner and the worker.
pub fn coordinator_channel() -> (CoordinatorHandle, WorkerEndpoint) {
    let (command_tx, command_rx) = mpsc::channel();
    let (report_tx, report_rx) = mpsc::channel();
    (
        CoordinatorHandle {
            commands: command_tx,
            reports: report_rx,
        },
        WorkerEndpoint {
            commands: command_rx,
            reports: report_tx,
            reload_wanted: AtomicBool::new(false),
            terminate_wanted: AtomicBool::new(false),
        },
    )
}

impl WorkerEndpoint {
    /// Poll for one pending command, waiting at most `max_wait` (zero means
    /// a non-blocking check).
    ///
    /// Returns `true` when the worker must abandon the account it is
    /// currently processing: terminate or reload was requested, the owner
    /// died (channel end-of-stream), or a release request named
    /// `current_account`. A release request for some other account returns
    /// `false` and is otherwise ignored. An unparsable line is a protocol
    /// violation and therefore an error: the two sides have desynchronized
    /// and carrying on is unsafe.
    pub fn check_for_command(
        &self,
        current_account: Option<AccountId>,
        max_wait: Duration,
    ) -> Result<bool> {
        let line = if max_wait.is_zero() {
            match self.commands.try_recv() {
                Ok(line) => Some(line),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    self.owner_died();
                    return Ok(true);
                }
            }
        } else {
            match self.commands.recv_timeout(max_wait) {
                Ok(line) => Some(line),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.owner_died();
                    return Ok(true);
                }
            }
        };

        let Some(line) = line else {
            return Ok(false);
        };
        debug!(command = %line.trim_end(), "housekeeping received control command");

        match Command::parse(&line)? {
            Command::ReloadConfig => {
                self.reload_wanted.store(true, Ordering::SeqCst);
                Ok(true)
            }
            Command::Terminate => {
                self.terminate_wanted.store(true, Ordering::SeqCst);
                Ok(true)
            }
            Command::ReleaseAccount(id) => {
                if current_account == Some(id) {
                    info!(account = %id, "housekeeping giving way to connection");
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    fn owner_died(&self) {
        // The owning process is gone; housekeeping must not run
        // unsupervised forever.
        info!("coordinator channel closed, housekeeping will terminate");
        self.terminate_wanted.store(true, Ordering::SeqCst);
    }

    pub fn terminate_wanted(&self) -> bool {
        self.terminate_wanted.load(Ordering::SeqCst)
    }

    pub fn set_terminate_wanted(&self) {
        self.terminate_wanted.store(true, Ordering::SeqCst);
    }

    /// Read and clear the reload-wanted flag.
    pub fn take_reload_wanted(&self) -> bool {
        self.reload_wanted.swap(false, Ordering::SeqCst)
    }

    /// Best-effort report back to the owner.
    pub fn report(&self, report: WorkerReport) {
        let _ = self.reports.send(report);
    }
}
