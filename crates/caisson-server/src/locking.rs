use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use caisson_core::accounts::AccountId;
use caisson_core::error::CaissonError;
use caisson_core::store::AccountLock;

use crate::error::ServerError;
use crate::state::AppState;

/// How many one-second retries a connection makes after asking
/// housekeeping to give way.
const MAX_WAIT_FOR_HOUSEKEEPING_TO_RELEASE_ACCOUNT: u32 = 8;

/// Take the exclusive write lock on an account root before mutating it.
///
/// On contention the housekeeping worker is the likely holder: send it a
/// release request for this account, then retry with one-second sleeps. A
/// live client session holding the lock won't yield, so retries are
/// bounded and the request fails with 503 rather than blocking forever.
pub async fn lock_account_for_write(
    state: &AppState,
    id: AccountId,
    account_root: &Path,
) -> Result<AccountLock, ServerError> {
    match AccountLock::try_acquire(account_root) {
        Ok(lock) => return Ok(lock),
        Err(CaissonError::Locked(_)) => {}
        Err(e) => return Err(e.into()),
    }

    info!(account = %id, "account locked, asking housekeeping to give way");
    state.request_account_release(id);

    for attempt in 1..=MAX_WAIT_FOR_HOUSEKEEPING_TO_RELEASE_ACCOUNT {
        tokio::time::sleep(Duration::from_secs(1)).await;
        match AccountLock::try_acquire(account_root) {
            Ok(lock) => {
                debug!(account = %id, attempt, "acquired account lock after retry");
                return Ok(lock);
            }
            Err(CaissonError::Locked(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Err(ServerError::Unavailable(format!(
        "could not lock account {id}"
    )))
}
