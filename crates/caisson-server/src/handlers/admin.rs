use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};

use caisson_core::store::AccountUsageInfo;

use crate::error::ServerError;
use crate::state::AppState;

/// GET /healthz — unauthenticated liveness probe.
pub async fn health(State(state): State<AppState>) -> Response {
    let uptime = state.inner.start_time.elapsed().as_secs();
    state.drain_worker_reports();
    axum::Json(serde_json::json!({
        "status": "ok",
        "uptime_seconds": uptime,
    }))
    .into_response()
}

/// GET /accounts/{account}/usage — read-only view of the usage counters.
pub async fn get_usage(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Response, ServerError> {
    let id = account
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("'{account}' is not an account ID")))?;
    let (root, _) = state.account_root(id)?;

    let usage = tokio::task::spawn_blocking(move || AccountUsageInfo::load(&root))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(axum::Json(usage).into_response())
}
