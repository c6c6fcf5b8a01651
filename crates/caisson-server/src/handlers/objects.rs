use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

use caisson_core::accounts::AccountId;
use caisson_core::store::backend::blocks_for;
use caisson_core::store::{
    AccountUsageInfo, DirectoryEntry, EntryFlags, LocalObjectStore, ObjectId, ObjectStore,
    StoreDirectory,
};

use crate::error::ServerError;
use crate::locking::lock_account_for_write;
use crate::state::AppState;

fn parse_account(s: &str) -> Result<AccountId, ServerError> {
    s.parse()
        .map_err(|_| ServerError::BadRequest(format!("'{s}' is not an account ID")))
}

fn parse_object(s: &str) -> Result<ObjectId, ServerError> {
    s.parse()
        .map_err(|_| ServerError::BadRequest(format!("'{s}' is not an object ID")))
}

/// GET /accounts/{account}/dirs/{dir} — list one store directory.
pub async fn get_directory(
    State(state): State<AppState>,
    Path((account, dir)): Path<(String, String)>,
) -> Result<Response, ServerError> {
    let id = parse_account(&account)?;
    let dir_id = parse_object(&dir)?;
    let (root, block_size) = state.account_root(id)?;

    let dir = tokio::task::spawn_blocking(move || {
        let store = LocalObjectStore::open(&root, block_size);
        StoreDirectory::load(&store, dir_id)
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(axum::Json(dir).into_response())
}

/// GET /accounts/{account}/objects/{object} — fetch raw object bytes.
pub async fn get_object(
    State(state): State<AppState>,
    Path((account, object)): Path<(String, String)>,
) -> Result<Response, ServerError> {
    let id = parse_account(&account)?;
    let object_id = parse_object(&object)?;
    let (root, block_size) = state.account_root(id)?;

    let data = tokio::task::spawn_blocking(move || {
        let store = LocalObjectStore::open(&root, block_size);
        store.get(object_id)
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    match data {
        Some(bytes) => Ok(bytes.into_response()),
        None => Err(ServerError::NotFound(format!("object {object_id}"))),
    }
}

/// PUT /accounts/{account}/files/{dir}/{name} — upload a new current
/// version. Any previous current version of the same name is demoted to an
/// old version; the hard limit is enforced before any bytes are stored.
pub async fn put_file(
    State(state): State<AppState>,
    Path((account, dir, name)): Path<(String, String, String)>,
    body: Bytes,
) -> Result<Response, ServerError> {
    let id = parse_account(&account)?;
    let dir_id = parse_object(&dir)?;
    let (root, block_size) = state.account_root(id)?;

    let _lock = lock_account_for_write(&state, id, &root).await?;

    let object_id = tokio::task::spawn_blocking(move || {
        let store = LocalObjectStore::open(&root, block_size);
        let mut usage = AccountUsageInfo::load(&root)?;
        let size = blocks_for(body.len() as u64, block_size);

        if usage.blocks_used + size > usage.blocks_hard_limit {
            return Err(caisson_core::error::CaissonError::StoreFull);
        }

        let mut dir = StoreDirectory::load(&store, dir_id)?;
        let object_id = usage.next_object_id();
        store.put(object_id, &body)?;

        if let Some(old_size) = dir.demote_current(&name) {
            usage.blocks_in_old_files += old_size;
        }

        let old_dir_blocks = store.usage_in_blocks(dir.object_id)?;
        dir.add_entry(DirectoryEntry {
            object_id,
            name,
            flags: EntryFlags::FILE,
            size_in_blocks: size,
            attributes_hash: 0,
            modification_time: Utc::now(),
            mark_number: usage.client_store_marker as u32,
        });
        let new_dir_blocks = dir.save(&store)?;

        let dir_adjust = new_dir_blocks - old_dir_blocks;
        usage.blocks_used += size + dir_adjust;
        usage.blocks_in_directories += dir_adjust;
        usage.save(&root)?;

        Ok(object_id)
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok((
        StatusCode::CREATED,
        axum::Json(serde_json::json!({ "object_id": object_id })),
    )
        .into_response())
}

/// POST /accounts/{account}/files/{dir}/{name}/delete — tombstone the
/// current version. Clients only flag; physical reclamation is
/// housekeeping's job.
pub async fn delete_file(
    State(state): State<AppState>,
    Path((account, dir, name)): Path<(String, String, String)>,
) -> Result<Response, ServerError> {
    let id = parse_account(&account)?;
    let dir_id = parse_object(&dir)?;
    let (root, block_size) = state.account_root(id)?;

    let _lock = lock_account_for_write(&state, id, &root).await?;

    tokio::task::spawn_blocking(move || {
        let store = LocalObjectStore::open(&root, block_size);
        let mut usage = AccountUsageInfo::load(&root)?;
        let mut dir = StoreDirectory::load(&store, dir_id)?;

        let Some(entry) = dir.current_entry_mut(&name) else {
            return Err(caisson_core::error::CaissonError::InvalidDirectory(format!(
                "no current version of '{name}' in directory {dir_id}"
            )));
        };
        entry.flags.insert(EntryFlags::DELETED);
        usage.blocks_in_deleted_files += entry.size_in_blocks;

        let old_dir_blocks = store.usage_in_blocks(dir.object_id)?;
        let new_dir_blocks = dir.save(&store)?;
        let dir_adjust = new_dir_blocks - old_dir_blocks;
        usage.blocks_used += dir_adjust;
        usage.blocks_in_directories += dir_adjust;
        usage.save(&root)?;
        Ok(())
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))?
    .map_err(|e| match e {
        caisson_core::error::CaissonError::InvalidDirectory(msg) => ServerError::NotFound(msg),
        other => other.into(),
    })?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use caisson_core::store::{
        AccountUsageInfo, EntryFlags, LocalObjectStore, ObjectId, StoreDirectory,
    };

    use crate::handlers::test_helpers::{
        assert_status, authed_get, authed_request, body_bytes, setup_app, TEST_BLOCK_SIZE,
    };

    #[tokio::test]
    async fn put_then_fetch_round_trip() {
        let (router, state, _tmp) = setup_app(100, 110);

        let resp = authed_request(
            router.clone(),
            "PUT",
            "/accounts/5/files/1/report",
            b"quarterly numbers".to_vec(),
        )
        .await;
        assert_status(&resp, StatusCode::CREATED);
        let body: serde_json::Value =
            serde_json::from_slice(&body_bytes(resp).await).unwrap();
        let object_id = body["object_id"].as_u64().unwrap();
        assert_eq!(object_id, 2);

        let resp = authed_get(router.clone(), "/accounts/5/objects/2").await;
        assert_status(&resp, StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"quarterly numbers");

        // The directory lists it as the current version.
        let resp = authed_get(router.clone(), "/accounts/5/dirs/1").await;
        assert_status(&resp, StatusCode::OK);
        let dir: serde_json::Value =
            serde_json::from_slice(&body_bytes(resp).await).unwrap();
        assert_eq!(dir["entries"].as_array().unwrap().len(), 1);

        // Usage counters were updated under the account lock.
        let (root, _) = state.account_root(crate::handlers::test_helpers::TEST_ACCOUNT).unwrap();
        let usage = AccountUsageInfo::load(&root).unwrap();
        assert!(usage.blocks_used >= 2);
        assert_eq!(usage.last_object_id_used, ObjectId(2));
    }

    #[tokio::test]
    async fn upload_demotes_the_previous_current_version() {
        let (router, state, _tmp) = setup_app(100, 110);

        authed_request(router.clone(), "PUT", "/accounts/5/files/1/report", b"v1".to_vec())
            .await;
        let resp = authed_request(
            router.clone(),
            "PUT",
            "/accounts/5/files/1/report",
            b"v2".to_vec(),
        )
        .await;
        assert_status(&resp, StatusCode::CREATED);

        let (root, _) = state.account_root(crate::handlers::test_helpers::TEST_ACCOUNT).unwrap();
        let store = LocalObjectStore::open(&root, TEST_BLOCK_SIZE);
        let dir = StoreDirectory::load(&store, ObjectId(1)).unwrap();

        let currents: Vec<_> = dir
            .entries()
            .filter(|e| e.name == "report" && e.is_current())
            .collect();
        assert_eq!(currents.len(), 1);
        assert_eq!(currents[0].object_id, ObjectId(3));
        assert!(dir
            .find_entry(ObjectId(2))
            .unwrap()
            .flags
            .contains(EntryFlags::OLD_VERSION));

        let usage = AccountUsageInfo::load(&root).unwrap();
        assert!(usage.blocks_in_old_files >= 1);
    }

    #[tokio::test]
    async fn hard_limit_makes_the_store_full() {
        // Hard limit of 3 blocks: the root directory takes one, two
        // 1-block uploads fill the account exactly, the third must fail.
        let (router, _state, _tmp) = setup_app(2, 3);

        for name in ["a", "b"] {
            let resp = authed_request(
                router.clone(),
                "PUT",
                &format!("/accounts/5/files/1/{name}"),
                b"x".to_vec(),
            )
            .await;
            assert_status(&resp, StatusCode::CREATED);
        }

        let resp = authed_request(
            router.clone(),
            "PUT",
            "/accounts/5/files/1/c",
            b"y".to_vec(),
        )
        .await;
        assert_status(&resp, StatusCode::INSUFFICIENT_STORAGE);
    }

    #[tokio::test]
    async fn client_delete_only_flags_a_tombstone() {
        let (router, state, _tmp) = setup_app(100, 110);

        authed_request(router.clone(), "PUT", "/accounts/5/files/1/report", b"v1".to_vec())
            .await;
        let resp = authed_request(
            router.clone(),
            "POST",
            "/accounts/5/files/1/report/delete",
            Vec::new(),
        )
        .await;
        assert_status(&resp, StatusCode::NO_CONTENT);

        let (root, _) = state.account_root(crate::handlers::test_helpers::TEST_ACCOUNT).unwrap();
        let store = LocalObjectStore::open(&root, TEST_BLOCK_SIZE);
        let dir = StoreDirectory::load(&store, ObjectId(1)).unwrap();
        let entry = dir.find_entry(ObjectId(2)).unwrap();
        assert!(entry.flags.contains(EntryFlags::DELETED));

        // The object body is still there; reclamation is housekeeping's.
        use caisson_core::store::ObjectStore as _;
        assert!(store.exists(ObjectId(2)).unwrap());

        let usage = AccountUsageInfo::load(&root).unwrap();
        assert_eq!(usage.blocks_in_deleted_files, 1);
    }

    #[tokio::test]
    async fn deleting_a_missing_file_is_not_found() {
        let (router, _state, _tmp) = setup_app(100, 110);
        let resp = authed_request(
            router,
            "POST",
            "/accounts/5/files/1/ghost/delete",
            Vec::new(),
        )
        .await;
        assert_status(&resp, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let (router, _state, _tmp) = setup_app(100, 110);
        let resp = authed_get(router, "/accounts/99/dirs/1").await;
        assert_status(&resp, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (router, _state, _tmp) = setup_app(100, 110);
        let req = axum::http::Request::builder()
            .method("GET")
            .uri("/accounts/5/dirs/1")
            .body(axum::body::Body::empty())
            .unwrap();
        use tower::ServiceExt;
        let resp = router.oneshot(req).await.unwrap();
        assert_status(&resp, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let (router, _state, _tmp) = setup_app(100, 110);
        let req = axum::http::Request::builder()
            .method("GET")
            .uri("/healthz")
            .body(axum::body::Body::empty())
            .unwrap();
        use tower::ServiceExt;
        let resp = router.oneshot(req).await.unwrap();
        assert_status(&resp, StatusCode::OK);
    }
}
