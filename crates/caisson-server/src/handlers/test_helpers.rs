use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use caisson_core::accounts::{AccountDatabase, AccountId, AccountRegistry};
use caisson_core::config::{DiscSetConfig, StoreConfig};
use caisson_core::housekeeping::coordinator_channel;

use crate::config::ServerSection;
use crate::state::AppState;

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_ACCOUNT: AccountId = AccountId(0x05);
pub const TEST_BLOCK_SIZE: u64 = 65536;

/// Create a wired-up router and AppState backed by a temp directory, with
/// one account (soft 100 / hard 110 blocks) already created.
///
/// No housekeeping worker runs; the coordinator's worker endpoint is
/// dropped, so release requests go nowhere (harmless for handler tests).
pub fn setup_app(soft: i64, hard: i64) -> (Router, AppState, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("create tempdir");
    let disc_root = tmp.path().join("disc0");
    std::fs::create_dir_all(&disc_root).unwrap();

    let store = StoreConfig::new(
        tmp.path().join("accounts.txt"),
        vec![DiscSetConfig {
            num: 0,
            root: disc_root,
            block_size: TEST_BLOCK_SIZE,
        }],
    );

    let mut db = AccountDatabase::create(&store.account_database).unwrap();
    AccountRegistry::new(&store)
        .create_account(&mut db, TEST_ACCOUNT, 0, soft, hard)
        .unwrap();

    let config = ServerSection {
        token: TEST_TOKEN.to_string(),
        ..Default::default()
    };

    let (coordinator, _endpoint) = coordinator_channel();
    let state = AppState::new(config, store, db, coordinator);
    let router = super::router(state.clone());
    (router, state, tmp)
}

/// Send an authenticated request with the given method and body bytes.
pub async fn authed_request(
    router: Router,
    method: &str,
    path: &str,
    body: Vec<u8>,
) -> axum::response::Response {
    let req = Request::builder()
        .method(method)
        .uri(path)
        .header("Authorization", format!("Bearer {TEST_TOKEN}"))
        .header("Content-Length", body.len().to_string())
        .body(Body::from(body))
        .unwrap();

    router.oneshot(req).await.unwrap()
}

pub async fn authed_get(router: Router, path: &str) -> axum::response::Response {
    authed_request(router, "GET", path, Vec::new()).await
}

/// Read full response body into `Vec<u8>`.
pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("collect body")
        .to_vec()
}

pub fn assert_status(response: &axum::response::Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "expected {expected}, got {}",
        response.status()
    );
}
