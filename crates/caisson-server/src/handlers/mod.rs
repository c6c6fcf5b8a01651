pub mod admin;
pub mod objects;

#[cfg(test)]
pub mod test_helpers;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let authed = Router::new()
        .route(
            "/accounts/{account}/usage",
            axum::routing::get(admin::get_usage),
        )
        .route(
            "/accounts/{account}/dirs/{dir}",
            axum::routing::get(objects::get_directory),
        )
        .route(
            "/accounts/{account}/objects/{object}",
            axum::routing::get(objects::get_object),
        )
        .route(
            "/accounts/{account}/files/{dir}/{name}",
            axum::routing::put(objects::put_file),
        )
        .route(
            "/accounts/{account}/files/{dir}/{name}/delete",
            axum::routing::post(objects::delete_file),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Health endpoint is unauthenticated
    let public = Router::new().route("/healthz", axum::routing::get(admin::health));

    public
        .merge(authed)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn auth_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected = state.inner.config.token.as_bytes();

    let provided = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if provided.as_bytes().ct_eq(expected).into() {
        next.run(req).await
    } else {
        (StatusCode::UNAUTHORIZED, "invalid or missing token").into_response()
    }
}
