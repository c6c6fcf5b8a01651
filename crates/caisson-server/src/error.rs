use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use caisson_core::error::CaissonError;

/// Server error type that maps to HTTP status codes.
#[derive(Debug)]
pub enum ServerError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// Lock retries exhausted; the client should back off and retry.
    Unavailable(String),
    /// The account's hard limit would be exceeded.
    InsufficientStorage(String),
    Internal(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Self::Conflict(msg) => write!(f, "conflict: {msg}"),
            Self::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            Self::InsufficientStorage(msg) => write!(f, "insufficient storage: {msg}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::InsufficientStorage(msg) => (StatusCode::INSUFFICIENT_STORAGE, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };
        tracing::error!(status = %status, error = %message);
        (status, message).into_response()
    }
}

impl From<CaissonError> for ServerError {
    fn from(e: CaissonError) -> Self {
        match e {
            CaissonError::NoSuchAccount(_) | CaissonError::ObjectNotFound(_) => {
                Self::NotFound(e.to_string())
            }
            CaissonError::BadAccountId(_)
            | CaissonError::BadLimits(_)
            | CaissonError::BadSizeString(_) => Self::BadRequest(e.to_string()),
            CaissonError::AccountExists(_) => Self::Conflict(e.to_string()),
            CaissonError::Locked(_) => Self::Unavailable(e.to_string()),
            CaissonError::StoreFull => Self::InsufficientStorage(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(e.to_string()),
            _ => Self::Internal(e.to_string()),
        }
    }
}
