use thiserror::Error;

pub type Result<T> = std::result::Result<T, CaissonError>;

#[derive(Debug, Error)]
pub enum CaissonError {
    #[error("bad account database file: {0}")]
    BadAccountDatabase(String),

    #[error("'{0}' is not a valid account ID")]
    BadAccountId(String),

    #[error("account {0} does not exist")]
    NoSuchAccount(crate::accounts::AccountId),

    #[error("account {0} already exists")]
    AccountExists(crate::accounts::AccountId),

    #[error("unknown disc set {0}")]
    NoSuchDiscSet(i32),

    #[error("invalid limits: {0}")]
    BadLimits(String),

    #[error("'{0}' is not a valid size (use B for blocks, M for MB, G for GB)")]
    BadSizeString(String),

    #[error("account is locked by another process (lock: {0})")]
    Locked(String),

    #[error("coordinator protocol violation: {0}")]
    CoordinatorProtocol(String),

    #[error("object {0} not found in store")]
    ObjectNotFound(crate::store::ObjectId),

    #[error("invalid store directory: {0}")]
    InvalidDirectory(String),

    #[error("account is full (hard limit reached)")]
    StoreFull,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
