use serde::{Deserialize, Serialize};

/// Daemon-side settings, separate from the shared store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Address to listen on.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path of the shared store configuration (accounts, disc sets,
    /// housekeeping).
    pub store_config: String,

    /// Shared bearer token for authentication.
    pub token: String,

    /// Log output format: "json" or "pretty".
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            store_config: String::new(),
            token: String::new(),
            log_format: default_log_format(),
        }
    }
}

fn default_listen() -> String {
    "127.0.0.1:8676".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
