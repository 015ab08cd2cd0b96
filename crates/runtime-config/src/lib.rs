//! Runtime configuration for the taskboard client.
//!
//! The CLI reads and writes `taskboard.toml` using these types. Path
//! resolution lives in `taskboard-paths`; environment overrides are applied
//! by the caller after loading.

use serde::{Deserialize, Serialize};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "taskboard.toml";

/// Environment variable that overrides `[server] url`.
pub const SERVER_URL_ENV: &str = "TASKBOARD_SERVER_URL";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000/api";

/// Top-level client configuration (persisted as `taskboard.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,
    /// Transport timeout for every request, including refresh exchanges.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageSettings {
    #[serde(default)]
    pub credentials: CredentialBackend,
}

/// Where the access/refresh token pair is kept between runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackend {
    /// JSON file next to the config file.
    #[default]
    #[serde(alias = "disk")]
    File,
    /// Process memory only; every run starts logged out.
    Memory,
    #[serde(other)]
    Unknown,
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

/// Apply compatibility fallbacks after loading raw TOML.
/// Returns true when any field was updated.
pub fn apply_compat_fallbacks(config: &mut ClientConfig) -> bool {
    let mut changed = false;

    let trimmed = config.server.url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        config.server.url = default_server_url();
        changed = true;
    } else if trimmed != config.server.url {
        config.server.url = trimmed.to_string();
        changed = true;
    }

    if config.server.timeout_secs == 0 {
        config.server.timeout_secs = default_timeout_secs();
        changed = true;
    }

    if config.storage.credentials == CredentialBackend::Unknown {
        config.storage.credentials = CredentialBackend::File;
        changed = true;
    }

    changed
}

/// Apply the `TASKBOARD_SERVER_URL` override when `value` is non-empty.
pub fn apply_server_url_override(config: &mut ClientConfig, value: Option<&str>) {
    if let Some(url) = value.map(str::trim).filter(|v| !v.is_empty()) {
        config.server.url = url.trim_end_matches('/').to_string();
    }
}
