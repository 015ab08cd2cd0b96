use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use taskboard_api_client::ApiClient;
use taskboard_local_store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
use taskboard_paths::credentials_path;
use taskboard_runtime_config::{ClientConfig, CredentialBackend};
use tracing::debug;

use crate::config::load_config;

fn open_store(config: &ClientConfig) -> Result<Arc<dyn CredentialStore>> {
    match config.storage.credentials {
        CredentialBackend::Memory => Ok(Arc::new(MemoryCredentialStore::new())),
        CredentialBackend::File | CredentialBackend::Unknown => {
            let path = credentials_path()?;
            debug!(path = %path.display(), "using file credential store");
            Ok(Arc::new(FileCredentialStore::new(path)))
        }
    }
}

/// Build an API client from the effective config.
pub fn connect() -> Result<ApiClient> {
    let config = load_config()?;
    let store = open_store(&config)?;
    ApiClient::new(
        &config.server.url,
        Duration::from_secs(config.server.timeout_secs),
        store,
    )
    .with_context(|| format!("Failed to set up client for {}", config.server.url))
}
