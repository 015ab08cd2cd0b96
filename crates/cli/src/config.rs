use std::path::Path;

use anyhow::{Context, Result};
use taskboard_paths::{config_dir, config_path_in};
use taskboard_runtime_config::{
    apply_compat_fallbacks, apply_server_url_override, ClientConfig, CredentialBackend,
    SERVER_URL_ENV,
};

/// Storage choice accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageArg {
    File,
    Memory,
}

impl From<StorageArg> for CredentialBackend {
    fn from(arg: StorageArg) -> Self {
        match arg {
            StorageArg::File => CredentialBackend::File,
            StorageArg::Memory => CredentialBackend::Memory,
        }
    }
}

/// Read `taskboard.toml` from `dir`, returning defaults if it does not exist.
pub fn load_config_from(dir: &Path) -> Result<ClientConfig> {
    let path = config_path_in(dir);
    if !path.exists() {
        return Ok(ClientConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;
    let mut config: ClientConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;
    apply_compat_fallbacks(&mut config);
    Ok(config)
}

pub fn save_config_to(dir: &Path, config: &ClientConfig) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create config dir at {}", dir.display()))?;
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    let path = config_path_in(dir);
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config at {}", path.display()))?;
    Ok(())
}

/// Effective config: the file plus the `TASKBOARD_SERVER_URL` override.
pub fn load_config() -> Result<ClientConfig> {
    let dir = config_dir()?;
    let mut config = load_config_from(&dir)?;
    apply_server_url_override(&mut config, std::env::var(SERVER_URL_ENV).ok().as_deref());
    Ok(config)
}

fn storage_label(backend: CredentialBackend) -> &'static str {
    match backend {
        CredentialBackend::File => "file",
        CredentialBackend::Memory => "memory",
        CredentialBackend::Unknown => "unknown",
    }
}

/// Print current config.
pub fn show_config() -> Result<()> {
    let dir = config_dir()?;
    let config = load_config()?;
    println!("Config file: {}", config_path_in(&dir).display());
    println!();
    println!("[server]");
    println!("  url          = {}", config.server.url);
    println!("  timeout_secs = {}", config.server.timeout_secs);
    if std::env::var(SERVER_URL_ENV).is_ok_and(|v| !v.trim().is_empty()) {
        println!("  (url overridden by {SERVER_URL_ENV})");
    }
    println!();
    println!("[storage]");
    println!("  credentials  = {}", storage_label(config.storage.credentials));
    Ok(())
}

/// Update config with provided values. The env override is never written.
pub fn set_config(
    server_url: Option<String>,
    timeout_secs: Option<u64>,
    storage: Option<StorageArg>,
) -> Result<()> {
    let dir = config_dir()?;
    let mut config = load_config_from(&dir)?;

    if let Some(url) = server_url {
        config.server.url = url;
    }
    if let Some(secs) = timeout_secs {
        config.server.timeout_secs = secs;
    }
    if let Some(storage) = storage {
        config.storage.credentials = storage.into();
    }
    apply_compat_fallbacks(&mut config);

    save_config_to(&dir, &config)?;
    println!("Configuration updated.");
    show_config()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = load_config_from(tmp.path()).expect("load");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn save_then_load_keeps_values() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut config = ClientConfig::default();
        config.server.url = "https://boards.example.com/api".into();
        config.server.timeout_secs = 5;
        config.storage.credentials = StorageArg::Memory.into();

        save_config_to(tmp.path(), &config).expect("save");
        let loaded = load_config_from(tmp.path()).expect("load");

        assert_eq!(loaded, config);
    }

    #[test]
    fn legacy_values_are_normalized_on_load() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            tmp.path().join("taskboard.toml"),
            "[server]\nurl = \"https://boards.example.com/api/\"\n\n[storage]\ncredentials = \"disk\"\n",
        )
        .expect("write");

        let config = load_config_from(tmp.path()).expect("load");

        assert_eq!(config.server.url, "https://boards.example.com/api");
        assert_eq!(config.server.timeout_secs, 30);
        assert_eq!(config.storage.credentials, CredentialBackend::File);
    }

    #[test]
    fn malformed_file_names_the_path() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("taskboard.toml"), "[server\n").expect("write");

        let err = load_config_from(tmp.path()).unwrap_err();

        assert!(format!("{err:#}").contains("Failed to parse config"));
    }
}
