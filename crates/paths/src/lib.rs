//! Where the taskboard client keeps its files.
//!
//! Everything lives in one directory: the platform config dir
//! (`~/.config/taskboard` on Linux) unless `TASKBOARD_CONFIG_DIR` points
//! elsewhere.

use std::path::{Path, PathBuf};

use taskboard_runtime_config::CONFIG_FILE_NAME;

/// Environment variable that replaces the platform config directory.
pub const CONFIG_DIR_ENV: &str = "TASKBOARD_CONFIG_DIR";

/// File holding the persisted access/refresh token pair.
pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("could not determine a home directory for config files")]
    NoHomeDir,
}

pub type Result<T> = std::result::Result<T, PathError>;

/// Config directory, honoring `TASKBOARD_CONFIG_DIR`.
pub fn config_dir() -> Result<PathBuf> {
    resolve_config_dir(std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from))
}

fn resolve_config_dir(override_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = override_dir.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir);
    }
    directories::ProjectDirs::from("io", "taskboard", "taskboard")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(PathError::NoHomeDir)
}

/// Canonical config file path.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_path_in(&config_dir()?))
}

/// Persisted credentials path.
pub fn credentials_path() -> Result<PathBuf> {
    Ok(credentials_path_in(&config_dir()?))
}

pub fn config_path_in(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

pub fn credentials_path_in(dir: &Path) -> PathBuf {
    dir.join(CREDENTIALS_FILE_NAME)
}
