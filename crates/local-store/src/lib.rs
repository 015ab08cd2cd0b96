//! Credential storage backends.
//!
//! The session layer never touches storage directly: it goes through a
//! [`CredentialStore`] so tests and the CLI can pick [`MemoryCredentialStore`]
//! or [`FileCredentialStore`]. Both tokens are stored under fixed keys
//! (`accessToken`, `refreshToken`).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credential file {path} is not valid json: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("credential store lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Access/refresh token pair handed out by a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens must never end up in logs.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Raw persisted state. Either token may be missing, e.g. after a partial
/// write by an older client.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(rename = "accessToken", default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl StoredCredentials {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

impl std::fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "<set>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl From<CredentialPair> for StoredCredentials {
    fn from(pair: CredentialPair) -> Self {
        Self {
            access_token: Some(pair.access_token),
            refresh_token: Some(pair.refresh_token),
        }
    }
}

/// Durable home of the token pair.
///
/// Backends implement `read`, `write` and `clear`; the token helpers are
/// built on top of them and re-read storage on every call.
pub trait CredentialStore: Send + Sync {
    fn read(&self) -> Result<StoredCredentials>;

    fn write(&self, credentials: &StoredCredentials) -> Result<()>;

    fn clear(&self) -> Result<()>;

    fn access_token(&self) -> Result<Option<String>> {
        Ok(self.read()?.access_token)
    }

    fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.read()?.refresh_token)
    }

    fn save_pair(&self, pair: &CredentialPair) -> Result<()> {
        self.write(&StoredCredentials::from(pair.clone()))
    }

    /// Replace the access token, keeping the stored refresh token.
    fn set_access_token(&self, token: &str) -> Result<()> {
        let mut current = self.read()?;
        current.access_token = Some(token.to_string());
        self.write(&current)
    }
}

// ── In-memory backend ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: Mutex<StoredCredentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            inner: Mutex::new(pair.into()),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn read(&self) -> Result<StoredCredentials> {
        Ok(self.inner.lock().map_err(|_| StoreError::Poisoned)?.clone())
    }

    fn write(&self, credentials: &StoredCredentials) -> Result<()> {
        *self.inner.lock().map_err(|_| StoreError::Poisoned)? = credentials.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.inner.lock().map_err(|_| StoreError::Poisoned)? = StoredCredentials::default();
        Ok(())
    }
}

// ── File backend ────────────────────────────────────────────────────────

/// JSON file backend. Writes go through a temp file and a rename so a crash
/// never leaves half a token on disk.
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn read(&self) -> Result<StoredCredentials> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoredCredentials::default());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        if content.trim().is_empty() {
            return Ok(StoredCredentials::default());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, credentials: &StoredCredentials) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        }
        let body = serde_json::to_vec_pretty(credentials).map_err(|source| {
            StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp = self.path.with_extension("json.tmp");
        write_owner_only(&tmp, &body).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        debug!(path = %self.path.display(), "credentials written");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "credentials cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(e)),
        }
    }
}

/// Write `body` to a file that is 0600 from the moment it exists on unix.
fn write_owner_only(path: &Path, body: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // `mode` only applies on create; a leftover tmp file keeps its old mode.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(body)?;
    file.sync_all()
}
