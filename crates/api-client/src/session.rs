//! Session manager: owns the token pair and recovers from expired access
//! tokens.
//!
//! Only this type writes to the [`CredentialStore`]. Readers go through
//! [`Session::attach_credentials`], which re-reads storage on every call so a
//! refresh performed by one request is picked up by the next.
//!
//! Refresh is single-flight. Every request that hits a 401 queues on
//! `refresh_gate`; the first one through performs the exchange, later ones
//! notice the stored access token no longer matches the one they were
//! rejected with and reuse it. When the exchange fails the store is cleared,
//! so queued requests find no refresh token and fail fast with
//! `SessionExpired` instead of refreshing again.

use std::future::Future;
use std::sync::Arc;

use taskboard_api::RefreshResponse;
use taskboard_local_store::{CredentialPair, CredentialStore};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ApiError, Result};
use crate::request::PendingRequest;

pub struct Session {
    store: Arc<dyn CredentialStore>,
    refresh_gate: Mutex<()>,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        Ok(self.store.access_token()?)
    }

    pub fn has_refresh_token(&self) -> Result<bool> {
        Ok(self.store.refresh_token()?.is_some())
    }

    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(self.access_token()?.is_some())
    }

    /// Add the current access token to `request`; no-op when signed out.
    pub fn attach_credentials(&self, request: &mut PendingRequest) -> Result<()> {
        if let Some(token) = self.store.access_token()? {
            request.set_bearer(&token);
        }
        Ok(())
    }

    /// Persist the pair returned by login.
    pub fn establish(&self, pair: CredentialPair) -> Result<()> {
        self.store.save_pair(&pair)?;
        info!("session established");
        Ok(())
    }

    /// Drop both tokens (logout).
    pub fn end(&self) -> Result<()> {
        self.store.clear()?;
        info!("session ended");
        Ok(())
    }

    /// Obtain a usable access token after a request carrying
    /// `rejected_token` came back 401.
    ///
    /// `exchange` trades a refresh token for a new access token and is
    /// called at most once per expired token no matter how many requests
    /// are waiting. Any failure of the exchange, network errors included,
    /// clears both tokens and yields [`ApiError::SessionExpired`].
    pub async fn refresh_after_unauthorized<F, Fut>(
        &self,
        rejected_token: Option<&str>,
        exchange: F,
    ) -> Result<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<RefreshResponse>>,
    {
        let _gate = self.refresh_gate.lock().await;

        let stored = self.store.read()?;
        if let Some(current) = stored.access_token.as_deref() {
            if Some(current) != rejected_token {
                debug!("access token already replaced, reusing it");
                return Ok(current.to_string());
            }
        }

        let Some(refresh_token) = stored.refresh_token else {
            info!("no refresh token stored, session expired");
            return Err(ApiError::session_expired());
        };

        debug!("refreshing access token");
        match exchange(refresh_token).await {
            Ok(RefreshResponse { access, refresh }) => {
                match refresh {
                    Some(rotated) => self
                        .store
                        .save_pair(&CredentialPair::new(access.clone(), rotated))?,
                    None => self.store.set_access_token(&access)?,
                }
                info!("access token refreshed");
                Ok(access)
            }
            Err(e) => {
                warn!("token refresh failed: {e}");
                if let Err(clear_err) = self.store.clear() {
                    warn!("failed to clear credentials after refresh failure: {clear_err}");
                }
                Err(ApiError::session_expired())
            }
        }
    }
}
