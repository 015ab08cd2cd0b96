//! Signed-in user state on top of the API client's session.

use tracing::{info, warn};

use taskboard_api::{
    ChangePasswordRequest, LoginRequest, ProfileUpdate, RegisterRequest, UserProfile,
};
use taskboard_api_client::{ApiClient, ApiError};

use crate::error::{ClientError, Result};

pub struct AuthState {
    api: ApiClient,
    user: Option<UserProfile>,
    last_error: Option<String>,
}

impl AuthState {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            user: None,
            last_error: None,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Message from the last failed login or registration.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn require_user(&self) -> Result<&UserProfile> {
        self.user.as_ref().ok_or(ClientError::NotSignedIn)
    }

    /// Resume a stored session. With a stored access token the profile is
    /// fetched; if that fails both tokens are dropped and the state stays
    /// anonymous. Only storage errors are returned.
    pub async fn restore(&mut self) -> Result<Option<&UserProfile>> {
        self.user = None;
        if self.api.session().access_token()?.is_none() {
            return Ok(None);
        }
        match self.api.me().await {
            Ok(user) => {
                info!(username = %user.username, "session restored");
                self.user = Some(user);
            }
            Err(e) => {
                warn!("stored session rejected: {e}");
                self.api.session().end()?;
            }
        }
        Ok(self.user.as_ref())
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<&UserProfile> {
        self.last_error = None;
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let signed_in = async {
            self.api.login(&req).await?;
            self.api.me().await
        }
        .await;
        self.finish(signed_in)
    }

    /// Create the account, then sign in with the same credentials.
    pub async fn register(&mut self, req: &RegisterRequest) -> Result<&UserProfile> {
        self.last_error = None;
        let login = LoginRequest {
            username: req.username.clone(),
            password: req.password.clone(),
        };
        let signed_in = async {
            self.api.register(req).await?;
            self.api.login(&login).await?;
            self.api.me().await
        }
        .await;
        self.finish(signed_in)
    }

    fn finish(&mut self, signed_in: std::result::Result<UserProfile, ApiError>) -> Result<&UserProfile> {
        match signed_in {
            Ok(user) => {
                info!(username = %user.username, "signed in");
                Ok(self.user.insert(user))
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    pub fn logout(&mut self) -> Result<()> {
        self.api.logout()?;
        self.user = None;
        Ok(())
    }

    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<&UserProfile> {
        let user = self.api.update_profile(update).await?;
        Ok(self.user.insert(user))
    }

    pub async fn change_password(&self, old: &str, new: &str, confirm: &str) -> Result<()> {
        self.api
            .change_password(&ChangePasswordRequest {
                old_password: old.to_string(),
                new_password: new.to_string(),
                confirm_password: confirm.to_string(),
            })
            .await?;
        Ok(())
    }
}
