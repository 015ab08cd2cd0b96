use reqwest::StatusCode;
use taskboard_local_store::StoreError;

/// Route the UI should send the user to when the session cannot be recovered.
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server still rejected the credentials after the one allowed
    /// refresh-and-retry.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// No refresh token, or the refresh exchange failed. Both tokens have
    /// been dropped where applicable; the caller should send the user to
    /// `redirect_to`.
    #[error("session expired, sign in again")]
    SessionExpired { redirect_to: &'static str },

    /// Any other non-success response.
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("network failure: {0}")]
    Network(#[source] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("invalid request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("credential storage: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn session_expired() -> Self {
        Self::SessionExpired {
            redirect_to: LOGIN_PATH,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// Where the UI should navigate, if anywhere.
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::SessionExpired { redirect_to } => Some(*redirect_to),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    /// Transient failures the user may simply try again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
