use taskboard_api::TaskId;
use taskboard_api_client::ApiError;

use crate::optimistic::MutationError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error("task {0} is not on this board")]
    UnknownTask(TaskId),

    #[error("no user found with email {0}")]
    UserNotFound(String),

    #[error("{0} is already a member of this board")]
    AlreadyMember(String),

    #[error("not signed in")]
    NotSignedIn,
}

impl ClientError {
    /// Where the UI should navigate, if the error ended the session.
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::Api(e) => e.redirect(),
            Self::Mutation(MutationError::SessionExpired { redirect_to }) => Some(*redirect_to),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        self.redirect().is_some()
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
