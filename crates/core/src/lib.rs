pub mod auth;
pub mod board;
pub mod error;
pub mod notice;
pub mod optimistic;

pub use auth::AuthState;
pub use board::{BoardView, Column, TaskFilter};
pub use error::{ClientError, Result};
pub use notice::{Notice, NoticeLevel, Notifier};
pub use optimistic::{Entity, MutationError, MutationFailure, MutationOutcome, OptimisticStore};
