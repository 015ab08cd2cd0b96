pub mod client;
pub mod error;
pub mod request;
pub mod session;

#[cfg(feature = "testing")]
pub mod testing;

pub use client::ApiClient;
pub use error::{ApiError, LOGIN_PATH};
pub use request::PendingRequest;
pub use session::Session;
pub use taskboard_api;
pub use taskboard_local_store;
