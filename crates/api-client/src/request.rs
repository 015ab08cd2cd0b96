use reqwest::Method;
use serde::Serialize;

use crate::error::{ApiError, Result};

const AUTHORIZATION: &str = "Authorization";

/// A captured outbound request.
///
/// Kept around after it is sent so the session layer can re-issue it with a
/// fresh access token. `retried` flips the first time that happens and is
/// never reset, which bounds every request to one retry.
#[derive(Clone)]
pub struct PendingRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
    authenticated: bool,
    retried: bool,
}

impl PendingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
            authenticated: true,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body).map_err(ApiError::Encode)?);
        Ok(self)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Send without credentials and without the refresh path. Used for
    /// login, registration and the refresh exchange itself, where a 401
    /// means bad credentials rather than an expired session.
    pub fn public(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Set `Authorization: Bearer <token>`, replacing any previous value.
    pub fn set_bearer(&mut self, token: &str) {
        self.headers
            .retain(|(name, _)| !name.eq_ignore_ascii_case(AUTHORIZATION));
        self.headers
            .push((AUTHORIZATION.to_string(), format!("Bearer {token}")));
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(AUTHORIZATION))
            .and_then(|(_, value)| value.strip_prefix("Bearer "))
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(name, value)| {
                if name.eq_ignore_ascii_case(AUTHORIZATION) {
                    (name.as_str(), "<redacted>")
                } else {
                    (name.as_str(), value.as_str())
                }
            })
            .collect();
        f.debug_struct("PendingRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body", &self.body)
            .field("headers", &headers)
            .field("authenticated", &self.authenticated)
            .field("retried", &self.retried)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_bearer_replaces_previous_token() {
        let mut req = PendingRequest::get("/tasks/").header("authorization", "Bearer A1");
        assert_eq!(req.bearer_token(), Some("A1"));

        req.set_bearer("A2");
        assert_eq!(req.bearer_token(), Some("A2"));
        assert_eq!(
            req.headers
                .iter()
                .filter(|(n, _)| n.eq_ignore_ascii_case("authorization"))
                .count(),
            1
        );
    }

    #[test]
    fn debug_redacts_authorization() {
        let mut req = PendingRequest::get("/auth/me/");
        req.set_bearer("very-secret");
        let rendered = format!("{req:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn public_requests_skip_session_handling() {
        let req = PendingRequest::post("/auth/login/").public();
        assert!(!req.is_authenticated());
        assert!(!req.is_retried());
        assert!(PendingRequest::get("/tasks/").is_authenticated());
    }
}
