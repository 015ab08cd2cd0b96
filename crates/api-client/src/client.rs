use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use taskboard_api::*;
use taskboard_local_store::{CredentialPair, CredentialStore};

use crate::error::{ApiError, Result};
use crate::request::PendingRequest;
use crate::session::Session;

/// Typed HTTP client for the taskboard API.
///
/// Every authenticated call goes through [`ApiClient::execute`]: credentials
/// are attached from the session, a 401 triggers one shared refresh and a
/// single retry, and anything else is handed back untouched. Cloning is
/// cheap; clones share the connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    /// Create a new client with the given base URL (including the `/api`
    /// prefix) and transport timeout.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Network)?;
        Ok(Self::with_client(client, base_url, store))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(
        client: reqwest::Client,
        base_url: &str,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Arc::new(Session::new(store)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── Transport ─────────────────────────────────────────────────────────

    async fn dispatch(&self, request: &PendingRequest) -> Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }
        builder.send().await.map_err(ApiError::Network)
    }

    /// Attach credentials, send, and recover from one expired access token.
    pub async fn execute(&self, mut request: PendingRequest) -> Result<reqwest::Response> {
        if request.is_authenticated() {
            self.session.attach_credentials(&mut request)?;
        }
        let response = self.dispatch(&request).await?;
        self.handle_response(request, response).await
    }

    /// Pass non-401 responses through; on a 401 for a request that has not
    /// been retried yet, refresh (shared with any concurrent 401s) and
    /// re-issue it exactly once.
    pub async fn handle_response(
        &self,
        mut request: PendingRequest,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        if response.status() != StatusCode::UNAUTHORIZED || !request.is_authenticated() {
            return Ok(response);
        }
        if request.is_retried() {
            return Err(unauthorized(response).await);
        }
        request.mark_retried();

        let rejected = request.bearer_token().map(str::to_owned);
        let access = self
            .session
            .refresh_after_unauthorized(rejected.as_deref(), |refresh| {
                self.exchange_refresh(refresh)
            })
            .await?;

        request.set_bearer(&access);
        debug!(method = %request.method, path = %request.path, "retrying with refreshed token");
        let retried = self.dispatch(&request).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(unauthorized(retried).await);
        }
        Ok(retried)
    }

    async fn exchange_refresh(&self, refresh: String) -> Result<RefreshResponse> {
        let request = PendingRequest::post("/auth/token/refresh/")
            .public()
            .json(&RefreshRequest { refresh })?;
        let response = self.dispatch(&request).await?;
        parse_response(response).await
    }

    async fn send<T: DeserializeOwned>(&self, request: PendingRequest) -> Result<T> {
        let response = self.execute(request).await?;
        parse_response(response).await
    }

    async fn send_empty(&self, request: PendingRequest) -> Result<()> {
        let response = self.execute(request).await?;
        ensure_success(response).await.map(|_| ())
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(PendingRequest::post(path).json(body)?).await
    }

    async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send(PendingRequest::put(path).json(body)?).await
    }

    // ── Auth ──────────────────────────────────────────────────────────────

    /// Log in and persist the returned token pair.
    pub async fn login(&self, req: &LoginRequest) -> Result<TokenPairResponse> {
        let request = PendingRequest::post("/auth/login/").public().json(req)?;
        let tokens: TokenPairResponse = self.send(request).await?;
        self.session
            .establish(CredentialPair::new(tokens.access.clone(), tokens.refresh.clone()))?;
        Ok(tokens)
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<UserProfile> {
        let request = PendingRequest::post("/auth/register/").public().json(req)?;
        self.send(request).await
    }

    /// Forget both tokens. The backend keeps no server-side session to end.
    pub fn logout(&self) -> Result<()> {
        self.session.end()
    }

    pub async fn me(&self) -> Result<UserProfile> {
        self.send(PendingRequest::get("/auth/me/")).await
    }

    pub async fn update_profile(&self, req: &ProfileUpdate) -> Result<UserProfile> {
        self.put_json("/auth/profile/", req).await
    }

    pub async fn change_password(&self, req: &ChangePasswordRequest) -> Result<serde_json::Value> {
        self.post_json("/auth/change-password/", req).await
    }

    pub async fn search_users(&self, query: &str) -> Result<Vec<UserProfile>> {
        let path = format!("/auth/search/?q={}", urlencoding::encode(query));
        self.send(PendingRequest::get(path)).await
    }

    // ── Boards ────────────────────────────────────────────────────────────

    pub async fn list_boards(&self) -> Result<Vec<Board>> {
        self.send(PendingRequest::get("/boards/")).await
    }

    pub async fn get_board(&self, id: BoardId) -> Result<Board> {
        self.send(PendingRequest::get(format!("/boards/{id}/"))).await
    }

    pub async fn create_board(&self, req: &CreateBoardRequest) -> Result<Board> {
        self.post_json("/boards/", req).await
    }

    pub async fn update_board(&self, id: BoardId, req: &UpdateBoardRequest) -> Result<Board> {
        self.put_json(&format!("/boards/{id}/"), req).await
    }

    pub async fn delete_board(&self, id: BoardId) -> Result<()> {
        self.send_empty(PendingRequest::delete(format!("/boards/{id}/")))
            .await
    }

    pub async fn add_member(
        &self,
        board_id: BoardId,
        user_id: UserId,
        role: InviteRole,
    ) -> Result<serde_json::Value> {
        self.post_json(
            &format!("/boards/{board_id}/add_member/"),
            &AddMemberRequest { user_id, role },
        )
        .await
    }

    pub async fn remove_member(
        &self,
        board_id: BoardId,
        user_id: UserId,
    ) -> Result<serde_json::Value> {
        self.post_json(
            &format!("/boards/{board_id}/remove_member/"),
            &UserRefRequest { user_id },
        )
        .await
    }

    pub async fn add_task_to_board(
        &self,
        board_id: BoardId,
        task_id: TaskId,
    ) -> Result<serde_json::Value> {
        self.post_json(
            &format!("/boards/{board_id}/add_task/"),
            &TaskRefRequest { task_id },
        )
        .await
    }

    pub async fn remove_task_from_board(
        &self,
        board_id: BoardId,
        task_id: TaskId,
    ) -> Result<serde_json::Value> {
        self.post_json(
            &format!("/boards/{board_id}/remove_task/"),
            &TaskRefRequest { task_id },
        )
        .await
    }

    pub async fn board_tasks(&self, board_id: BoardId) -> Result<Vec<Task>> {
        self.send(PendingRequest::get(format!("/boards/{board_id}/tasks/")))
            .await
    }

    pub async fn invite_user(&self, req: &InviteRequest) -> Result<serde_json::Value> {
        self.post_json("/invitations/invite/", req).await
    }

    // ── Tasks ─────────────────────────────────────────────────────────────

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.send(PendingRequest::get("/tasks/")).await
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Task> {
        self.send(PendingRequest::get(format!("/tasks/{id}/"))).await
    }

    pub async fn create_task(&self, req: &CreateTaskRequest) -> Result<Task> {
        self.post_json("/tasks/", req).await
    }

    pub async fn update_task(&self, id: TaskId, req: &UpdateTaskRequest) -> Result<Task> {
        self.put_json(&format!("/tasks/{id}/"), req).await
    }

    pub async fn delete_task(&self, id: TaskId) -> Result<()> {
        self.send_empty(PendingRequest::delete(format!("/tasks/{id}/")))
            .await
    }

    pub async fn add_collaborator(
        &self,
        task_id: TaskId,
        user_id: UserId,
    ) -> Result<serde_json::Value> {
        self.post_json(
            &format!("/tasks/{task_id}/add_collaborator/"),
            &UserRefRequest { user_id },
        )
        .await
    }

    pub async fn remove_collaborator(
        &self,
        task_id: TaskId,
        user_id: UserId,
    ) -> Result<serde_json::Value> {
        self.post_json(
            &format!("/tasks/{task_id}/remove_collaborator/"),
            &UserRefRequest { user_id },
        )
        .await
    }

    pub async fn calendar_tasks(&self, query: &CalendarQuery) -> Result<Vec<Task>> {
        let path = format!("/tasks/calendar/{}", query.to_query_string());
        self.send(PendingRequest::get(path)).await
    }

    pub async fn upcoming_tasks(&self) -> Result<Vec<Task>> {
        self.send(PendingRequest::get("/tasks/upcoming/")).await
    }
}

async fn unauthorized(response: reqwest::Response) -> ApiError {
    let body = response.text().await.unwrap_or_default();
    ApiError::Unauthorized {
        message: flatten_error_body(&body),
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status,
        message: flatten_error_body(&body),
    })
}

/// Parse an HTTP response: return the deserialized body on 2xx, or a
/// `Status` error carrying the flattened error body.
async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let response = ensure_success(response).await?;
    let bytes = response.bytes().await.map_err(ApiError::Network)?;
    // Association endpoints may answer with an empty body.
    let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &bytes
    };
    serde_json::from_slice(bytes).map_err(ApiError::Decode)
}
