//! In-process fake backend for tests.
//!
//! Serves the taskboard REST surface from memory on `127.0.0.1:0` with
//! knobs for the failure modes the client has to survive: expired access
//! tokens, rejected or slow refreshes, failing or slow task updates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use taskboard_api::*;

type Reply<T> = std::result::Result<Json<T>, Response>;

/// One request as seen by the fake backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    inner: Arc<Mutex<BackendState>>,
}

#[derive(Default)]
struct BackendState {
    users: Vec<(UserProfile, String)>,
    access_tokens: HashMap<String, UserId>,
    refresh_tokens: HashMap<String, UserId>,
    issued_access: u32,
    issued_refresh: u32,
    refresh_calls: usize,
    refresh_delay: Duration,
    reject_refresh: bool,
    fail_task_updates: bool,
    update_delay: Duration,
    requests: Vec<RecordedRequest>,
    boards: Vec<Board>,
    tasks: Vec<Task>,
    invitations: Vec<Value>,
    next_id: i64,
}

impl BackendState {
    fn issue_access(&mut self, user_id: UserId) -> String {
        self.issued_access += 1;
        let token = format!("A{}", self.issued_access);
        self.access_tokens.insert(token.clone(), user_id);
        token
    }

    fn issue_refresh(&mut self, user_id: UserId) -> String {
        self.issued_refresh += 1;
        let token = format!("R{}", self.issued_refresh);
        self.refresh_tokens.insert(token.clone(), user_id);
        token
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn user(&self, id: UserId) -> Option<UserProfile> {
        self.users
            .iter()
            .find(|(u, _)| u.id == id)
            .map(|(u, _)| u.clone())
    }

    fn board_mut(&mut self, id: BoardId) -> std::result::Result<&mut Board, Response> {
        self.boards
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| error(StatusCode::NOT_FOUND, "Not found."))
    }

    fn task_mut(&mut self, id: TaskId) -> std::result::Result<&mut Task, Response> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| error(StatusCode::NOT_FOUND, "Not found."))
    }
}

fn user_profile(id: UserId, username: &str, first: &str, last: &str) -> UserProfile {
    UserProfile {
        id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        first_name: first.to_string(),
        last_name: last.to_string(),
        profile: Some(ProfileDetails::default()),
    }
}

impl FakeBackend {
    /// Backend with two accounts: `alice` / `x` (id 1) and `bob` / `y`
    /// (id 2).
    pub fn new() -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state();
            state.users.push((user_profile(1, "alice", "Alice", "Liddell"), "x".into()));
            state.users.push((user_profile(2, "bob", "Bob", "Builder"), "y".into()));
            state.next_id = 100;
        }
        backend
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serve on an ephemeral port; returns the base URL including `/api`.
    pub async fn spawn(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        let addr = listener.local_addr().expect("fake backend addr");
        let app = self.router();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend serve");
        });
        format!("http://{addr}/api")
    }

    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/auth/login/", post(login))
            .route("/auth/register/", post(register))
            .route("/auth/token/refresh/", post(refresh))
            .route("/auth/me/", get(me))
            .route("/auth/profile/", axum::routing::put(update_profile))
            .route("/auth/change-password/", post(change_password))
            .route("/auth/search/", get(search_users))
            .route("/boards/", get(list_boards).post(create_board))
            .route(
                "/boards/{id}/",
                get(get_board).put(update_board).delete(delete_board),
            )
            .route("/boards/{id}/add_member/", post(add_member))
            .route("/boards/{id}/remove_member/", post(remove_member))
            .route("/boards/{id}/add_task/", post(add_task))
            .route("/boards/{id}/remove_task/", post(remove_task))
            .route("/boards/{id}/tasks/", get(board_tasks))
            .route("/tasks/", get(list_tasks).post(create_task))
            .route("/tasks/calendar/", get(calendar_tasks))
            .route("/tasks/upcoming/", get(upcoming_tasks))
            .route(
                "/tasks/{id}/",
                get(get_task).put(update_task).delete(delete_task),
            )
            .route("/tasks/{id}/add_collaborator/", post(add_collaborator))
            .route("/tasks/{id}/remove_collaborator/", post(remove_collaborator))
            .route("/invitations/invite/", post(invite));

        Router::new()
            .nest("/api", api)
            .layer(middleware::from_fn_with_state(self.clone(), record))
            .with_state(self.clone())
    }

    // ── Seeding ───────────────────────────────────────────────────────────

    /// Log `username` in directly, returning `(access, refresh)`.
    pub fn issue_tokens(&self, username: &str) -> (String, String) {
        let mut state = self.state();
        let id = state
            .users
            .iter()
            .find(|(u, _)| u.username == username)
            .map(|(u, _)| u.id)
            .expect("seeded user");
        (state.issue_access(id), state.issue_refresh(id))
    }

    pub fn seed_board(&self, name: &str, owner_id: UserId) -> Board {
        let mut state = self.state();
        let id = state.next_id();
        let owner = state.user(owner_id).expect("seeded owner");
        let board = Board {
            id,
            name: name.to_string(),
            created_at: Utc::now(),
            owner: owner.clone(),
            members: vec![BoardMember {
                id: id * 10,
                user: owner,
                role: BoardRole::Owner,
                joined_at: Utc::now(),
            }],
            task_count: 0,
            members_count: 1,
        };
        state.boards.push(board.clone());
        board
    }

    pub fn seed_task(&self, title: &str, status: TaskStatus, board_id: Option<BoardId>) -> Task {
        let mut state = self.state();
        let id = state.next_id();
        let owner = state.user(1).expect("seeded owner");
        let board_name = board_id.and_then(|b| {
            state
                .boards
                .iter()
                .find(|board| board.id == b)
                .map(|board| board.name.clone())
        });
        let task = Task {
            id,
            title: title.to_string(),
            description: None,
            priority: Priority::Medium,
            status,
            start_date: None,
            end_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            owner,
            collaborators: Vec::new(),
            board_id,
            board_name,
        };
        if let Some(b) = board_id {
            if let Ok(board) = state.board_mut(b) {
                board.task_count += 1;
            }
        }
        state.tasks.push(task.clone());
        task
    }

    /// Overwrite a task behind the client's back (another editor).
    pub fn edit_task(&self, id: TaskId, edit: impl FnOnce(&mut Task)) {
        let mut state = self.state();
        if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
            edit(task);
            task.updated_at = Utc::now();
        }
    }

    // ── Failure knobs ─────────────────────────────────────────────────────

    /// Invalidate every access token issued so far.
    pub fn expire_access_tokens(&self) {
        self.state().access_tokens.clear();
    }

    pub fn set_reject_refresh(&self, reject: bool) {
        self.state().reject_refresh = reject;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state().refresh_delay = delay;
    }

    pub fn set_fail_task_updates(&self, fail: bool) {
        self.state().fail_task_updates = fail;
    }

    pub fn set_update_delay(&self, delay: Duration) {
        self.state().update_delay = delay;
    }

    // ── Inspection ────────────────────────────────────────────────────────

    pub fn refresh_calls(&self) -> usize {
        self.state().refresh_calls
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().requests.clone()
    }

    /// Authorization headers of every request to `method path`, in order.
    pub fn authorizations(&self, method: &str, path: &str) -> Vec<Option<String>> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .map(|r| r.authorization.clone())
            .collect()
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.state().tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn board(&self, id: BoardId) -> Option<Board> {
        self.state().boards.iter().find(|b| b.id == id).cloned()
    }

    pub fn invitations(&self) -> Vec<Value> {
        self.state().invitations.clone()
    }
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

async fn record(State(backend): State<FakeBackend>, request: Request, next: Next) -> Response {
    let recorded = RecordedRequest {
        method: request.method().to_string(),
        path: request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default(),
        authorization: request
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    backend.state().requests.push(recorded);
    next.run(request).await
}

fn authenticate(backend: &FakeBackend, headers: &HeaderMap) -> std::result::Result<UserId, Response> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            error(
                StatusCode::UNAUTHORIZED,
                "Authentication credentials were not provided.",
            )
        })?;
    backend
        .state()
        .access_tokens
        .get(token)
        .copied()
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Given token not valid for any token type"))
}

// ── Auth handlers ───────────────────────────────────────────────────────

async fn login(
    State(backend): State<FakeBackend>,
    Json(req): Json<LoginRequest>,
) -> Reply<TokenPairResponse> {
    let mut state = backend.state();
    let user_id = state
        .users
        .iter()
        .find(|(u, pw)| u.username == req.username && *pw == req.password)
        .map(|(u, _)| u.id)
        .ok_or_else(|| {
            error(
                StatusCode::UNAUTHORIZED,
                "No active account found with the given credentials",
            )
        })?;
    let access = state.issue_access(user_id);
    let refresh = state.issue_refresh(user_id);
    Ok(Json(TokenPairResponse { access, refresh }))
}

async fn register(
    State(backend): State<FakeBackend>,
    Json(req): Json<RegisterRequest>,
) -> std::result::Result<(StatusCode, Json<UserProfile>), Response> {
    if req.password != req.password_confirm {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "password": ["Password fields didn't match."] })),
        )
            .into_response());
    }
    let mut state = backend.state();
    if state.users.iter().any(|(u, _)| u.username == req.username) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "username": ["A user with that username already exists."] })),
        )
            .into_response());
    }
    let id = state.next_id();
    let user = UserProfile {
        id,
        username: req.username,
        email: req.email,
        first_name: req.first_name,
        last_name: req.last_name,
        profile: None,
    };
    state.users.push((user.clone(), req.password));
    Ok((StatusCode::CREATED, Json(user)))
}

async fn refresh(
    State(backend): State<FakeBackend>,
    Json(req): Json<RefreshRequest>,
) -> Reply<RefreshResponse> {
    let delay = {
        let mut state = backend.state();
        state.refresh_calls += 1;
        state.refresh_delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mut state = backend.state();
    let owner = state.refresh_tokens.get(&req.refresh).copied();
    match owner {
        Some(user_id) if !state.reject_refresh => Ok(Json(RefreshResponse {
            access: state.issue_access(user_id),
            refresh: None,
        })),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" })),
        )
            .into_response()),
    }
}

async fn me(State(backend): State<FakeBackend>, headers: HeaderMap) -> Reply<UserProfile> {
    let user_id = authenticate(&backend, &headers)?;
    let user = backend.state().user(user_id);
    user.map(Json)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Not found."))
}

async fn update_profile(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(req): Json<ProfileUpdate>,
) -> Reply<UserProfile> {
    let user_id = authenticate(&backend, &headers)?;
    let mut state = backend.state();
    let (user, _) = state
        .users
        .iter_mut()
        .find(|(u, _)| u.id == user_id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Not found."))?;
    if let Some(email) = req.email {
        user.email = email;
    }
    if let Some(first) = req.first_name {
        user.first_name = first;
    }
    if let Some(last) = req.last_name {
        user.last_name = last;
    }
    if let Some(profile) = req.profile {
        user.profile = Some(profile);
    }
    Ok(Json(user.clone()))
}

async fn change_password(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(req): Json<ChangePasswordRequest>,
) -> Reply<Value> {
    let user_id = authenticate(&backend, &headers)?;
    let mut state = backend.state();
    let (_, password) = state
        .users
        .iter_mut()
        .find(|(u, _)| u.id == user_id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Not found."))?;
    if *password != req.old_password {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "old_password": ["Wrong password."] })),
        )
            .into_response());
    }
    if req.new_password != req.confirm_password {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "new_password": ["Password fields didn't match."] })),
        )
            .into_response());
    }
    *password = req.new_password;
    Ok(Json(json!({ "detail": "Password updated successfully." })))
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn search_users(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> Reply<Vec<UserProfile>> {
    authenticate(&backend, &headers)?;
    let needle = query.q.to_lowercase();
    let state = backend.state();
    Ok(Json(
        state
            .users
            .iter()
            .map(|(u, _)| u)
            .filter(|u| {
                !needle.is_empty()
                    && (u.username.to_lowercase().contains(&needle)
                        || u.email.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect(),
    ))
}

// ── Board handlers ──────────────────────────────────────────────────────

async fn list_boards(State(backend): State<FakeBackend>, headers: HeaderMap) -> Reply<Vec<Board>> {
    let user_id = authenticate(&backend, &headers)?;
    let state = backend.state();
    Ok(Json(
        state
            .boards
            .iter()
            .filter(|b| b.is_member(user_id) || b.is_owner(user_id))
            .cloned()
            .collect(),
    ))
}

async fn create_board(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(req): Json<CreateBoardRequest>,
) -> std::result::Result<(StatusCode, Json<Board>), Response> {
    let user_id = authenticate(&backend, &headers)?;
    if req.name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "name": ["This field may not be blank."] })),
        )
            .into_response());
    }
    Ok((StatusCode::CREATED, Json(backend.seed_board(&req.name, user_id))))
}

async fn get_board(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<BoardId>,
) -> Reply<Board> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    Ok(Json(state.board_mut(id)?.clone()))
}

async fn update_board(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<BoardId>,
    Json(req): Json<UpdateBoardRequest>,
) -> Reply<Board> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    let board = state.board_mut(id)?;
    if let Some(name) = req.name {
        board.name = name;
    }
    Ok(Json(board.clone()))
}

async fn delete_board(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<BoardId>,
) -> std::result::Result<StatusCode, Response> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    state.board_mut(id)?;
    state.boards.retain(|b| b.id != id);
    Ok(StatusCode::NO_CONTENT)
}

async fn add_member(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<BoardId>,
    Json(req): Json<AddMemberRequest>,
) -> Reply<Value> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    let user = state
        .user(req.user_id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "User not found."))?;
    let member_id = state.next_id();
    let board = state.board_mut(id)?;
    if board.is_member(user.id) {
        return Err(error(StatusCode::BAD_REQUEST, "User is already a member."));
    }
    board.members.push(BoardMember {
        id: member_id,
        user,
        role: match req.role {
            InviteRole::Admin => BoardRole::Admin,
            InviteRole::Member => BoardRole::Member,
        },
        joined_at: Utc::now(),
    });
    board.members_count = board.members.len() as u32;
    Ok(Json(json!({ "status": "member added" })))
}

async fn remove_member(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<BoardId>,
    Json(req): Json<UserRefRequest>,
) -> Reply<Value> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    let board = state.board_mut(id)?;
    board.members.retain(|m| m.user.id != req.user_id);
    board.members_count = board.members.len() as u32;
    Ok(Json(json!({ "status": "member removed" })))
}

async fn add_task(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<BoardId>,
    Json(req): Json<TaskRefRequest>,
) -> Reply<Value> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    let name = state.board_mut(id)?.name.clone();
    let task = state.task_mut(req.task_id)?;
    task.board_id = Some(id);
    task.board_name = Some(name);
    let board = state.board_mut(id)?;
    board.task_count += 1;
    Ok(Json(json!({ "status": "task added" })))
}

async fn remove_task(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<BoardId>,
    Json(req): Json<TaskRefRequest>,
) -> Reply<Value> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    let task = state.task_mut(req.task_id)?;
    task.board_id = None;
    task.board_name = None;
    let board = state.board_mut(id)?;
    board.task_count = board.task_count.saturating_sub(1);
    Ok(Json(json!({ "status": "task removed" })))
}

async fn board_tasks(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<BoardId>,
) -> Reply<Vec<Task>> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    state.board_mut(id)?;
    Ok(Json(
        state
            .tasks
            .iter()
            .filter(|t| t.board_id == Some(id))
            .cloned()
            .collect(),
    ))
}

async fn invite(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(req): Json<InviteRequest>,
) -> std::result::Result<(StatusCode, Json<Value>), Response> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    state.board_mut(req.board_id)?;
    let invitation = json!({
        "board_id": req.board_id,
        "invitee_email": req.invitee_email,
        "role": req.role,
        "status": "pending",
    });
    state.invitations.push(invitation.clone());
    Ok((StatusCode::CREATED, Json(invitation)))
}

// ── Task handlers ───────────────────────────────────────────────────────

async fn list_tasks(State(backend): State<FakeBackend>, headers: HeaderMap) -> Reply<Vec<Task>> {
    authenticate(&backend, &headers)?;
    Ok(Json(backend.state().tasks.clone()))
}

async fn create_task(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(req): Json<CreateTaskRequest>,
) -> std::result::Result<(StatusCode, Json<Task>), Response> {
    authenticate(&backend, &headers)?;
    if req.title.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "title": ["This field may not be blank."] })),
        )
            .into_response());
    }
    let mut task = backend.seed_task(&req.title, req.status.unwrap_or_default(), req.board_id);
    backend.edit_task(task.id, |t| {
        t.description = req.description.clone();
        t.priority = req.priority.unwrap_or_default();
        t.start_date = req.start_date.clone();
        t.end_date = req.end_date.clone();
    });
    if let Some(updated) = backend.task(task.id) {
        task = updated;
    }
    Ok((StatusCode::CREATED, Json(task)))
}

async fn get_task(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<TaskId>,
) -> Reply<Task> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    Ok(Json(state.task_mut(id)?.clone()))
}

async fn update_task(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<TaskId>,
    Json(req): Json<UpdateTaskRequest>,
) -> Reply<Task> {
    authenticate(&backend, &headers)?;
    let (delay, fail) = {
        let state = backend.state();
        (state.update_delay, state.fail_task_updates)
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if fail {
        return Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error."));
    }

    let mut state = backend.state();
    let task = state.task_mut(id)?;
    if let Some(title) = req.title {
        task.title = title;
    }
    if let Some(description) = req.description {
        task.description = Some(description);
    }
    if let Some(priority) = req.priority {
        task.priority = priority;
    }
    if let Some(status) = req.status {
        task.status = status;
    }
    if let Some(start) = req.start_date {
        task.start_date = Some(start);
    }
    if let Some(end) = req.end_date {
        task.end_date = Some(end);
    }
    if let Some(board_id) = req.board_id {
        task.board_id = Some(board_id);
    }
    task.updated_at = Utc::now();
    Ok(Json(task.clone()))
}

async fn delete_task(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<TaskId>,
) -> std::result::Result<StatusCode, Response> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    state.task_mut(id)?;
    state.tasks.retain(|t| t.id != id);
    Ok(StatusCode::NO_CONTENT)
}

async fn add_collaborator(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<TaskId>,
    Json(req): Json<UserRefRequest>,
) -> Reply<Value> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    let user = state
        .user(req.user_id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "User not found."))?;
    let task = state.task_mut(id)?;
    if !task.collaborators.iter().any(|c| c.id == user.id) {
        task.collaborators.push(user);
    }
    Ok(Json(json!({ "status": "collaborator added" })))
}

async fn remove_collaborator(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Path(id): Path<TaskId>,
    Json(req): Json<UserRefRequest>,
) -> Reply<Value> {
    authenticate(&backend, &headers)?;
    let mut state = backend.state();
    let task = state.task_mut(id)?;
    task.collaborators.retain(|c| c.id != req.user_id);
    Ok(Json(json!({ "status": "collaborator removed" })))
}

#[derive(Deserialize)]
struct CalendarParams {
    start_date: Option<String>,
    end_date: Option<String>,
}

async fn calendar_tasks(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Query(params): Query<CalendarParams>,
) -> Reply<Vec<Task>> {
    authenticate(&backend, &headers)?;
    let state = backend.state();
    Ok(Json(
        state
            .tasks
            .iter()
            .filter(|t| t.start_date.is_some() || t.end_date.is_some())
            .filter(|t| match (&params.start_date, &t.end_date) {
                (Some(from), Some(end)) => end >= from,
                _ => true,
            })
            .filter(|t| match (&params.end_date, &t.start_date) {
                (Some(to), Some(start)) => start <= to,
                _ => true,
            })
            .cloned()
            .collect(),
    ))
}

async fn upcoming_tasks(State(backend): State<FakeBackend>, headers: HeaderMap) -> Reply<Vec<Task>> {
    authenticate(&backend, &headers)?;
    let state = backend.state();
    let mut upcoming: Vec<Task> = state
        .tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Done && t.end_date.is_some())
        .cloned()
        .collect();
    upcoming.sort_by(|a, b| a.end_date.cmp(&b.end_date));
    Ok(Json(upcoming))
}
