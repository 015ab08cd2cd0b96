//! Shared request/response types for the taskboard REST API.
//!
//! This crate is the single source of truth for every payload exchanged with
//! the backend. Field names follow the backend's snake_case JSON exactly.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type BoardId = i64;
pub type TaskId = i64;

// ─── Shared Enums ────────────────────────────────────────────────────────────

/// Kanban column a task lives in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "todo")]
    Todo,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "done")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [Self::Todo, Self::InProgress, Self::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in-progress",
            Self::Done => "done",
        }
    }

    /// Column title shown above the tasks in this status.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Todo => "To Do",
            Self::InProgress => "In Progress",
            Self::Done => "Done",
        }
    }

    /// The next column to the right; `Done` stays `Done`.
    pub fn forward(&self) -> Self {
        match self {
            Self::Todo => Self::InProgress,
            Self::InProgress | Self::Done => Self::Done,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(Self::Todo),
            "in-progress" | "in_progress" | "inprogress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(ParseEnumError::new("task status", s)),
        }
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError::new("priority", s)),
        }
    }
}

/// Role of a member within a board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BoardRole {
    Owner,
    Admin,
    Member,
}

impl BoardRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn can_manage(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

impl std::fmt::Display for BoardRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role that can be granted when adding or inviting someone to a board.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InviteRole {
    Admin,
    #[default]
    Member,
}

impl InviteRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }
}

impl std::fmt::Display for InviteRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InviteRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            _ => Err(ParseEnumError::new("role", s)),
        }
    }
}

/// Returned by the `FromStr` impls above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl std::fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

// ─── Auth ────────────────────────────────────────────────────────────────────

/// Username + password login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned on successful login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

/// Refresh token exchange request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Returned by the refresh endpoint. Servers that rotate refresh tokens also
/// send the replacement refresh token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileDetails>,
}

impl UserProfile {
    /// "First Last", falling back to the username when both are blank.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProfileDetails {
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

/// Partial profile update; unset fields are left untouched by the server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileDetails>,
}

// ─── Boards ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoardMember {
    pub id: i64,
    pub user: UserProfile,
    pub role: BoardRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub owner: UserProfile,
    #[serde(default)]
    pub members: Vec<BoardMember>,
    #[serde(default)]
    pub task_count: u32,
    #[serde(default)]
    pub members_count: u32,
}

impl Board {
    pub fn member(&self, user_id: UserId) -> Option<&BoardMember> {
        self.members.iter().find(|m| m.user.id == user_id)
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.member(user_id).is_some()
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.owner.id == user_id
    }

    /// Whether the user may manage membership (owner or admin member).
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.member(user_id).is_some_and(|m| m.role.can_manage())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBoardRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateBoardRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: UserId,
    pub role: InviteRole,
}

/// Body for `remove_member/` and the task collaborator endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRefRequest {
    pub user_id: UserId,
}

/// Body for `add_task/` and `remove_task/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRefRequest {
    pub task_id: TaskId,
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner: UserProfile,
    #[serde(default)]
    pub collaborators: Vec<UserProfile>,
    pub board_id: Option<BoardId>,
    pub board_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<BoardId>,
}

/// Partial task update sent with `PUT /tasks/{id}/`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<BoardId>,
}

impl UpdateTaskRequest {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Date window for `GET /tasks/calendar/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl CalendarQuery {
    /// Encoded query string including the leading `?`, or empty when no
    /// bound is set.
    pub fn to_query_string(&self) -> String {
        let mut params = Vec::new();
        if let Some(ref start) = self.start_date {
            params.push(format!("start_date={}", urlencoding::encode(start)));
        }
        if let Some(ref end) = self.end_date {
            params.push(format!("end_date={}", urlencoding::encode(end)));
        }
        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}

// ─── Invitations ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteRequest {
    pub board_id: BoardId,
    pub invitee_email: String,
    pub role: InviteRole,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Turn an error response body into one human-readable line.
///
/// Field-keyed bodies (`{"username": ["taken"], "detail": "..."}`) are
/// flattened in sorted key order; anything unparseable is returned trimmed.
pub fn flatten_error_body(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    let mut parts = Vec::new();
    collect_messages(&value, &mut parts);
    if parts.is_empty() {
        body.trim().to_string()
    } else {
        parts.join(" ")
    }
}

fn collect_messages(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_messages(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_messages(item, out);
            }
        }
        serde_json::Value::Number(n) => out.push(n.to_string()),
        serde_json::Value::Bool(_) | serde_json::Value::Null => {}
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn task_json(status: &str) -> String {
        format!(
            r#"{{
                "id": 1,
                "title": "Write docs",
                "description": null,
                "priority": "high",
                "status": "{status}",
                "start_date": "2024-05-01",
                "end_date": null,
                "created_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-01T10:00:00+00:00",
                "owner": {user},
                "collaborators": [],
                "board_id": 3,
                "board_name": "Launch"
            }}"#,
            user = fixtures::USER_JSON
        )
    }

    #[test]
    fn task_status_uses_hyphenated_wire_names() {
        let task: Task = serde_json::from_str(&task_json("in-progress")).expect("parse task");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.board_id, Some(3));

        let encoded = serde_json::to_string(&UpdateTaskRequest::status(TaskStatus::InProgress))
            .expect("encode");
        assert_eq!(encoded, r#"{"status":"in-progress"}"#);
    }

    #[test]
    fn forward_moves_one_column_right() {
        assert_eq!(TaskStatus::Todo.forward(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::InProgress.forward(), TaskStatus::Done);
        assert_eq!(TaskStatus::Done.forward(), TaskStatus::Done);
    }

    #[test]
    fn enums_parse_from_cli_spellings() {
        assert_eq!("in_progress".parse::<TaskStatus>(), Ok(TaskStatus::InProgress));
        assert_eq!(" Done ".parse::<TaskStatus>(), Ok(TaskStatus::Done));
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert_eq!("admin".parse::<InviteRole>(), Ok(InviteRole::Admin));

        let err = "blocked".parse::<TaskStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown task status: \"blocked\"");
    }

    #[test]
    fn refresh_response_accepts_optional_rotation() {
        let plain: RefreshResponse = serde_json::from_str(r#"{"access":"A2"}"#).expect("parse");
        assert_eq!(plain.refresh, None);

        let rotated: RefreshResponse =
            serde_json::from_str(r#"{"access":"A2","refresh":"R2"}"#).expect("parse");
        assert_eq!(rotated.refresh.as_deref(), Some("R2"));
    }

    #[test]
    fn create_task_omits_unset_fields() {
        let req = CreateTaskRequest {
            title: "Ship".into(),
            status: Some(TaskStatus::Todo),
            ..CreateTaskRequest::default()
        };
        let value = serde_json::to_value(&req).expect("encode");
        assert_eq!(value, serde_json::json!({"title": "Ship", "status": "todo"}));
    }

    #[test]
    fn calendar_query_encodes_only_present_bounds() {
        assert_eq!(CalendarQuery::default().to_query_string(), "");
        let q = CalendarQuery {
            start_date: Some("2024-05-01".into()),
            end_date: None,
        };
        assert_eq!(q.to_query_string(), "?start_date=2024-05-01");
        let q = CalendarQuery {
            start_date: Some("2024-05-01".into()),
            end_date: Some("2024-05-31 23:59".into()),
        };
        assert_eq!(
            q.to_query_string(),
            "?start_date=2024-05-01&end_date=2024-05-31%2023%3A59"
        );
    }

    #[test]
    fn board_permissions_follow_member_roles() {
        let owner: UserProfile = serde_json::from_str(fixtures::USER_JSON).expect("user");
        let mut helper = owner.clone();
        helper.id = 8;
        helper.username = "bob".into();
        let joined_at = "2024-05-01T10:00:00Z".parse().expect("timestamp");

        let board = Board {
            id: 3,
            name: "Launch".into(),
            created_at: joined_at,
            owner: owner.clone(),
            members: vec![
                BoardMember {
                    id: 1,
                    user: owner.clone(),
                    role: BoardRole::Owner,
                    joined_at,
                },
                BoardMember {
                    id: 2,
                    user: helper.clone(),
                    role: BoardRole::Member,
                    joined_at,
                },
            ],
            task_count: 0,
            members_count: 2,
        };

        assert!(board.is_owner(7));
        assert!(board.is_admin(7));
        assert!(!board.is_owner(8));
        assert!(!board.is_admin(8));
        assert!(board.is_member(8));
        assert!(!board.is_member(9));
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let mut user: UserProfile = serde_json::from_str(fixtures::USER_JSON).expect("user");
        assert_eq!(user.display_name(), "Alice Liddell");
        user.first_name.clear();
        user.last_name = "  ".into();
        assert_eq!(user.display_name(), "alice");
    }

    #[test]
    fn flatten_error_body_joins_field_messages() {
        let body = r#"{"username": ["A user with that username already exists."], "password": ["Too short.", "Too common."]}"#;
        assert_eq!(
            flatten_error_body(body),
            "Too short. Too common. A user with that username already exists."
        );
        assert_eq!(
            flatten_error_body(r#"{"detail": "Not found."}"#),
            "Not found."
        );
        assert_eq!(flatten_error_body("  Bad Gateway \n"), "Bad Gateway");
    }
}
