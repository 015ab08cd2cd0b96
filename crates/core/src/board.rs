//! State behind the board screen: one board, its tasks laid out in status
//! columns, and the edits the screen offers. Task status changes go through
//! the optimistic store so the new column shows before the server answers.

use tokio::sync::watch;
use tracing::{info, warn};

use taskboard_api::{
    Board, BoardId, CreateTaskRequest, InviteRole, Priority, Task, TaskId, TaskStatus,
    UpdateTaskRequest, UserId, UserProfile,
};
use taskboard_api_client::{ApiClient, ApiError};

use crate::error::{ClientError, Result};
use crate::notice::Notifier;
use crate::optimistic::{MutationError, MutationOutcome, OptimisticStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|s| task.status == s)
            && self.priority.is_none_or(|p| task.priority == p)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
}

pub struct BoardView {
    api: ApiClient,
    board: Board,
    tasks: OptimisticStore<Task>,
    notifier: Notifier,
}

async fn fetch(api: &ApiClient, board_id: BoardId) -> std::result::Result<(Board, Vec<Task>), ApiError> {
    tokio::try_join!(api.get_board(board_id), api.board_tasks(board_id))
}

impl BoardView {
    pub async fn load(api: ApiClient, board_id: BoardId, notifier: Notifier) -> Result<Self> {
        let (board, tasks) = match fetch(&api, board_id).await {
            Ok(loaded) => loaded,
            Err(e) => return Err(report(&notifier, e, "Failed to load board data. Please try again.")),
        };
        info!(board_id, tasks = tasks.len(), "board loaded");
        Ok(Self {
            api,
            board,
            tasks: OptimisticStore::new(tasks),
            notifier,
        })
    }

    /// Fetch the board and its tasks again. Results of moves still in
    /// flight are dropped.
    pub async fn reload(&mut self) -> Result<()> {
        let (board, tasks) = match fetch(&self.api, self.board.id).await {
            Ok(loaded) => loaded,
            Err(e) => {
                return Err(report(
                    &self.notifier,
                    e,
                    "Failed to load board data. Please try again.",
                ));
            }
        };
        self.board = board;
        self.tasks.reset(tasks);
        Ok(())
    }

    /// Stop applying results to this view. In-flight calls still complete
    /// on the server.
    pub fn close(&self) {
        self.tasks.invalidate();
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.snapshot()
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.tasks.get(&id)
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.tasks.subscribe()
    }

    /// One column per status, in board order, holding the tasks that pass
    /// `filter`.
    pub fn columns(&self, filter: &TaskFilter) -> Vec<Column> {
        let tasks = self.tasks.snapshot();
        TaskStatus::ALL
            .iter()
            .map(|&status| Column {
                status,
                tasks: tasks
                    .iter()
                    .filter(|t| t.status == status && filter.matches(t))
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        self.board.is_owner(user_id)
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.board.is_admin(user_id)
    }

    /// Move a task to another column. Returns the confirmed task, or `None`
    /// when it already sits in that column or the view was closed before the
    /// server answered.
    pub async fn move_task(&self, task_id: TaskId, status: TaskStatus) -> Result<Option<Task>> {
        let current = self
            .tasks
            .get(&task_id)
            .ok_or(ClientError::UnknownTask(task_id))?;
        if current.status == status {
            return Ok(None);
        }

        let api = &self.api;
        let outcome = self
            .tasks
            .apply_optimistic(
                &task_id,
                |task| task.status = status,
                || async move {
                    api.update_task(task_id, &UpdateTaskRequest::status(status))
                        .await
                        .map(Some)
                },
            )
            .await;

        match outcome {
            Ok(MutationOutcome::Confirmed(task)) => {
                self.notifier
                    .success("Task updated", "Task status has been updated successfully.");
                Ok(Some(task))
            }
            Ok(MutationOutcome::Discarded) => Ok(None),
            Err(e @ MutationError::RemoteMutationFailed { .. }) => {
                warn!(task_id, "status change rolled back: {e}");
                self.notifier
                    .error("Error", "Failed to update task status. Please try again.");
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create a task in the `todo` column and attach it to this board.
    pub async fn create_task(&self, mut req: CreateTaskRequest) -> Result<Task> {
        req.status = Some(TaskStatus::Todo);
        let created = async {
            let mut task = self.api.create_task(&req).await?;
            self.api.add_task_to_board(self.board.id, task.id).await?;
            task.board_id = Some(self.board.id);
            task.board_name = Some(self.board.name.clone());
            Ok::<_, ApiError>(task)
        }
        .await;

        match created {
            Ok(task) => {
                self.tasks.upsert(task.clone());
                self.notifier
                    .success("Task created", "New task has been created successfully.");
                Ok(task)
            }
            Err(e) => Err(report(
                &self.notifier,
                e,
                "Failed to create task. Please try again.",
            )),
        }
    }

    /// Add the first user matching `email` to the board, then refresh the
    /// member list.
    pub async fn invite_by_email(&mut self, email: &str, role: InviteRole) -> Result<UserProfile> {
        let found = match self.api.search_users(email).await {
            Ok(users) => users,
            Err(e) => return Err(self.invite_failed(e)),
        };
        let Some(user) = found.into_iter().next() else {
            self.notifier
                .error("User not found", format!("No user found with email {email}"));
            return Err(ClientError::UserNotFound(email.to_string()));
        };
        if self.board.is_member(user.id) {
            self.notifier.error(
                "Already a member",
                format!("{} is already a member of this board", user.username),
            );
            return Err(ClientError::AlreadyMember(user.username));
        }

        let added = async {
            self.api.add_member(self.board.id, user.id, role).await?;
            self.api.get_board(self.board.id).await
        }
        .await;
        match added {
            Ok(board) => self.board = board,
            Err(e) => return Err(self.invite_failed(e)),
        }

        info!(board_id = self.board.id, user_id = user.id, role = role.as_str(), "member added");
        self.notifier.success(
            "User invited",
            format!("{} has been added to the board", user.username),
        );
        Ok(user)
    }

    fn invite_failed(&self, e: ApiError) -> ClientError {
        report(&self.notifier, e, "Failed to invite user. Please try again.")
    }
}

/// Surface a failed call as an error notice. An expired session is left to
/// the caller, which navigates instead.
fn report(notifier: &Notifier, e: ApiError, description: &str) -> ClientError {
    if !e.is_session_expired() {
        warn!("{e}");
        notifier.error("Error", description);
    }
    e.into()
}
