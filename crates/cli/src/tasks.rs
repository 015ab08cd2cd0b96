use anyhow::{Context, Result};
use taskboard_api::{BoardId, CalendarQuery, CreateTaskRequest, Priority, TaskId, TaskStatus};
use taskboard_core::{notice, BoardView, ClientError, TaskFilter};

use crate::connect::connect;
use crate::output::{drain_notices, print_columns, print_tasks, task_line, OutputFormat};

pub async fn run_list(
    status: Option<TaskStatus>,
    priority: Option<Priority>,
    format: OutputFormat,
) -> Result<()> {
    let filter = TaskFilter { status, priority };
    let mut tasks = connect()?
        .list_tasks()
        .await
        .context("Failed to load tasks")?;
    tasks.retain(|t| filter.matches(t));
    print_tasks(&tasks, format)
}

pub struct CreateArgs {
    pub board: BoardId,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

pub async fn run_create(args: CreateArgs) -> Result<()> {
    let (notifier, mut rx) = notice::channel();
    let result = async {
        let view = BoardView::load(connect()?, args.board, notifier).await?;
        let task = view
            .create_task(CreateTaskRequest {
                title: args.title,
                description: args.description,
                priority: args.priority,
                start_date: args.start_date,
                end_date: args.end_date,
                ..CreateTaskRequest::default()
            })
            .await?;
        anyhow::Ok(task)
    }
    .await;
    drain_notices(&mut rx);
    println!("{}", task_line(&result?));
    Ok(())
}

/// Move a task to another column through the board view, then print the
/// board as it now stands (rolled back if the server refused).
///
/// Without `status` the task moves one column to the right.
pub async fn run_move(board_id: BoardId, task_id: TaskId, status: Option<TaskStatus>) -> Result<()> {
    let (notifier, mut rx) = notice::channel();
    let view = BoardView::load(connect()?, board_id, notifier).await;
    drain_notices(&mut rx);
    let view = view?;

    let status = match status {
        Some(status) => status,
        None => view
            .task(task_id)
            .map(|t| t.status.forward())
            .ok_or(ClientError::UnknownTask(task_id))?,
    };
    let moved = view.move_task(task_id, status).await;
    drain_notices(&mut rx);
    print_columns(view.board(), &view.columns(&TaskFilter::default()));
    if moved?.is_none() {
        println!("Task #{task_id} is already in {}.", status.title());
    }
    Ok(())
}

pub async fn run_delete(task_id: TaskId) -> Result<()> {
    connect()?
        .delete_task(task_id)
        .await
        .context("Failed to delete task")?;
    println!("Task #{task_id} deleted.");
    Ok(())
}

pub async fn run_calendar(
    start_date: Option<String>,
    end_date: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let query = CalendarQuery {
        start_date,
        end_date,
    };
    let tasks = connect()?
        .calendar_tasks(&query)
        .await
        .context("Failed to load calendar")?;
    print_tasks(&tasks, format)
}

pub async fn run_upcoming(format: OutputFormat) -> Result<()> {
    let tasks = connect()?
        .upcoming_tasks()
        .await
        .context("Failed to load upcoming tasks")?;
    print_tasks(&tasks, format)
}
