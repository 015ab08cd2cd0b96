use anyhow::{Context, Result};
use taskboard_api::{
    BoardId, CreateBoardRequest, InviteRequest, InviteRole, Priority, TaskStatus,
    UpdateBoardRequest,
};
use taskboard_core::{notice, BoardView, TaskFilter};

use crate::connect::connect;
use crate::output::{board_line, drain_notices, print_boards, print_columns, print_json, OutputFormat};

pub async fn run_list(filter: Option<&str>, format: OutputFormat) -> Result<()> {
    let mut boards = connect()?
        .list_boards()
        .await
        .context("Failed to load boards")?;
    if let Some(needle) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        let needle = needle.to_lowercase();
        boards.retain(|b| b.name.to_lowercase().contains(&needle));
    }
    print_boards(&boards, format)
}

pub async fn run_show(
    board_id: BoardId,
    status: Option<TaskStatus>,
    priority: Option<Priority>,
    format: OutputFormat,
) -> Result<()> {
    let (notifier, mut rx) = notice::channel();
    let view = BoardView::load(connect()?, board_id, notifier).await;
    drain_notices(&mut rx);
    let view = view?;

    let filter = TaskFilter { status, priority };
    let columns = view.columns(&filter);
    match format {
        OutputFormat::Json => {
            let tasks: Vec<_> = columns.into_iter().flat_map(|c| c.tasks).collect();
            print_json(&serde_json::json!({ "board": view.board(), "tasks": tasks }))
        }
        OutputFormat::Text => {
            print_columns(view.board(), &columns);
            Ok(())
        }
    }
}

pub async fn run_create(name: &str) -> Result<()> {
    let board = connect()?
        .create_board(&CreateBoardRequest {
            name: name.to_string(),
        })
        .await
        .context("Failed to create board")?;
    println!("Board created successfully!");
    println!("{}", board_line(&board));
    Ok(())
}

pub async fn run_rename(board_id: BoardId, name: &str) -> Result<()> {
    let board = connect()?
        .update_board(
            board_id,
            &UpdateBoardRequest {
                name: Some(name.to_string()),
            },
        )
        .await
        .context("Failed to rename board")?;
    println!("{}", board_line(&board));
    Ok(())
}

pub async fn run_delete(board_id: BoardId) -> Result<()> {
    connect()?
        .delete_board(board_id)
        .await
        .context("Failed to delete board")?;
    println!("Board #{board_id} deleted.");
    Ok(())
}

/// Add an existing user to the board by email, or with `send_email` leave
/// a pending invitation for the address instead.
pub async fn run_invite(
    board_id: BoardId,
    email: &str,
    role: InviteRole,
    send_email: bool,
) -> Result<()> {
    let api = connect()?;
    if send_email {
        api.invite_user(&InviteRequest {
            board_id,
            invitee_email: email.to_string(),
            role,
        })
        .await
        .context("Failed to send invitation")?;
        println!("Invitation sent to {email}.");
        return Ok(());
    }

    let (notifier, mut rx) = notice::channel();
    let result = async {
        let mut view = BoardView::load(api, board_id, notifier).await?;
        view.invite_by_email(email, role).await
    }
    .await;
    drain_notices(&mut rx);
    result?;
    Ok(())
}
