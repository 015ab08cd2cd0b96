use anyhow::Result;
use serde::Serialize;
use taskboard_api::{Board, Task, UserProfile};
use taskboard_core::{Column, Notice, NoticeLevel};
use tokio::sync::mpsc::UnboundedReceiver;

/// Output format for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn notice_line(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Success => "ok",
        NoticeLevel::Error => "error",
        NoticeLevel::Info => "info",
    };
    format!("[{tag}] {notice}")
}

/// Print every queued notice to stderr.
pub fn drain_notices(rx: &mut UnboundedReceiver<Notice>) {
    while let Ok(notice) = rx.try_recv() {
        eprintln!("{}", notice_line(&notice));
    }
}

pub fn task_line(task: &Task) -> String {
    let mut line = format!(
        "#{:<5} {:<12} {:<7} {}",
        task.id,
        task.status.as_str(),
        task.priority.as_str(),
        task.title
    );
    if let Some(ref end) = task.end_date {
        line.push_str(&format!("  (due {end})"));
    }
    if let Some(ref board) = task.board_name {
        line.push_str(&format!("  [{board}]"));
    }
    line
}

pub fn print_tasks(tasks: &[Task], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(tasks),
        OutputFormat::Text => {
            if tasks.is_empty() {
                println!("No tasks.");
            }
            for task in tasks {
                println!("{}", task_line(task));
            }
            Ok(())
        }
    }
}

pub fn board_line(board: &Board) -> String {
    format!(
        "#{:<5} {:<30} owner {:<12} {} members, {} tasks",
        board.id, board.name, board.owner.username, board.members_count, board.task_count
    )
}

pub fn print_boards(boards: &[Board], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(boards),
        OutputFormat::Text => {
            if boards.is_empty() {
                println!("No boards.");
            }
            for board in boards {
                println!("{}", board_line(board));
            }
            Ok(())
        }
    }
}

pub fn user_line(user: &UserProfile) -> String {
    format!(
        "#{:<5} {:<16} {:<28} {}",
        user.id,
        user.username,
        user.email,
        user.display_name()
    )
}

pub fn print_columns(board: &Board, columns: &[Column]) {
    println!("{} (#{})", board.name, board.id);
    println!("{}", "─".repeat(50));
    for column in columns {
        println!("{} ({})", column.status.title(), column.tasks.len());
        for task in &column.tasks {
            println!("  #{:<5} {:<7} {}", task.id, task.priority.as_str(), task.title);
        }
    }
    println!();
    println!("Members:");
    for member in &board.members {
        println!("  {:<16} {}", member.user.username, member.role);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_lines_carry_level_tag() {
        let notice = Notice {
            level: NoticeLevel::Error,
            title: "Error".into(),
            description: Some("Failed to update task status. Please try again.".into()),
        };
        assert_eq!(
            notice_line(&notice),
            "[error] Error: Failed to update task status. Please try again."
        );
    }
}
