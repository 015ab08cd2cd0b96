mod account;
mod boards;
mod config;
mod connect;
mod output;
mod tasks;

use clap::{CommandFactory, Parser, Subcommand};
use taskboard_api::{BoardId, InviteRole, Priority, TaskId, TaskStatus};
use taskboard_api_client::ApiError;
use taskboard_core::ClientError;

use crate::config::StorageArg;
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "taskboard", version, about = "Manage taskboard boards and tasks from the terminal")]
struct Cli {
    /// Output format for listings
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the token pair
    Login {
        username: String,
        /// Read from a prompt when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and sign in
    Register {
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored tokens
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Look up users
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Manage boards
    Boards {
        #[command(subcommand)]
        action: BoardsAction,
    },

    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        action: TasksAction,
    },

    /// Add a user to a board by email
    Invite {
        board: BoardId,
        email: String,
        #[arg(long, default_value = "member")]
        role: InviteRole,
        /// Send an email invitation instead of adding an existing user
        #[arg(long)]
        send_email: bool,
    },

    /// Show or set configuration
    Config {
        /// Set the server URL (including the `/api` prefix)
        #[arg(long)]
        server: Option<String>,

        /// Set the request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Where to keep the token pair
        #[arg(long, value_enum)]
        storage: Option<StorageArg>,
    },

    /// Print shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    /// Search by username or email
    Search { query: String },
}

#[derive(Subcommand)]
enum BoardsAction {
    /// List boards you belong to
    List {
        /// Case-insensitive name filter
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show a board with its task columns
    Show {
        id: BoardId,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// Create a board
    Create { name: String },
    /// Rename a board
    Rename { id: BoardId, name: String },
    /// Delete a board
    Delete { id: BoardId },
}

#[derive(Subcommand)]
enum TasksAction {
    /// List all tasks visible to you
    List {
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// Create a task on a board (starts in `todo`)
    Create {
        #[arg(long)]
        board: BoardId,
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Move a task to another column (the next one when omitted)
    Move {
        board: BoardId,
        task: TaskId,
        status: Option<TaskStatus>,
    },
    /// Delete a task
    Delete { id: TaskId },
    /// Tasks in a date window
    Calendar {
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Tasks due soon
    Upcoming,
}

fn session_expired(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ClientError>()
            .is_some_and(ClientError::is_session_expired)
            || cause
                .downcast_ref::<ApiError>()
                .is_some_and(ApiError::is_session_expired)
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    let result = match cli.command {
        Commands::Login { username, password } => account::run_login(&username, password).await,
        Commands::Register {
            username,
            email,
            first_name,
            last_name,
            password,
        } => {
            account::run_register(account::RegisterArgs {
                username,
                email,
                first_name,
                last_name,
                password,
            })
            .await
        }
        Commands::Logout => account::run_logout(),
        Commands::Whoami => account::run_whoami(format).await,
        Commands::Users { action } => match action {
            UsersAction::Search { query } => account::run_search(&query, format).await,
        },
        Commands::Boards { action } => match action {
            BoardsAction::List { filter } => boards::run_list(filter.as_deref(), format).await,
            BoardsAction::Show {
                id,
                status,
                priority,
            } => boards::run_show(id, status, priority, format).await,
            BoardsAction::Create { name } => boards::run_create(&name).await,
            BoardsAction::Rename { id, name } => boards::run_rename(id, &name).await,
            BoardsAction::Delete { id } => boards::run_delete(id).await,
        },
        Commands::Tasks { action } => match action {
            TasksAction::List { status, priority } => {
                tasks::run_list(status, priority, format).await
            }
            TasksAction::Create {
                board,
                title,
                description,
                priority,
                start,
                end,
            } => {
                tasks::run_create(tasks::CreateArgs {
                    board,
                    title,
                    description,
                    priority,
                    start_date: start,
                    end_date: end,
                })
                .await
            }
            TasksAction::Move {
                board,
                task,
                status,
            } => tasks::run_move(board, task, status).await,
            TasksAction::Delete { id } => tasks::run_delete(id).await,
            TasksAction::Calendar { start, end } => tasks::run_calendar(start, end, format).await,
            TasksAction::Upcoming => tasks::run_upcoming(format).await,
        },
        Commands::Invite {
            board,
            email,
            role,
            send_email,
        } => boards::run_invite(board, &email, role, send_email).await,
        Commands::Config {
            server,
            timeout,
            storage,
        } => {
            if server.is_none() && timeout.is_none() && storage.is_none() {
                config::show_config()
            } else {
                config::set_config(server, timeout, storage)
            }
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "taskboard", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        if session_expired(&e) {
            eprintln!("Your session has expired. Run `taskboard login` to sign in again.");
        }
        std::process::exit(1);
    }
}
