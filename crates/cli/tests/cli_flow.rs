use std::path::Path;
use std::process::{Command, Output};

use taskboard_api::TaskStatus;
use taskboard_api_client::testing::FakeBackend;

fn run_cli(config_dir: &Path, server: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_taskboard"))
        .args(args)
        .env("TASKBOARD_CONFIG_DIR", config_dir)
        .env("TASKBOARD_SERVER_URL", server)
        .env_remove("RUST_LOG")
        .output()
        .expect("run taskboard")
}

async fn run(config_dir: &Path, server: &str, args: &[&str]) -> Output {
    let config_dir = config_dir.to_path_buf();
    let server = server.to_string();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_cli(&config_dir, &server, &args)
    })
    .await
    .expect("join cli")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[tokio::test(flavor = "multi_thread")]
async fn login_persists_tokens_for_later_commands() {
    let backend = FakeBackend::new();
    let url = backend.spawn().await;
    let home = tempfile::tempdir().expect("tempdir");

    let login = run(home.path(), &url, &["login", "alice", "--password", "x"]).await;
    assert!(login.status.success(), "stderr: {}", stderr(&login));
    assert!(stdout(&login).contains("Signed in as alice"));

    let creds = std::fs::read_to_string(home.path().join("credentials.json")).expect("creds");
    assert!(creds.contains("\"accessToken\""));
    assert!(creds.contains("\"refreshToken\""));

    let whoami = run(home.path(), &url, &["whoami"]).await;
    assert!(whoami.status.success(), "stderr: {}", stderr(&whoami));
    assert!(stdout(&whoami).contains("alice@example.com"));
    assert_eq!(
        backend.authorizations("GET", "/api/auth/me/").last().cloned().flatten(),
        Some("Bearer A1".to_string())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_move_prints_rolled_back_board() {
    let backend = FakeBackend::new();
    let url = backend.spawn().await;
    let home = tempfile::tempdir().expect("tempdir");
    let board = backend.seed_board("Launch", 1);
    let task = backend.seed_task("Write docs", TaskStatus::Todo, Some(board.id));

    let login = run(home.path(), &url, &["login", "alice", "--password", "x"]).await;
    assert!(login.status.success(), "stderr: {}", stderr(&login));

    backend.set_fail_task_updates(true);
    let board_arg = board.id.to_string();
    let task_arg = task.id.to_string();
    let moved = run(
        home.path(),
        &url,
        &["tasks", "move", &board_arg, &task_arg, "done"],
    )
    .await;

    assert!(!moved.status.success());
    let err = stderr(&moved);
    assert!(err.contains("[error] Error: Failed to update task status. Please try again."));
    let out = stdout(&moved);
    assert!(out.contains("To Do (1)"), "stdout: {out}");
    assert!(out.contains("Done (0)"), "stdout: {out}");
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_session_prints_login_hint() {
    let backend = FakeBackend::new();
    let url = backend.spawn().await;
    let home = tempfile::tempdir().expect("tempdir");

    let login = run(home.path(), &url, &["login", "alice", "--password", "x"]).await;
    assert!(login.status.success(), "stderr: {}", stderr(&login));

    backend.expire_access_tokens();
    backend.set_reject_refresh(true);
    let list = run(home.path(), &url, &["boards", "list"]).await;

    assert!(!list.status.success());
    assert!(stderr(&list).contains("Run `taskboard login`"));
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn config_set_writes_file_without_env_override() {
    let home = tempfile::tempdir().expect("tempdir");

    let set = run(
        home.path(),
        "http://ignored.example.com/api",
        &["config", "--timeout", "12", "--storage", "memory"],
    )
    .await;
    assert!(set.status.success(), "stderr: {}", stderr(&set));

    let written = std::fs::read_to_string(home.path().join("taskboard.toml")).expect("config");
    assert!(written.contains("timeout_secs = 12"));
    assert!(written.contains("credentials = \"memory\""));
    assert!(!written.contains("ignored.example.com"));
}
