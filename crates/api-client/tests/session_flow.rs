use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{Json, Router, http::StatusCode, routing::{get, post}};
use serde_json::json;

use taskboard_api_client::ApiClient;
use taskboard_api_client::taskboard_api::*;
use taskboard_api_client::taskboard_local_store::{
    CredentialStore, MemoryCredentialStore, StoredCredentials,
};
use taskboard_api_client::testing::FakeBackend;

struct Harness {
    backend: FakeBackend,
    store: Arc<MemoryCredentialStore>,
    api: ApiClient,
}

async fn harness() -> Harness {
    let backend = FakeBackend::new();
    let base_url = backend.spawn().await;
    let store = Arc::new(MemoryCredentialStore::new());
    let api = ApiClient::new(&base_url, Duration::from_secs(5), store.clone())
        .expect("build client");
    Harness {
        backend,
        store,
        api,
    }
}

async fn login_alice(h: &Harness) {
    let tokens = h
        .api
        .login(&LoginRequest {
            username: "alice".into(),
            password: "x".into(),
        })
        .await
        .expect("login");
    assert_eq!(
        tokens,
        TokenPairResponse {
            access: "A1".into(),
            refresh: "R1".into(),
        }
    );
}

#[tokio::test]
async fn login_attaches_bearer_to_later_requests() {
    let h = harness().await;
    login_alice(&h).await;

    h.api.list_tasks().await.expect("list tasks");

    assert_eq!(
        h.backend.authorizations("GET", "/api/tasks/"),
        vec![Some("Bearer A1".to_string())]
    );
    assert_eq!(h.backend.authorizations("POST", "/api/auth/login/"), vec![None]);
    let stored = h.store.read().expect("read store");
    assert_eq!(stored.access_token.as_deref(), Some("A1"));
    assert_eq!(stored.refresh_token.as_deref(), Some("R1"));
}

#[tokio::test]
async fn expired_access_token_is_refreshed_and_request_retried() {
    let h = harness().await;
    login_alice(&h).await;
    let seeded = h.backend.seed_task("Write docs", TaskStatus::Todo, None);
    h.backend.expire_access_tokens();

    let tasks = h.api.list_tasks().await.expect("list after refresh");

    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, seeded.id);
    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(
        h.backend.authorizations("GET", "/api/tasks/"),
        vec![Some("Bearer A1".to_string()), Some("Bearer A2".to_string())]
    );
    // The refresh exchange itself carries no access token.
    assert_eq!(
        h.backend.authorizations("POST", "/api/auth/token/refresh/"),
        vec![None]
    );
    assert_eq!(h.store.access_token().expect("read").as_deref(), Some("A2"));
    assert_eq!(h.store.refresh_token().expect("read").as_deref(), Some("R1"));

    // Later requests pick up the refreshed token without another exchange.
    h.api.list_boards().await.expect("list boards");
    assert_eq!(
        h.backend.authorizations("GET", "/api/boards/"),
        vec![Some("Bearer A2".to_string())]
    );
    assert_eq!(h.backend.refresh_calls(), 1);
}

#[tokio::test]
async fn rejected_refresh_clears_tokens_and_expires_session() {
    let h = harness().await;
    login_alice(&h).await;
    h.backend.expire_access_tokens();
    h.backend.set_reject_refresh(true);

    let err = h.api.list_tasks().await.unwrap_err();

    assert!(err.is_session_expired());
    assert_eq!(err.redirect(), Some("/login"));
    assert!(h.store.read().expect("read").is_empty());
    assert_eq!(h.backend.refresh_calls(), 1);
    // The original request is not re-issued.
    assert_eq!(h.backend.authorizations("GET", "/api/tasks/").len(), 1);
}

#[tokio::test]
async fn missing_refresh_token_expires_without_exchange() {
    let h = harness().await;
    h.store
        .write(&StoredCredentials {
            access_token: Some("stale".into()),
            refresh_token: None,
        })
        .expect("seed store");

    let err = h.api.me().await.unwrap_err();

    assert!(err.is_session_expired());
    assert_eq!(h.backend.refresh_calls(), 0);
    assert_eq!(
        h.backend.authorizations("GET", "/api/auth/me/"),
        vec![Some("Bearer stale".to_string())]
    );
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let h = harness().await;
    login_alice(&h).await;
    h.backend.expire_access_tokens();
    h.backend.set_refresh_delay(Duration::from_millis(50));

    let (tasks, boards, me) = tokio::join!(h.api.list_tasks(), h.api.list_boards(), h.api.me());

    tasks.expect("tasks");
    boards.expect("boards");
    assert_eq!(me.expect("me").username, "alice");
    assert_eq!(h.backend.refresh_calls(), 1);
    for (method, path) in [("GET", "/api/tasks/"), ("GET", "/api/boards/"), ("GET", "/api/auth/me/")] {
        let auths = h.backend.authorizations(method, path);
        assert_eq!(auths.len(), 2, "{path} sent once and retried once");
        assert_eq!(auths[1].as_deref(), Some("Bearer A2"));
    }
}

#[tokio::test]
async fn wrong_password_is_a_plain_error_not_a_refresh() {
    let h = harness().await;

    let err = h
        .api
        .login(&LoginRequest {
            username: "alice".into(),
            password: "nope".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(reqwest::StatusCode::UNAUTHORIZED));
    assert_eq!(
        err.to_string(),
        "401 Unauthorized: No active account found with the given credentials"
    );
    assert!(!err.is_session_expired());
    assert_eq!(h.backend.refresh_calls(), 0);
    assert!(h.store.read().expect("read").is_empty());
}

#[tokio::test]
async fn logout_drops_both_tokens() {
    let h = harness().await;
    login_alice(&h).await;
    assert!(h.api.session().is_authenticated().expect("read"));

    h.api.logout().expect("logout");

    assert!(!h.api.session().is_authenticated().expect("read"));
    assert!(!h.api.session().has_refresh_token().expect("read"));
}

#[tokio::test]
async fn non_auth_errors_pass_through_unchanged() {
    let h = harness().await;
    login_alice(&h).await;

    let err = h.api.get_task(9_999).await.unwrap_err();

    assert_eq!(err.status(), Some(reqwest::StatusCode::NOT_FOUND));
    assert_eq!(err.to_string(), "404 Not Found: Not found.");
    assert_eq!(h.backend.refresh_calls(), 0);
}

#[tokio::test]
async fn board_and_task_endpoints_round_trip() {
    let h = harness().await;
    login_alice(&h).await;

    let board = h
        .api
        .create_board(&CreateBoardRequest {
            name: "Launch".into(),
        })
        .await
        .expect("create board");
    assert!(board.is_owner(1));

    let task = h
        .api
        .create_task(&CreateTaskRequest {
            title: "Press kit".into(),
            priority: Some(Priority::High),
            status: Some(TaskStatus::Todo),
            end_date: Some("2024-06-01".into()),
            ..CreateTaskRequest::default()
        })
        .await
        .expect("create task");
    assert_eq!(task.priority, Priority::High);

    h.api
        .add_task_to_board(board.id, task.id)
        .await
        .expect("add task");
    let on_board = h.api.board_tasks(board.id).await.expect("board tasks");
    assert_eq!(on_board.len(), 1);
    assert_eq!(on_board[0].board_name.as_deref(), Some("Launch"));

    let updated = h
        .api
        .update_task(task.id, &UpdateTaskRequest::status(TaskStatus::Done))
        .await
        .expect("update");
    assert_eq!(updated.status, TaskStatus::Done);

    let renamed = h
        .api
        .update_board(
            board.id,
            &UpdateBoardRequest {
                name: Some("Launch v2".into()),
            },
        )
        .await
        .expect("rename");
    assert_eq!(renamed.name, "Launch v2");

    h.api.delete_task(task.id).await.expect("delete task");
    assert!(h.backend.task(task.id).is_none());
    h.api.delete_board(board.id).await.expect("delete board");
    assert!(h.backend.board(board.id).is_none());
}

#[tokio::test]
async fn membership_collaborators_and_invitations() {
    let h = harness().await;
    login_alice(&h).await;
    let board = h.backend.seed_board("Ops", 1);
    let task = h.backend.seed_task("Rotate keys", TaskStatus::InProgress, Some(board.id));

    let found = h.api.search_users("bob@example").await.expect("search");
    assert_eq!(found.len(), 1);
    assert_eq!(
        h.backend.authorizations("GET", "/api/auth/search/?q=bob%40example").len(),
        1
    );

    h.api
        .add_member(board.id, found[0].id, InviteRole::Admin)
        .await
        .expect("add member");
    let reloaded = h.api.get_board(board.id).await.expect("get board");
    assert!(reloaded.is_admin(found[0].id));

    h.api
        .remove_member(board.id, found[0].id)
        .await
        .expect("remove member");
    assert!(!h.api.get_board(board.id).await.expect("get").is_member(2));

    h.api
        .add_collaborator(task.id, 2)
        .await
        .expect("add collaborator");
    assert_eq!(h.api.get_task(task.id).await.expect("task").collaborators.len(), 1);
    h.api
        .remove_collaborator(task.id, 2)
        .await
        .expect("remove collaborator");
    assert!(h.api.get_task(task.id).await.expect("task").collaborators.is_empty());

    h.api
        .invite_user(&InviteRequest {
            board_id: board.id,
            invitee_email: "carol@example.com".into(),
            role: InviteRole::Member,
        })
        .await
        .expect("invite");
    let invitations = h.backend.invitations();
    assert_eq!(invitations.len(), 1);
    assert_eq!(invitations[0]["invitee_email"], "carol@example.com");
    assert_eq!(invitations[0]["role"], "member");
}

#[tokio::test]
async fn calendar_and_upcoming_queries() {
    let h = harness().await;
    login_alice(&h).await;
    let may = h.backend.seed_task("May", TaskStatus::Todo, None);
    h.backend.edit_task(may.id, |t| {
        t.start_date = Some("2024-05-02".into());
        t.end_date = Some("2024-05-10".into());
    });
    let july = h.backend.seed_task("July", TaskStatus::Todo, None);
    h.backend.edit_task(july.id, |t| {
        t.start_date = Some("2024-07-01".into());
        t.end_date = Some("2024-07-03".into());
    });

    let window = h
        .api
        .calendar_tasks(&CalendarQuery {
            start_date: Some("2024-05-01".into()),
            end_date: Some("2024-05-31".into()),
        })
        .await
        .expect("calendar");
    assert_eq!(window.iter().map(|t| t.id).collect::<Vec<_>>(), vec![may.id]);

    let upcoming = h.api.upcoming_tasks().await.expect("upcoming");
    assert_eq!(
        upcoming.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![may.id, july.id]
    );
}

#[tokio::test]
async fn register_and_profile_updates() {
    let h = harness().await;
    let created = h
        .api
        .register(&RegisterRequest {
            username: "carol".into(),
            email: "carol@example.com".into(),
            password: "s3cret".into(),
            password_confirm: "s3cret".into(),
            first_name: "Carol".into(),
            last_name: "Danvers".into(),
        })
        .await
        .expect("register");
    assert_eq!(created.username, "carol");

    let dup = h
        .api
        .register(&RegisterRequest {
            username: "carol".into(),
            email: "other@example.com".into(),
            password: "a".into(),
            password_confirm: "a".into(),
            first_name: String::new(),
            last_name: String::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(
        dup.to_string(),
        "400 Bad Request: A user with that username already exists."
    );

    h.api
        .login(&LoginRequest {
            username: "carol".into(),
            password: "s3cret".into(),
        })
        .await
        .expect("login");
    let updated = h
        .api
        .update_profile(&ProfileUpdate {
            first_name: Some("Captain".into()),
            ..ProfileUpdate::default()
        })
        .await
        .expect("update profile");
    assert_eq!(updated.display_name(), "Captain Danvers");

    h.api
        .change_password(&ChangePasswordRequest {
            old_password: "s3cret".into(),
            new_password: "n3w".into(),
            confirm_password: "n3w".into(),
        })
        .await
        .expect("change password");
}

#[tokio::test]
async fn a_request_is_retried_at_most_once() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let hits = Arc::new(AtomicUsize::new(0));
    let app = {
        let refreshes = refreshes.clone();
        let hits = hits.clone();
        Router::new()
            .route(
                "/api/tasks/",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({ "detail": "Token revoked" })),
                        )
                    }
                }),
            )
            .route(
                "/api/auth/token/refresh/",
                post(move || {
                    let refreshes = refreshes.clone();
                    async move {
                        let n = refreshes.fetch_add(1, Ordering::SeqCst) + 2;
                        Json(json!({ "access": format!("A{n}") }))
                    }
                }),
            )
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    let store = Arc::new(MemoryCredentialStore::new());
    store
        .write(&StoredCredentials {
            access_token: Some("A1".into()),
            refresh_token: Some("R1".into()),
        })
        .expect("seed");
    let api = ApiClient::new(
        &format!("http://{addr}/api"),
        Duration::from_secs(5),
        store.clone(),
    )
    .expect("client");

    let err = api.list_tasks().await.unwrap_err();

    assert_eq!(err.to_string(), "unauthorized: Token revoked");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    // The refreshed token is kept; only a failed refresh clears the store.
    assert_eq!(store.access_token().expect("read").as_deref(), Some("A2"));
}

#[tokio::test]
async fn unreachable_server_is_a_network_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let api = ApiClient::new(
        &format!("http://{addr}/api"),
        Duration::from_secs(2),
        Arc::new(MemoryCredentialStore::new()),
    )
    .expect("client");

    let err = api.list_boards().await.unwrap_err();
    assert!(matches!(err, taskboard_api_client::ApiError::Network(_)));
    assert!(err.is_transient());
}
