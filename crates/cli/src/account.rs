use std::io::IsTerminal;

use anyhow::{bail, Context, Result};
use dialoguer::Password;
use taskboard_api::RegisterRequest;
use taskboard_core::AuthState;

use crate::connect::connect;
use crate::output::{print_json, user_line, OutputFormat};

fn resolve_password(given: Option<String>, confirm: bool) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    if !std::io::stdin().is_terminal() {
        bail!("no password given; pass --password or run in a terminal");
    }
    let mut prompt = Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    prompt.interact().context("failed to read password")
}

pub async fn run_login(username: &str, password: Option<String>) -> Result<()> {
    let password = resolve_password(password, false)?;
    let mut auth = AuthState::new(connect()?);
    let user = auth
        .login(username, &password)
        .await
        .context("Login failed")?;
    println!("Signed in as {} ({})", user.username, user.display_name());
    Ok(())
}

pub struct RegisterArgs {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: Option<String>,
}

pub async fn run_register(args: RegisterArgs) -> Result<()> {
    let password = resolve_password(args.password, true)?;
    let req = RegisterRequest {
        username: args.username,
        email: args.email,
        password_confirm: password.clone(),
        password,
        first_name: args.first_name,
        last_name: args.last_name,
    };
    let mut auth = AuthState::new(connect()?);
    let user = auth
        .register(&req)
        .await
        .context("Registration failed")?;
    println!("Account created. Signed in as {}", user.username);
    Ok(())
}

pub fn run_logout() -> Result<()> {
    let mut auth = AuthState::new(connect()?);
    auth.logout()?;
    println!("Signed out.");
    Ok(())
}

pub async fn run_whoami(format: OutputFormat) -> Result<()> {
    let mut auth = AuthState::new(connect()?);
    let Some(user) = auth.restore().await? else {
        bail!("not signed in (run `taskboard login`)");
    };
    match format {
        OutputFormat::Json => print_json(user),
        OutputFormat::Text => {
            println!("{}", user_line(user));
            Ok(())
        }
    }
}

pub async fn run_search(query: &str, format: OutputFormat) -> Result<()> {
    let users = connect()?.search_users(query).await?;
    match format {
        OutputFormat::Json => print_json(&users),
        OutputFormat::Text => {
            if users.is_empty() {
                println!("No users match '{query}'.");
            }
            for user in &users {
                println!("{}", user_line(user));
            }
            Ok(())
        }
    }
}
