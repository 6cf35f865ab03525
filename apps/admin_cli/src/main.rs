use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use client_core::{
    admin_users::{ActionOutcome, AdminUsersViewModel},
    rest::{GatewayConfig, RestGateway},
    ConfirmationHook,
};
use shared::domain::{Role, RoleFilter, UserId};

#[derive(Parser, Debug)]
struct Cli {
    /// Base URL of the hosted data/auth service.
    #[arg(long)]
    service_url: String,
    #[arg(long)]
    api_key: String,
    /// Access token of a signed-in admin; defaults to the api key.
    #[arg(long)]
    access_token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List users, optionally filtered by role and name.
    List {
        #[arg(long)]
        role: Option<String>,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Change a user's role (asks for confirmation).
    SetRole { user_id: String, role: String },
    /// Delete an account (requires service-level credentials).
    Remove { user_id: String, name: String },
}

struct TerminalConfirmation;

#[async_trait]
impl ConfirmationHook for TerminalConfirmation {
    async fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }
}

fn parse_role(value: &str) -> Result<Role> {
    match value {
        "admin" => Ok(Role::Admin),
        "student" => Ok(Role::Student),
        other => anyhow::bail!("unknown role '{other}', expected admin or student"),
    }
}

fn report(outcome: ActionOutcome, message: Option<String>) {
    match message {
        Some(message) => println!("{message}"),
        None => println!("{outcome:?}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let gateway = Arc::new(RestGateway::new(GatewayConfig {
        base_url: cli.service_url,
        api_key: cli.api_key,
        access_token: cli.access_token,
    }));
    let users = AdminUsersViewModel::new(gateway, Arc::new(TerminalConfirmation));
    users.refresh().await;

    match cli.command {
        Command::List { role, search } => {
            let filter = match role.as_deref() {
                None => RoleFilter::All,
                Some(value) => match parse_role(value)? {
                    Role::Admin => RoleFilter::Admin,
                    Role::Student => RoleFilter::Student,
                },
            };
            users.set_filter(filter).await;
            users.set_search(search).await;

            let snapshot = users.snapshot().await;
            if let Some(message) = snapshot.action_message {
                eprintln!("{message}");
            }
            let counts = users.role_counts().await;
            println!(
                "{} users ({} admins, {} students)",
                counts.total, counts.admins, counts.students
            );
            for user in users.visible_users().await {
                println!(
                    "{}  {:<12}  {}  {}",
                    user.id,
                    user.role.as_str(),
                    user.created_at.format("%Y-%m-%d"),
                    user.full_name
                );
            }
        }
        Command::SetRole { user_id, role } => {
            let outcome = users
                .set_role(&UserId::new(user_id), parse_role(&role)?)
                .await;
            report(outcome, users.snapshot().await.action_message);
        }
        Command::Remove { user_id, name } => {
            let outcome = users.remove_user(&UserId::new(user_id), &name).await;
            report(outcome, users.snapshot().await.action_message);
        }
    }

    Ok(())
}
