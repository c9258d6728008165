//! padhubctl - Admin CLI for the pad backend
//!
//! Drives the Coder provisioning client and the database initializer from
//! the command line: ensure users and workspaces, run lifecycle builds, and
//! sweep dormant workspaces.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use padhub::coder::{CoderClient, UserInfo, provision};
use padhub::db::Database;
use padhub::settings::Settings;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "Error: {err:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[tokio::main]
async fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load()?;

    match cli.command {
        Command::User { command } => handle_user(&settings, command, cli.json).await,
        Command::Workspace { command } => handle_workspace(&settings, command, cli.json).await,
        Command::Templates => handle_templates(&settings, cli.json).await,
        Command::Cleanse { days } => handle_cleanse(&settings, days).await,
        Command::Db { command } => handle_db(&settings, command).await,
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let default = if verbose { "padhub=debug" } else { "padhub=info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .ok();
}

#[derive(Debug, Parser)]
#[command(
    name = "padhubctl",
    author,
    version,
    about = "Admin CLI for the pad backend - manage Coder users, workspaces, and the database."
)]
struct Cli {
    /// Output machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage Coder users
    User {
        #[command(subcommand)]
        command: UserCommand,
    },

    /// Manage pad workspaces
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommand,
    },

    /// List the deployment's templates
    Templates,

    /// Delete dormant workspaces approaching their deletion deadline
    Cleanse {
        /// Delete workspaces due within this many days
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Manage the pad database
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    /// Look up a user by email, creating one when absent
    Ensure {
        /// Email address of the user
        #[arg(long)]
        email: String,
        /// Full name for the user
        #[arg(long, default_value = "")]
        name: String,
    },
    /// Ensure a user and their pad workspace exist (the login flow)
    Provision {
        /// Email address of the user
        #[arg(long)]
        email: String,
        /// Full name for the user
        #[arg(long, default_value = "")]
        name: String,
    },
}

#[derive(Debug, Subcommand)]
enum WorkspaceCommand {
    /// Show a user's pad workspace
    Status {
        /// Coder username
        username: String,
    },
    /// Create a user's pad workspace unless it already exists
    Ensure {
        /// Coder username
        username: String,
    },
    /// Start a workspace
    Start {
        /// Workspace ID
        id: Uuid,
    },
    /// Stop a workspace
    Stop {
        /// Workspace ID
        id: Uuid,
    },
    /// Delete a workspace
    Delete {
        /// Workspace ID
        id: Uuid,
    },
    /// List workspaces
    List {
        /// Search query (e.g. "dormant:true")
        #[arg(long, short)]
        query: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Create the schema and tables
    Init,
}

async fn handle_user(settings: &Settings, command: UserCommand, json: bool) -> Result<()> {
    let client = CoderClient::new(&settings.coder)?;

    match command {
        UserCommand::Ensure { email, name } => {
            let (user, created) = client.ensure_user_exists(&UserInfo { email, name }).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "user": user,
                        "created": created,
                    }))?
                );
            } else if created {
                println!("Created user {} ({})", user.username, user.id);
            } else {
                println!("User {} already exists ({})", user.username, user.id);
            }
        }
        UserCommand::Provision { email, name } => {
            let (user, workspace) = provision(&client, &UserInfo { email, name }).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "user": user,
                        "workspace": workspace,
                    }))?
                );
            } else {
                match workspace {
                    Some(workspace) => println!(
                        "Provisioned {} with workspace {}",
                        user.username, workspace.id
                    ),
                    None => println!("{} already fully provisioned", user.username),
                }
            }
        }
    }

    Ok(())
}

async fn handle_workspace(settings: &Settings, command: WorkspaceCommand, json: bool) -> Result<()> {
    let client = CoderClient::new(&settings.coder)?;

    match command {
        WorkspaceCommand::Status { username } => {
            match client.get_workspace_status_for_user(&username).await? {
                Some(workspace) if json => {
                    println!("{}", serde_json::to_string_pretty(&workspace)?)
                }
                Some(workspace) => {
                    println!(
                        "Workspace {} ({}), dormant: {}",
                        workspace.name,
                        workspace.id,
                        workspace.is_dormant()
                    );
                }
                None => println!("No workspace found for {username}"),
            }
        }
        WorkspaceCommand::Ensure { username } => {
            let user = find_user_by_username(&client, &username).await?;
            match client.ensure_workspace_exists(&username, user.id).await? {
                Some(workspace) => println!("Created workspace {} ({})", workspace.name, workspace.id),
                None => println!("Workspace already exists for {username}"),
            }
        }
        WorkspaceCommand::Start { id } => {
            let build = client.start_workspace(id).await?;
            println!("Started workspace {id} (build {})", build.id);
        }
        WorkspaceCommand::Stop { id } => {
            let build = client.stop_workspace(id).await?;
            println!("Stopped workspace {id} (build {})", build.id);
        }
        WorkspaceCommand::Delete { id } => {
            let build = client.delete_workspace(id).await?;
            println!("Deleting workspace {id} (build {})", build.id);
        }
        WorkspaceCommand::List { query } => {
            let listing = client.list_workspaces(query.as_deref(), None, None).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing.workspaces)?);
            } else {
                for workspace in &listing.workspaces {
                    println!(
                        "{}  {}/{}  dormant: {}",
                        workspace.id,
                        workspace.owner_name,
                        workspace.name,
                        workspace.is_dormant()
                    );
                }
                println!("{} workspace(s)", listing.workspaces.len());
            }
        }
    }

    Ok(())
}

async fn handle_templates(settings: &Settings, json: bool) -> Result<()> {
    let client = CoderClient::new(&settings.coder)?;
    let templates = client.list_templates().await?;

    if json {
        let value: Vec<_> = templates
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "name": t.name,
                    "active_version_id": t.active_version_id,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        for template in &templates {
            println!("{}  {}", template.id, template.name);
        }
    }

    Ok(())
}

async fn handle_cleanse(settings: &Settings, days: i64) -> Result<()> {
    let client = CoderClient::new(&settings.coder)?;
    let deleted = client.cleanse_workspaces(days).await?;
    println!("Deleted {deleted} dormant workspace(s)");
    Ok(())
}

async fn handle_db(settings: &Settings, command: DbCommand) -> Result<()> {
    match command {
        DbCommand::Init => {
            let database = Database::connect(&settings.database)
                .await
                .context("connecting to database")?;
            database.init().await?;
            println!("Database initialized");
        }
    }
    Ok(())
}

async fn find_user_by_username(client: &CoderClient, username: &str) -> Result<padhub::coder::User> {
    let users = client.list_users(Some(username), None, None).await?;
    match users.into_iter().find(|u| u.username == username) {
        Some(user) => Ok(user),
        None => bail!("no Coder user with username '{username}'"),
    }
}
