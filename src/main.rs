// calsync - Google Calendar reconciliation service
// Command line entry point

use calsync::command_handlers::CommandHandlers;
use calsync::config::Config;
use calsync::error::{AppError, AppResult};
use calsync::utils::logging;
use calsync::Database;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::{error, info};
use serde::Serialize;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "calsync")]
#[command(about = "Reconcile a local event store with Google Calendar")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull remote changes for one calendar into the local store
    Sync {
        #[arg(long)]
        owner: String,

        /// Calendar id (defaults to "primary")
        #[arg(long)]
        calendar: Option<String>,

        /// Window start, RFC 3339 (defaults to the configured look-back)
        #[arg(long, value_parser = parse_instant)]
        since: Option<DateTime<Utc>>,

        /// Window end, RFC 3339 (open when omitted)
        #[arg(long, value_parser = parse_instant)]
        until: Option<DateTime<Utc>>,
    },
    /// Push a local event to Google Calendar
    Push {
        #[arg(long)]
        owner: String,

        event_id: String,
    },
    /// Delete an event from a Google calendar
    DeleteRemote {
        #[arg(long, default_value = "primary")]
        calendar: String,

        external_id: String,
    },
    /// List calendars visible to the current token
    Calendars,
    /// Show the last sync time and error for an owner
    Status {
        #[arg(long)]
        owner: String,
    },
    /// Register an owner
    AddUser { email: String },
    /// Create a manual local event
    AddEvent {
        #[arg(long)]
        owner: String,

        #[arg(long)]
        title: String,

        /// Event instant, RFC 3339
        #[arg(long, value_parser = parse_instant)]
        at: DateTime<Utc>,
    },
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 timestamp: {}", e))
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::conversion(format!("Failed to render output: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("Error: {}", e.to_safe_string());
            ExitCode::FAILURE
        }
    }
}

/// Runs one command. `Ok(false)` means the command ran but reported failure.
async fn run(command: Commands) -> AppResult<bool> {
    let config = Config::from_env()?;
    let db = Database::open(&config.database_path).await?;
    let handlers = CommandHandlers::new(&db, config);

    match command {
        Commands::Sync {
            owner,
            calendar,
            since,
            until,
        } => {
            let client = handlers.calendar.google_client().await?;
            let result = handlers
                .calendar
                .sync(client, &owner, calendar.as_deref(), since, until)
                .await;
            print_json(&result)?;
            Ok(result.success)
        }
        Commands::Push { owner, event_id } => {
            let client = handlers.calendar.google_client().await?;
            let outcome = handlers.calendar.push(&client, &owner, &event_id).await;
            print_json(&outcome)?;
            Ok(outcome.success)
        }
        Commands::DeleteRemote {
            calendar,
            external_id,
        } => {
            let client = handlers.calendar.google_client().await?;
            let outcome = handlers
                .calendar
                .delete_remote(&client, &calendar, &external_id)
                .await;
            print_json(&outcome)?;
            Ok(outcome.success)
        }
        Commands::Calendars => {
            let client = handlers.calendar.google_client().await?;
            print_json(&client.list_calendars().await?)?;
            Ok(true)
        }
        Commands::Status { owner } => {
            print_json(&handlers.database.status(&owner).await?)?;
            Ok(true)
        }
        Commands::AddUser { email } => {
            let user = handlers.database.add_user(&email).await?;
            info!("Registered {}", user.email);
            print_json(&user)?;
            Ok(true)
        }
        Commands::AddEvent { owner, title, at } => {
            print_json(&handlers.database.add_manual_event(&owner, &title, at).await?)?;
            Ok(true)
        }
    }
}
