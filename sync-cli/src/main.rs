//! # bastion
//!
//! Command-line front end for Bastion submissions and the pending-change
//! queue.
//!
//! ## Commands
//!
//! - `submit`: Validate and queue a public submission
//! - `pending`: List changes waiting for the backend
//! - `flush`: Probe the backend and replay pending changes
//! - `clear`: Drop every pending change
//! - `status`: Show connectivity and queue depth
//! - `admin`: Moderate and edit records
//!
//! ## Example
//!
//! ```bash
//! # Sign up for the newsletter (queued if the backend is down)
//! bastion submit newsletter --field email=reader@example.com
//!
//! # Retry whatever is still queued
//! bastion flush
//!
//! # Review pending events
//! bastion admin list events --status pending
//! bastion admin approve events evt-002
//! ```

use anyhow::Result;
use bastion_sync_core::SubmissionStatus;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod app;
mod commands;
mod config;
mod input;

use commands::{admin, queue, status, submit};

/// Command-line front end for Bastion submissions.
#[derive(Parser, Debug)]
#[command(name = "bastion")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./bastion.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the pending-change log
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use the in-memory sample backend instead of the live service
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate and queue a submission, then try to deliver it
    Submit {
        /// Submission kind (advisors, events, companies, consortiums,
        /// innovations, newsletter)
        entity: String,

        /// Field value as key=value (repeatable)
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,

        /// Fields as a JSON object (merged before --field values)
        #[arg(long)]
        json: Option<String>,
    },

    /// List changes waiting for the backend
    Pending,

    /// Probe the backend and replay pending changes
    Flush,

    /// Drop every pending change without applying it
    Clear,

    /// Show connectivity and queue depth
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Moderate and edit records
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// List records
    List {
        /// Submission kind
        entity: String,
        /// Only records with this status
        #[arg(long)]
        status: Option<SubmissionStatus>,
    },

    /// Publish a record
    Approve {
        /// Submission kind
        entity: String,
        /// Record id
        id: String,
    },

    /// Decline a record
    Reject {
        /// Submission kind
        entity: String,
        /// Record id
        id: String,
    },

    /// Change fields of a record
    Edit {
        /// Submission kind
        entity: String,
        /// Record id
        id: String,
        /// Field value as key=value (repeatable)
        #[arg(long = "field", short = 'f', required = true)]
        fields: Vec<String>,
    },

    /// Remove a record
    Delete {
        /// Submission kind
        entity: String,
        /// Record id
        id: String,
    },

    /// Print records as JSON lines
    Export {
        /// Submission kind
        entity: String,
        /// Only records with this status
        #[arg(long)]
        status: Option<SubmissionStatus>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::resolve(cli.config.as_deref(), cli.data_dir, cli.mock)?;
    init_logging(&config.logging.filter);

    let app = app::App::open(&config).await?;

    match cli.command {
        Commands::Submit {
            entity,
            fields,
            json,
        } => {
            submit::run(&app, &entity, &fields, json.as_deref()).await?;
        }
        Commands::Pending => {
            queue::pending(&app).await?;
        }
        Commands::Flush => {
            queue::flush(&app).await?;
        }
        Commands::Clear => {
            queue::clear(&app).await?;
        }
        Commands::Status { json } => {
            status::run(&app, json).await?;
        }
        Commands::Admin(command) => match command {
            AdminCommand::List { entity, status } => {
                admin::list(&app, &entity, status).await?;
            }
            AdminCommand::Approve { entity, id } => {
                admin::set_status(&app, &entity, &id, SubmissionStatus::Approved).await?;
            }
            AdminCommand::Reject { entity, id } => {
                admin::set_status(&app, &entity, &id, SubmissionStatus::Rejected).await?;
            }
            AdminCommand::Edit { entity, id, fields } => {
                admin::edit(&app, &entity, &id, &fields).await?;
            }
            AdminCommand::Delete { entity, id } => {
                admin::delete(&app, &entity, &id).await?;
            }
            AdminCommand::Export { entity, status } => {
                admin::export(&app, &entity, status).await?;
            }
        },
    }

    Ok(())
}

/// Send `tracing` output to stderr. `RUST_LOG` overrides the configured
/// filter.
fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
