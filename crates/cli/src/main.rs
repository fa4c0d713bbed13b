//! OptGate CLI - admission gatekeeping from the command line
//!
//! Usage:
//! ```bash
//! optgate migrate up
//! optgate sender create --name "Acme Clinic"
//! optgate send 6f1c...e2 "+1 555 000 1111" "Your appointment is tomorrow"
//! optgate report 9b7a...41 failed --reason-code 21610
//! optgate ledger "+1 555 000 1111"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use optgate_core::OutcomeKind;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod db;

use commands::{ledger, message, sender};

/// OptGate - refuses messages to destinations that keep unsubscribing
#[derive(Parser)]
#[command(name = "optgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database URL (overrides config and OPTGATE_DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Schema management
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },

    /// Show database status
    Status,

    /// Sender provisioning
    Sender {
        #[command(subcommand)]
        action: SenderAction,
    },

    /// Admit and record an outbound message
    Send {
        /// Sender ID
        sender_id: String,
        /// Destination phone number
        destination: String,
        /// Message body
        body: String,
        /// Print the JSON receipt or error body
        #[arg(long)]
        json: bool,
    },

    /// Ingest a delivery report for a message
    Report {
        /// Message ID
        message_id: String,
        /// Delivery outcome
        outcome: OutcomeArg,
        /// Failure reason code (21610 unsubscribed, 30007 spam)
        #[arg(long)]
        reason_code: Option<i64>,
    },

    /// Show the distinct-unsubscribe ledger for a destination
    Ledger {
        /// Destination phone number
        destination: String,
        /// Print the ledger as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum MigrateAction {
    /// Apply pending migrations
    Up,
    /// Drop all tables
    Down,
    /// Drop all tables and migrate again
    Reset,
}

#[derive(Subcommand)]
pub enum SenderAction {
    /// Create a new sender
    Create {
        /// Display name
        #[arg(long, short)]
        name: String,
    },
    /// List all senders
    List,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutcomeArg {
    Delivered,
    Failed,
}

impl OutcomeArg {
    pub fn to_core_type(self) -> OutcomeKind {
        match self {
            OutcomeArg::Delivered => OutcomeKind::Delivered,
            OutcomeArg::Failed => OutcomeKind::Failed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "optgate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = db::load_config(cli.config.as_deref(), cli.database_url.as_deref())?;

    match cli.command {
        Commands::Migrate { action } => db::migrate(&config, action).await?,

        Commands::Status => db::show_status(&config).await?,

        Commands::Sender { action } => sender::handle(&config, action).await?,

        Commands::Send {
            sender_id,
            destination,
            body,
            json,
        } => {
            return message::send(&config, &sender_id, &destination, &body, json).await;
        }

        Commands::Report {
            message_id,
            outcome,
            reason_code,
        } => {
            message::report(&config, &message_id, outcome.to_core_type(), reason_code).await?;
        }

        Commands::Ledger { destination, json } => {
            ledger::show(&config, &destination, json).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
