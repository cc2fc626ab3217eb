//! Callguard CLI.
//!
//! Opens the local screening database directly. Every command except
//! `run` performs one operation and exits; `run` hosts the background
//! schedulers until interrupted.

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ResolvedConfig;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Callguard: screen incoming calls from unknown and spam numbers.
#[derive(Parser)]
#[command(name = "callguard", version, about)]
struct Cli {
    /// Output in JSON format (no colors, machine-readable).
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding the database and the outbox spool.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// JSON config file. CLI flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen one incoming call and print the decision.
    Screen {
        /// Caller number. Omit for a withheld number.
        number: Option<String>,
    },
    /// Manage the allow and block lists.
    List {
        #[command(subcommand)]
        action: commands::list::ListAction,
    },
    /// Spam knowledge base.
    Spam {
        #[command(subcommand)]
        action: commands::spam::SpamAction,
    },
    /// Show or change the screening policy.
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Call and message history.
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Identity-request messages.
    #[command(alias = "msg")]
    Message {
        #[command(subcommand)]
        action: commands::message::MessageAction,
    },
    /// Database summary.
    Stats,
    /// Flush storage and prune expired history.
    Maintenance,
    /// Run the background schedulers until interrupted.
    Run {
        /// Trigger a spam sync immediately after start.
        #[arg(long)]
        sync_now: bool,
    },
}

// ---------------------------------------------------------------------------
// Global options passed to every command handler
// ---------------------------------------------------------------------------

/// Shared options threaded into command handlers.
pub struct GlobalOpts {
    pub json: bool,
    pub config: ResolvedConfig,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    let result = match ResolvedConfig::load(cli.config.as_deref(), cli.data_dir) {
        Ok(config) => dispatch(GlobalOpts { json, config }, cli.command).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        output::print_error(&e, json);
        std::process::exit(1);
    }
}

async fn dispatch(opts: GlobalOpts, cmd: Commands) -> std::result::Result<(), String> {
    match cmd {
        Commands::Screen { number } => commands::screen::run(number.as_deref(), &opts).await,
        Commands::List { action } => commands::list::run(action, &opts).await,
        Commands::Spam { action } => commands::spam::run(action, &opts).await,
        Commands::Settings { action } => commands::settings::run(action, &opts).await,
        Commands::History { action } => commands::history::run(action, &opts).await,
        Commands::Message { action } => commands::message::run(action, &opts).await,
        Commands::Stats => commands::stats::run(&opts).await,
        Commands::Maintenance => commands::maintenance::run(&opts).await,
        Commands::Run { sync_now } => commands::run::run(sync_now, &opts).await,
    }
}
