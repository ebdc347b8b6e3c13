//! Civic CLI - Command-line client for municipal community services
//!
//! Drives the offline-first core from a terminal: refresh stale data,
//! inspect sync checkpoints, manage drafts and favorites, and poll watched
//! items for status changes.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::{run_login, run_logout};
use crate::commands::common::{resolve_config_path, resolve_db_path, resolve_location, Context};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::drafts::run_drafts;
use crate::commands::favorites::run_favorites;
use crate::commands::notes::run_notes;
use crate::commands::refresh::run_refresh;
use crate::commands::status::run_status;
use crate::commands::status_check::run_status_check;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("civic_cli=info,civic_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = Context {
        db_path: resolve_db_path(cli.db_path)?,
        config_path: resolve_config_path(cli.config)?,
        location: resolve_location(cli.lat, cli.lng)?,
    };

    match cli.command {
        Commands::Login { email, password } => run_login(&context, &email, &password).await?,
        Commands::Logout { clear_data } => run_logout(&context, clear_data).await?,
        Commands::Refresh { feature, force } => {
            run_refresh(&context, feature.as_deref(), force).await?;
        }
        Commands::Status { json } => run_status(&context, json).await?,
        Commands::StatusCheck => run_status_check(&context).await?,
        Commands::Drafts { command } => run_drafts(&context, command).await?,
        Commands::Favorites { command } => run_favorites(&context, command).await?,
        Commands::Notes { command } => run_notes(&context, command).await?,
        Commands::Config { command } => run_config(&context, &command)?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
