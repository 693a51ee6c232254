//! Stint CLI - track activities from the terminal and keep replicas in step

mod cli;
mod commands;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::Context;
use crate::commands::config::run_config;
use crate::commands::daemon::run_daemon;
use crate::commands::delete::run_delete;
use crate::commands::edit::{run_edit, RecordEdits};
use crate::commands::finish::run_finish;
use crate::commands::list::run_list;
use crate::commands::show::run_show;
use crate::commands::sync::run_sync;
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "stint=info,stint_core=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::load(cli.config, cli.local)?;

    match cli.command {
        Commands::Add {
            title,
            tags,
            estimate,
            body,
        } => run_add(&ctx, &title, &tags, estimate.as_deref(), body)?,
        Commands::List {
            sort,
            active,
            limit,
            json,
        } => run_list(&ctx, sort, active, limit, json)?,
        Commands::Show { id, json } => run_show(&ctx, &id, json)?,
        Commands::Edit {
            id,
            title,
            tags,
            estimate,
            body,
        } => {
            let edits = RecordEdits {
                title,
                tags,
                estimate,
                body,
            };
            run_edit(&ctx, &id, &edits)?;
        }
        Commands::Finish { id } => run_finish(&ctx, &id)?,
        Commands::Delete { id } => run_delete(&ctx, &id)?,
        Commands::Sync { json } => {
            run_sync(&ctx, json).await?;
        }
        Commands::Daemon => run_daemon(&ctx).await?,
        Commands::Config { command } => run_config(&ctx, command)?,
    }

    Ok(())
}
