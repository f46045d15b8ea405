//! oak - command-line front end for the oak taxonomy catalog
//!
//! Opens (creating if needed) the catalog database, then runs one subcommand.
//! Logs go to stderr; command output goes to stdout.

mod cli;
mod commands;
mod prompt;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use oak_common::config::{resolve_database_path, TomlConfig};
use oak_common::RecordStore;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = TomlConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("oak={level},oak_common={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let db_path = resolve_database_path(cli.database.as_deref(), &config);
    info!("Database: {}", db_path.display());

    let store = RecordStore::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let result = run(&store, cli.command, &config).await;
    store.close().await;
    result
}

async fn run(store: &RecordStore, command: Commands, config: &TomlConfig) -> Result<()> {
    match command {
        Commands::Source { command } => commands::source(store, command).await,
        Commands::List(args) => commands::list(store, args).await,
        Commands::Show { name } => commands::show(store, &name).await,
        Commands::Find { query, limit } => commands::find(store, &query, limit).await,
        Commands::Save { file } => commands::save(store, &file).await,
        Commands::Attribute { file } => commands::attribute(store, &file).await,
        Commands::Delete {
            name,
            unlink_hybrids,
            force,
        } => commands::delete(store, &name, unlink_hybrids, force).await,
        Commands::Import(args) => commands::import(store, args, config).await,
        Commands::AuditHybrids { repair } => commands::audit_hybrids(store, repair).await,
        Commands::Stats => commands::stats(store).await,
        Commands::Export { file } => commands::export(store, file.as_deref()).await,
        Commands::Taxa { command } => commands::taxa(store, command).await,
    }
}
