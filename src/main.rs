use anyhow::Result;
use ckan_migrate::cli::Cli;
use ckan_migrate::cli::app::Commands;
use ckan_migrate::cli::commands;
use clap::Parser;
use log::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger to file (truncate on each run)
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("ckan-migrate.log")?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    // Instance overrides may come from a .env file
    if let Ok(path) = dotenvy::dotenv() {
        debug!("Loaded environment from {:?}", path);
    }

    let cli = Cli::parse();
    info!("Starting ckan-migrate {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Migrate(args) => commands::handle_migrate_command(args).await?,
        Commands::Delete(args) => commands::handle_delete_command(args).await?,
        Commands::Instances(args) => commands::handle_instances_command(args).await?,
    }

    Ok(())
}
