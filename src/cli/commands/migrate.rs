use super::build_client;
use crate::cli::report::print_run_result;
use crate::config::Config;
use crate::migration::{MigrateOptions, migrate};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use log::info;

#[derive(Args)]
pub struct MigrateCommands {
    /// Configured instance to read the dataset from
    #[arg(long)]
    pub source: String,
    /// Configured instance to write the dataset to
    #[arg(long)]
    pub target: String,
    /// Dataset name or id on the source instance
    #[arg(long)]
    pub dataset: String,
    /// Organization that owns the dataset on the source instance
    #[arg(long)]
    pub source_org: String,
    /// Organization that will own the dataset on the target instance
    #[arg(long)]
    pub target_org: String,
    /// Dataset name on the target when it differs from the source
    #[arg(long)]
    pub target_dataset: Option<String>,
    /// Make the dataset public once every resource has landed
    #[arg(long)]
    pub publish: bool,
}

/// Handle migrate command
pub async fn handle_migrate_command(cmd: MigrateCommands) -> Result<()> {
    let config = Config::load()?;
    let client = build_client(&config)?;

    let mut source = config
        .context_for(&cmd.source, &cmd.source_org)?
        .with_dataset_ref(&cmd.dataset);
    let mut destination = config.context_for(&cmd.target, &cmd.target_org)?;
    if let Some(target_dataset) = &cmd.target_dataset {
        destination = destination.with_dataset_ref(target_dataset);
    }

    let options = MigrateOptions {
        publish: cmd.publish || config.settings.publish,
    };

    info!(
        "Migrating '{}' from {} ({}) to {} ({})",
        cmd.dataset, cmd.source, cmd.source_org, cmd.target, cmd.target_org
    );
    println!(
        "{} {} {} {}",
        "Migrating".bright_blue().bold(),
        cmd.dataset.bright_white().bold(),
        "→".dimmed(),
        format!("{}/{}", cmd.target, cmd.target_org).cyan()
    );

    let result = migrate(&client, &mut source, &mut destination, &options).await?;
    print_run_result(&result);

    if !result.is_success() {
        anyhow::bail!("Migration of '{}' did not complete", cmd.dataset);
    }
    Ok(())
}
