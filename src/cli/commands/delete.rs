use super::build_client;
use crate::cli::report::print_run_result;
use crate::config::Config;
use crate::migration::delete_dataset;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use log::info;

#[derive(Args)]
pub struct DeleteCommands {
    /// Configured instance holding the dataset
    #[arg(long)]
    pub instance: String,
    /// Organization that owns the dataset
    #[arg(long)]
    pub org: String,
    /// Dataset name or id to delete
    #[arg(long)]
    pub dataset: String,
}

/// Handle delete command
pub async fn handle_delete_command(cmd: DeleteCommands) -> Result<()> {
    let config = Config::load()?;
    let client = build_client(&config)?;

    let mut ctx = config.context_for(&cmd.instance, &cmd.org)?.with_dataset_ref(&cmd.dataset);

    info!("Deleting '{}' from {} ({})", cmd.dataset, cmd.instance, cmd.org);
    println!(
        "{} {} {} {}",
        "Deleting".bright_red().bold(),
        cmd.dataset.bright_white().bold(),
        "from".dimmed(),
        format!("{}/{}", cmd.instance, cmd.org).cyan()
    );

    let result = delete_dataset(&client, &mut ctx).await?;
    print_run_result(&result);

    if !result.is_success() {
        anyhow::bail!("Deletion of '{}' did not complete", cmd.dataset);
    }
    Ok(())
}
