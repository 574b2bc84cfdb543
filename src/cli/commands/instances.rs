use crate::config::{Config, InstanceConfig, env_key};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

#[derive(Args)]
pub struct InstancesCommands {
    #[command(subcommand)]
    pub command: InstancesSubcommands,
}

#[derive(Subcommand)]
pub enum InstancesSubcommands {
    /// List configured instances
    List,
    /// Add or replace an instance
    Add {
        /// Instance name used by --source, --target and --instance
        name: String,
        /// Action API base URL, e.g. https://data.example.org/api/3
        #[arg(long)]
        url: String,
        /// API token; leave empty for read-only instances
        #[arg(long, default_value = "")]
        api_key: String,
    },
    /// Remove an instance
    Remove {
        /// Instance name
        name: String,
    },
}

/// Handle instances command
pub async fn handle_instances_command(cmd: InstancesCommands) -> Result<()> {
    let mut config = Config::load()?;

    match cmd.command {
        InstancesSubcommands::List => {
            let names = config.list_instances();
            if names.is_empty() {
                println!("{}", "No instances configured".bright_yellow());
                println!("  {}", "ckan-migrate instances add <name> --url <base-url> --api-key <token>".cyan());
                return Ok(());
            }

            println!("{}", "Configured instances:".bright_white().bold());
            for name in names {
                let Some(instance) = config.get_instance(name) else {
                    continue;
                };
                let key = if instance.api_key.is_empty() {
                    "read-only".dimmed()
                } else {
                    "api key set".green()
                };
                println!("  {} {} ({})", "●".bright_green(), name.bright_white(), key);
                println!("    {}: {}", "URL".dimmed(), instance.base_url.cyan());
            }
            println!();
            println!(
                "{}",
                format!("Override with {} / {}", env_key("<name>", "URL"), env_key("<name>", "API_KEY")).dimmed()
            );
        }

        InstancesSubcommands::Add { name, url, api_key } => {
            let parsed = reqwest::Url::parse(&url).with_context(|| format!("Invalid instance URL: {}", url))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("Instance URL must be http or https: {}", url);
            }

            config.add_instance(
                name.clone(),
                InstanceConfig {
                    base_url: url.trim_end_matches('/').to_string(),
                    api_key,
                },
            )?;
            config.save()?;
            println!("{} {}", "✓ Added instance".green(), name.bright_white().bold());
        }

        InstancesSubcommands::Remove { name } => {
            config.remove_instance(&name)?;
            config.save()?;
            println!("{} {}", "✓ Removed instance".green(), name.bright_white().bold());
        }
    }

    Ok(())
}
