use super::commands::delete::DeleteCommands;
use super::commands::instances::InstancesCommands;
use super::commands::migrate::MigrateCommands;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ckan-migrate")]
#[command(about = "Copy datasets, resources and datastore tables between CKAN instances")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Migrate one dataset from a source instance to a target instance
    Migrate(MigrateCommands),
    /// Delete a dataset, its resources and their datastore tables
    Delete(DeleteCommands),
    /// Manage configured catalog instances
    Instances(InstancesCommands),
}
