pub mod delete;
pub mod instances;
pub mod migrate;

pub use delete::{DeleteCommands, handle_delete_command};
pub use instances::{InstancesCommands, handle_instances_command};
pub use migrate::{MigrateCommands, handle_migrate_command};

use crate::api::CatalogClient;
use crate::config::Config;
use anyhow::{Context, Result};

/// HTTP client configured from the `[settings]` table
pub(crate) fn build_client(config: &Config) -> Result<CatalogClient> {
    CatalogClient::new(&config.settings.to_client_settings()).context("Failed to build HTTP client")
}
