//! Migrate datasets, their resources and datastore tables between CKAN instances.

pub mod api;
pub mod cli;
pub mod config;
pub mod migration;

pub use api::{CatalogApi, CatalogClient, CatalogError, Context};
pub use migration::{MigrateOptions, MigrationError, Migrator, RunResult, RunStatus, delete_dataset, migrate};
