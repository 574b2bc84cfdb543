pub mod deletion;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod tabular;

pub use deletion::DeletionEngine;
pub use error::{MigrationError, TabularStage};
pub use orchestrator::{MigrateOptions, MigrationEngine};
pub use outcome::{ResourceOutcome, ResourceStatus, RunResult, RunStatus};

use crate::api::{CatalogApi, Context};
use std::sync::Arc;

/// Migrate the source Context's dataset onto the destination Context.
pub async fn migrate(
    api: &dyn CatalogApi,
    source: &mut Context,
    destination: &mut Context,
    options: &MigrateOptions,
) -> Result<RunResult, MigrationError> {
    MigrationEngine::new(api).migrate(source, destination, options).await
}

/// Delete the Context's dataset, its resources and their datastore tables.
pub async fn delete_dataset(api: &dyn CatalogApi, ctx: &mut Context) -> Result<RunResult, MigrationError> {
    DeletionEngine::new(api).delete_dataset(ctx).await
}

/// Owns a catalog client so runs can be started without threading a borrow around
#[derive(Clone)]
pub struct Migrator {
    api: Arc<dyn CatalogApi>,
}

impl Migrator {
    pub fn new(api: Arc<dyn CatalogApi>) -> Self {
        Self { api }
    }

    pub async fn migrate(
        &self,
        source: &mut Context,
        destination: &mut Context,
        options: &MigrateOptions,
    ) -> Result<RunResult, MigrationError> {
        migrate(self.api.as_ref(), source, destination, options).await
    }

    pub async fn delete_dataset(&self, ctx: &mut Context) -> Result<RunResult, MigrationError> {
        delete_dataset(self.api.as_ref(), ctx).await
    }
}
