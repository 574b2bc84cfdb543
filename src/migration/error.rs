//! Error taxonomy for migration and deletion runs.

use crate::api::{CatalogError, ContextError};
use std::fmt;

/// Which remote call of a datastore migration failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularStage {
    /// Zero-row probe for fields and row count
    Discovering,
    /// Full single-shot row fetch
    Fetching,
    /// Dropping the destination's existing table
    Deleting,
    /// `datastore_create` on the destination
    Creating,
}

impl fmt::Display for TabularStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            TabularStage::Discovering => "discovering the source table",
            TabularStage::Fetching => "fetching source rows",
            TabularStage::Deleting => "deleting the destination table",
            TabularStage::Creating => "creating the destination table",
        };
        f.write_str(stage)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MigrationError {
    /// A Context failed validation before any call was made
    #[error("Invalid context: {0}")]
    InvalidContext(#[from] ContextError),

    /// Source organization/dataset or destination organization/dataset could not be
    /// resolved. Aborts the whole run.
    #[error("Could not resolve {entity} '{reference}': {message}")]
    FatalResolution {
        entity: &'static str,
        reference: String,
        message: String,
        #[source]
        source: Option<CatalogError>,
    },

    /// File fetch, upload, or metadata write failed for one resource
    #[error("Transfer of resource '{resource}' failed: {source}")]
    ResourceTransfer {
        resource: String,
        #[source]
        source: CatalogError,
    },

    /// One resource's datastore table could not be migrated
    #[error("Datastore migration of resource '{resource}' failed while {stage}: {source}")]
    TabularMigration {
        resource: String,
        stage: TabularStage,
        #[source]
        source: CatalogError,
    },

    /// A delete during teardown failed; later deletions were not attempted
    #[error("Deleting '{target}' failed, remaining deletions halted: {source}")]
    DeletionOrder {
        target: String,
        #[source]
        source: CatalogError,
    },

    /// Resources landed but the dataset could not be made public
    #[error("Publishing dataset '{dataset}' failed: {source}")]
    Publish {
        dataset: String,
        #[source]
        source: CatalogError,
    },
}

impl MigrationError {
    pub fn fatal(entity: &'static str, reference: impl Into<String>, source: CatalogError) -> Self {
        MigrationError::FatalResolution {
            entity,
            reference: reference.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub fn fatal_message(entity: &'static str, reference: impl Into<String>, message: impl Into<String>) -> Self {
        MigrationError::FatalResolution {
            entity,
            reference: reference.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn transfer(resource: impl Into<String>, source: CatalogError) -> Self {
        MigrationError::ResourceTransfer {
            resource: resource.into(),
            source,
        }
    }

    pub fn tabular(resource: impl Into<String>, stage: TabularStage, source: CatalogError) -> Self {
        MigrationError::TabularMigration {
            resource: resource.into(),
            stage,
            source,
        }
    }

    pub fn deletion(target: impl Into<String>, source: CatalogError) -> Self {
        MigrationError::DeletionOrder {
            target: target.into(),
            source,
        }
    }

    /// The failing remote call, when there was one
    pub fn catalog_error(&self) -> Option<&CatalogError> {
        match self {
            MigrationError::InvalidContext(_) => None,
            MigrationError::FatalResolution { source, .. } => source.as_ref(),
            MigrationError::ResourceTransfer { source, .. }
            | MigrationError::TabularMigration { source, .. }
            | MigrationError::DeletionOrder { source, .. }
            | MigrationError::Publish { source, .. } => Some(source),
        }
    }

    /// Whether this error aborts a whole run rather than a single resource
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrationError::InvalidContext(_) | MigrationError::FatalResolution { .. }
        )
    }
}
