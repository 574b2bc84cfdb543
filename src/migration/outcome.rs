//! Per-resource outcomes and the overall result of a run

use super::error::MigrationError;
use crate::api::{Resource, UpsertMode};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum ResourceStatus {
    Created,
    Updated,
    Deleted,
    Failed(MigrationError),
    /// Not attempted because an earlier step halted the run
    Skipped,
}

impl ResourceStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, ResourceStatus::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResourceStatus::Created => "created",
            ResourceStatus::Updated => "updated",
            ResourceStatus::Deleted => "deleted",
            ResourceStatus::Failed(_) => "failed",
            ResourceStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceOutcome {
    pub name: String,
    pub source_id: Option<String>,
    pub destination_id: Option<String>,
    pub mode: Option<UpsertMode>,
    /// Rows written to the destination datastore table
    pub table_rows: Option<usize>,
    pub status: ResourceStatus,
}

impl ResourceOutcome {
    pub(crate) fn for_resource(resource: &Resource, mode: Option<UpsertMode>) -> Self {
        Self {
            name: resource.name.clone(),
            source_id: resource.id.clone(),
            destination_id: None,
            mode,
            table_rows: None,
            status: ResourceStatus::Skipped,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    pub fn error(&self) -> Option<&MigrationError> {
        match &self.status {
            ResourceStatus::Failed(error) => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every step completed
    Succeeded,
    /// At least one resource or dataset-level step failed
    Failed,
    /// The dataset to migrate or delete does not exist; nothing was written
    NotFound,
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub status: RunStatus,
    /// Dataset reference the run was asked to work on
    pub dataset_ref: String,
    /// Destination dataset id (migration) or the deleted dataset's id (deletion)
    pub dataset_id: Option<String>,
    pub dataset_mode: Option<UpsertMode>,
    pub outcomes: Vec<ResourceOutcome>,
    /// Dataset-level failure after resources were handled (publish, purge)
    pub dataset_error: Option<MigrationError>,
    pub published: bool,
    pub purged: bool,
    pub duration: Duration,
}

impl RunResult {
    pub(crate) fn new(dataset_ref: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Succeeded,
            dataset_ref: dataset_ref.into(),
            dataset_id: None,
            dataset_mode: None,
            outcomes: Vec::new(),
            dataset_error: None,
            published: false,
            purged: false,
            duration: Duration::ZERO,
        }
    }

    pub(crate) fn not_found(dataset_ref: impl Into<String>) -> Self {
        Self {
            status: RunStatus::NotFound,
            ..Self::new(dataset_ref)
        }
    }

    /// Derive the status from the collected outcomes
    pub(crate) fn finish(mut self, duration: Duration) -> Self {
        self.duration = duration;
        if self.status != RunStatus::NotFound {
            self.status = if self.failure_count() == 0 {
                RunStatus::Succeeded
            } else {
                RunStatus::Failed
            };
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count() + usize::from(self.dataset_error.is_some())
    }

    pub fn count(&self, label: &str) -> usize {
        self.outcomes.iter().filter(|o| o.status.label() == label).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CatalogError;

    fn outcome(name: &str, status: ResourceStatus) -> ResourceOutcome {
        ResourceOutcome {
            name: name.to_string(),
            source_id: None,
            destination_id: None,
            mode: Some(UpsertMode::Create),
            table_rows: None,
            status,
        }
    }

    #[test]
    fn test_finish_derives_status() {
        let mut result = RunResult::new("trails-2024");
        result.outcomes.push(outcome("a", ResourceStatus::Created));
        result.outcomes.push(outcome("b", ResourceStatus::Updated));
        let result = result.finish(Duration::from_millis(5));
        assert!(result.is_success());
        assert_eq!(result.count("created"), 1);

        let mut result = RunResult::new("trails-2024");
        result.outcomes.push(outcome("a", ResourceStatus::Created));
        result.outcomes.push(outcome(
            "b",
            ResourceStatus::Failed(MigrationError::transfer("b", CatalogError::new(500, "resource_create", "boom"))),
        ));
        let result = result.finish(Duration::ZERO);
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.failure_count(), 1);
        assert_eq!(result.failures().next().unwrap().name, "b");
    }

    #[test]
    fn test_not_found_survives_finish() {
        let result = RunResult::not_found("missing").finish(Duration::ZERO);
        assert_eq!(result.status, RunStatus::NotFound);
        assert!(!result.is_success());
        assert!(result.outcomes.is_empty());
    }

    #[test]
    fn test_dataset_error_counts_as_failure() {
        let mut result = RunResult::new("trails-2024");
        result.dataset_error = Some(MigrationError::deletion(
            "trails-2024",
            CatalogError::new(403, "dataset_purge", "Authorization Error"),
        ));
        assert_eq!(result.finish(Duration::ZERO).status, RunStatus::Failed);
    }
}
