//! Teardown of a migrated dataset.
//!
//! The catalog's package-level delete does not drop datastore tables, so each
//! resource's table and the resource itself are removed one by one before the
//! dataset record is purged. The first failure halts everything after it.

use super::error::MigrationError;
use super::outcome::{ResourceOutcome, ResourceStatus, RunResult};
use crate::api::constants::actions;
use crate::api::normalize::{normalize_dataset, normalize_organization, normalize_resources};
use crate::api::{CatalogApi, CatalogError, Context, Dataset, Resource};
use log::{debug, info, warn};
use std::time::Instant;

pub struct DeletionEngine<'a> {
    api: &'a dyn CatalogApi,
}

impl<'a> DeletionEngine<'a> {
    pub fn new(api: &'a dyn CatalogApi) -> Self {
        Self { api }
    }

    /// Delete every resource (table first) of the Context's dataset, then purge it.
    pub async fn delete_dataset(&self, ctx: &mut Context) -> Result<RunResult, MigrationError> {
        let started = Instant::now();

        let dataset_ref = ctx
            .dataset_ref()
            .or_else(|| ctx.dataset_id())
            .map(str::to_string)
            .ok_or_else(|| MigrationError::fatal_message("dataset", "", "context names no dataset to delete"))?;

        let Some((dataset, resources)) = self.resolve(ctx, &dataset_ref).await? else {
            warn!("Dataset '{}' not found, nothing to delete", dataset_ref);
            return Ok(RunResult::not_found(dataset_ref).finish(started.elapsed()));
        };
        let Some(dataset_id) = dataset.id.clone() else {
            return Err(MigrationError::fatal_message("dataset", dataset_ref, "dataset has no id"));
        };
        self.check_ownership(ctx, &dataset).await?;

        info!("Deleting dataset '{}' with {} resources", dataset.name, resources.len());
        let mut result = RunResult::new(dataset_ref);
        result.dataset_id = Some(dataset_id.clone());

        let mut remaining = resources.clone();
        let mut halted = false;
        for resource in &resources {
            let mut outcome = ResourceOutcome::for_resource(resource, None);
            outcome.destination_id = resource.id.clone();

            if halted {
                result.outcomes.push(outcome);
                continue;
            }

            match self.delete_resource(ctx, resource).await {
                Ok(()) => {
                    outcome.status = ResourceStatus::Deleted;
                    remaining.retain(|r| r.id != resource.id);
                }
                Err(e) => {
                    warn!("Halting deletion of '{}': {}", dataset.name, e);
                    outcome.status = ResourceStatus::Failed(e);
                    halted = true;
                }
            }
            result.outcomes.push(outcome);
        }

        if halted {
            ctx.dataset = Some(dataset);
            ctx.resources = Some(remaining);
            return Ok(result.finish(started.elapsed()));
        }

        match self.api.purge_dataset(ctx, &dataset_id).await {
            Ok(_) => {
                info!("Purged dataset '{}'", dataset.name);
                result.purged = true;
                ctx.dataset = None;
                ctx.resources = None;
            }
            Err(e) => {
                warn!("Purging '{}' failed: {}", dataset.name, e);
                result.dataset_error = Some(MigrationError::deletion(&dataset.name, e));
                ctx.dataset = Some(dataset);
                ctx.resources = Some(Vec::new());
            }
        }

        Ok(result.finish(started.elapsed()))
    }

    /// Dataset plus the resource ids to tear down, preferring what the Context
    /// already knows. `None` when the dataset does not exist.
    async fn resolve(&self, ctx: &Context, dataset_ref: &str) -> Result<Option<(Dataset, Vec<Resource>)>, MigrationError> {
        if let (Some(dataset), Some(resources)) = (&ctx.dataset, &ctx.resources) {
            if dataset.id.is_some() {
                return Ok(Some((dataset.clone(), resources.clone())));
            }
        }

        match self.api.show_dataset(ctx, dataset_ref).await {
            Ok(raw) => {
                let resources = ctx.resources.clone().unwrap_or_else(|| normalize_resources(&raw));
                Ok(Some((normalize_dataset(&raw), resources)))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(MigrationError::fatal("dataset", dataset_ref, e)),
        }
    }

    /// Refuse to delete a dataset owned by a different organization than the Context names
    async fn check_ownership(&self, ctx: &Context, dataset: &Dataset) -> Result<(), MigrationError> {
        let reference = ctx.organization_ref();
        let raw = self
            .api
            .show_organization(ctx, reference)
            .await
            .map_err(|e| MigrationError::fatal("organization", reference, e))?;
        let organization = normalize_organization(&raw);

        match (&dataset.owner_org_id, &organization.id) {
            (Some(owner), Some(org_id)) if owner != org_id => Err(MigrationError::fatal_message(
                "dataset",
                &dataset.name,
                format!("dataset belongs to organization {} not '{}'", owner, reference),
            )),
            _ => Ok(()),
        }
    }

    async fn delete_resource(&self, ctx: &Context, resource: &Resource) -> Result<(), MigrationError> {
        let resource_id = resource.id.as_deref().ok_or_else(|| {
            MigrationError::deletion(
                &resource.name,
                CatalogError::precondition(actions::RESOURCE_DELETE, "resource has no id"),
            )
        })?;

        if resource.datastore_active {
            match self.api.delete_tabular(ctx, resource_id).await {
                Ok(_) => debug!("Dropped datastore table of '{}'", resource.name),
                Err(e) if e.is_not_found() => debug!("Datastore table of '{}' already gone", resource.name),
                Err(e) => return Err(MigrationError::deletion(&resource.name, e)),
            }
        }

        self.api
            .delete_resource(ctx, resource_id)
            .await
            .map_err(|e| MigrationError::deletion(&resource.name, e))?;
        info!("Deleted resource '{}' ({})", resource.name, resource_id);
        Ok(())
    }
}
