use super::error::MigrationError;
use super::outcome::{ResourceOutcome, ResourceStatus, RunResult};
use super::tabular;
use crate::api::constants::actions;
use crate::api::normalize::{normalize_dataset, normalize_organization, normalize_resources};
use crate::api::{
    CatalogApi, CatalogError, Context, Dataset, FileUpload, Organization, Resource, ResourceWrite, TabularTable,
    TabularTarget, UpsertMode,
};
use log::{debug, info, warn};
use serde_json::Value;
use std::time::Instant;

/// Options for one migration run
#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    /// Make the destination dataset public once every resource has landed
    pub publish: bool,
}

/// Source data for one resource, read before anything is written
struct StagedResource {
    file: Option<FileUpload>,
    table: Option<TabularTable>,
}

/// Drives a dataset migration from a source Context to a destination Context.
pub struct MigrationEngine<'a> {
    api: &'a dyn CatalogApi,
}

impl<'a> MigrationEngine<'a> {
    pub fn new(api: &'a dyn CatalogApi) -> Self {
        Self { api }
    }

    /// Clone the source dataset graph onto the destination.
    ///
    /// Returns `Err` only for fatal resolution failures; per-resource failures are
    /// collected into the `RunResult`.
    pub async fn migrate(
        &self,
        source: &mut Context,
        destination: &mut Context,
        options: &MigrateOptions,
    ) -> Result<RunResult, MigrationError> {
        let started = Instant::now();

        // Step 1: Resolve source organization and dataset
        source.organization = Some(self.resolve_organization(source).await?);

        let dataset_ref = source
            .dataset_ref()
            .or_else(|| source.dataset.as_ref().map(|d| d.name.as_str()))
            .map(str::to_string)
            .ok_or_else(|| MigrationError::fatal_message("dataset", "", "source context names no dataset"))?;

        let raw_source = match self.api.show_dataset(source, &dataset_ref).await {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => {
                warn!("Source dataset '{}' not found, nothing to migrate", dataset_ref);
                return Ok(RunResult::not_found(dataset_ref).finish(started.elapsed()));
            }
            Err(e) => return Err(MigrationError::fatal("dataset", dataset_ref, e)),
        };
        let source_dataset = normalize_dataset(&raw_source);
        let source_resources = normalize_resources(&raw_source);
        info!(
            "Resolved source dataset '{}' with {} resources",
            source_dataset.name,
            source_resources.len()
        );
        source.dataset = Some(source_dataset.clone());
        source.resources = Some(source_resources.clone());

        // Step 2: Resolve destination organization
        let destination_org = self.resolve_organization(destination).await?;
        let destination_org_id = destination_org.id.clone().ok_or_else(|| {
            MigrationError::fatal_message("organization", destination.organization_ref(), "organization has no id")
        })?;
        destination.organization = Some(destination_org);

        // Step 3: Upsert the dataset
        let mut result = RunResult::new(dataset_ref);
        let mode = self
            .upsert_dataset(&source_dataset, destination, &destination_org_id)
            .await?;
        result.dataset_mode = Some(mode);
        result.dataset_id = destination.dataset_id().map(str::to_string);

        // Step 4: Resources, one at a time in source order
        for resource in &source_resources {
            let outcome = self.migrate_resource(source, destination, resource).await;
            match &outcome.status {
                ResourceStatus::Failed(e) => warn!("Resource '{}' failed: {}", resource.name, e),
                status => info!("Resource '{}' {}", resource.name, status.label()),
            }
            result.outcomes.push(outcome);
        }

        // Step 5: Publish only a complete dataset
        if options.publish {
            let failed = result.failures().count();
            if failed > 0 {
                warn!("Not publishing '{}': {} resources failed", source_dataset.name, failed);
            } else if let Some(dataset_id) = destination.dataset_id().map(str::to_string) {
                match self.api.patch_dataset_visibility(destination, &dataset_id, false).await {
                    Ok(_) => {
                        info!("Published dataset '{}'", source_dataset.name);
                        if let Some(dataset) = destination.dataset.as_mut() {
                            dataset.is_private = Some(false);
                        }
                        result.published = true;
                    }
                    Err(e) => {
                        result.dataset_error = Some(MigrationError::Publish {
                            dataset: source_dataset.name.clone(),
                            source: e,
                        })
                    }
                }
            }
        }

        let result = result.finish(started.elapsed());
        info!(
            "Migration of '{}' finished: {:?}, {} resources, {} failures in {:?}",
            result.dataset_ref,
            result.status,
            result.outcomes.len(),
            result.failure_count(),
            result.duration
        );
        Ok(result)
    }

    async fn resolve_organization(&self, ctx: &Context) -> Result<Organization, MigrationError> {
        let reference = ctx.organization_ref();
        let raw = self
            .api
            .show_organization(ctx, reference)
            .await
            .map_err(|e| MigrationError::fatal("organization", reference, e))?;
        let organization = normalize_organization(&raw);
        debug!("Resolved organization '{}' on {}", organization.name, ctx.base_url());
        Ok(organization)
    }

    /// Create or update the destination dataset and record it, plus its current
    /// resource listing, on the destination Context.
    async fn upsert_dataset(
        &self,
        source_dataset: &Dataset,
        destination: &mut Context,
        owner_org_id: &str,
    ) -> Result<UpsertMode, MigrationError> {
        let existing = match destination.dataset.clone().filter(|d| d.id.is_some()) {
            Some(dataset) => Some(dataset),
            None => {
                let lookup = destination
                    .dataset_ref()
                    .unwrap_or(&source_dataset.name)
                    .to_string();
                match self.api.show_dataset(destination, &lookup).await {
                    Ok(raw) => Some(normalize_dataset(&raw)),
                    Err(e) if e.is_not_found() => None,
                    Err(e) => return Err(MigrationError::fatal("destination dataset", lookup, e)),
                }
            }
        };

        // The destination name is the one the dataset is looked up by on the next run
        let mut payload = source_dataset.clone();
        payload.owner_org_id = Some(owner_org_id.to_string());
        let mode = match existing {
            Some(existing) => {
                if !existing.name.is_empty() {
                    payload.name = existing.name;
                }
                payload.id = existing.id;
                // Keep whatever visibility the destination already has
                payload.is_private = Some(existing.is_private.unwrap_or(true));
                UpsertMode::Update
            }
            None => {
                if let Some(dataset_ref) = destination.dataset_ref() {
                    payload.name = dataset_ref.to_string();
                }
                payload.id = None;
                payload.is_private = Some(true);
                UpsertMode::Create
            }
        };

        let raw = self
            .api
            .create_or_update_dataset(destination, &payload, mode)
            .await
            .map_err(|e| MigrationError::fatal("destination dataset", &payload.name, e))?;
        let dataset = normalize_dataset(&raw);
        if dataset.id.is_none() {
            return Err(MigrationError::fatal(
                "destination dataset",
                &source_dataset.name,
                CatalogError::invalid_result(mode_action(mode), "response carries no dataset id"),
            ));
        }

        info!("Dataset '{}' {}d on destination", dataset.name, mode);
        if destination.resources.is_none() {
            destination.resources = Some(normalize_resources(&raw));
        }
        destination.dataset = Some(dataset);
        Ok(mode)
    }

    async fn migrate_resource(&self, source: &Context, destination: &mut Context, resource: &Resource) -> ResourceOutcome {
        let existing_id = destination
            .find_resource(&resource.name)
            .and_then(|r| r.id.clone());
        let mode = if existing_id.is_some() { UpsertMode::Update } else { UpsertMode::Create };
        let mut outcome = ResourceOutcome::for_resource(resource, Some(mode));

        match self.transfer_resource(source, destination, resource, existing_id).await {
            Ok((destination_id, table_rows)) => {
                remember_resource(destination, resource, &destination_id);
                outcome.destination_id = Some(destination_id);
                outcome.table_rows = table_rows;
                outcome.status = match mode {
                    UpsertMode::Create => ResourceStatus::Created,
                    UpsertMode::Update => ResourceStatus::Updated,
                };
            }
            Err(e) => outcome.status = ResourceStatus::Failed(e),
        }
        outcome
    }

    async fn transfer_resource(
        &self,
        source: &Context,
        destination: &Context,
        resource: &Resource,
        existing_id: Option<String>,
    ) -> Result<(String, Option<usize>), MigrationError> {
        let package_id = destination.dataset_id().map(str::to_string).ok_or_else(|| {
            MigrationError::transfer(
                &resource.name,
                CatalogError::precondition(actions::RESOURCE_CREATE, "destination dataset has no id"),
            )
        })?;

        let staged = self.stage_resource(source, resource).await?;
        let table_rows = staged.table.as_ref().map(TabularTable::row_count);

        let destination_id = match (existing_id, staged.table) {
            // The table create call also creates the resource
            (None, Some(table)) => {
                let descriptor = resource.to_descriptor(&package_id);
                let destination_id = tabular::write_table(
                    self.api,
                    destination,
                    &resource.name,
                    TabularTarget::NewResource(descriptor),
                    table,
                )
                .await?;
                if let Some(file) = staged.file {
                    let write = ResourceWrite::attach_upload(&destination_id, resource);
                    self.api
                        .create_or_update_resource(destination, &write, Some(file))
                        .await
                        .map_err(|e| MigrationError::transfer(&resource.name, e))?;
                }
                destination_id
            }
            (existing_id, table) => {
                let write = match &existing_id {
                    Some(id) => ResourceWrite::update(id, resource),
                    None => ResourceWrite::create(&package_id, resource),
                };
                let raw = self
                    .api
                    .create_or_update_resource(destination, &write, staged.file)
                    .await
                    .map_err(|e| MigrationError::transfer(&resource.name, e))?;
                let destination_id = existing_id
                    .or_else(|| raw.get("id").and_then(Value::as_str).map(str::to_string))
                    .ok_or_else(|| {
                        MigrationError::transfer(
                            &resource.name,
                            CatalogError::invalid_result(actions::RESOURCE_CREATE, "response carries no resource id"),
                        )
                    })?;

                if let Some(table) = table {
                    tabular::write_table(
                        self.api,
                        destination,
                        &resource.name,
                        TabularTarget::ExistingResource(destination_id.clone()),
                        table,
                    )
                    .await?;
                }
                destination_id
            }
        };

        Ok((destination_id, table_rows))
    }

    /// Read everything the resource needs from the source before any write
    async fn stage_resource(&self, source: &Context, resource: &Resource) -> Result<StagedResource, MigrationError> {
        let file = if resource.is_upload() {
            let url = resource.url.as_deref().ok_or_else(|| {
                MigrationError::transfer(
                    &resource.name,
                    CatalogError::precondition(actions::FILE_DOWNLOAD, "upload resource has no url"),
                )
            })?;
            let content = self
                .api
                .fetch_file(source, url)
                .await
                .map_err(|e| MigrationError::transfer(&resource.name, e))?;
            debug!("Fetched {} bytes for '{}'", content.len(), resource.name);
            Some(FileUpload::from_source_url(url, content))
        } else {
            None
        };

        let table = if resource.datastore_active {
            Some(tabular::read_table(self.api, source, resource).await?)
        } else {
            None
        };

        Ok(StagedResource { file, table })
    }
}

fn mode_action(mode: UpsertMode) -> &'static str {
    match mode {
        UpsertMode::Create => actions::PACKAGE_CREATE,
        UpsertMode::Update => actions::PACKAGE_UPDATE,
    }
}

/// Record a landed resource so later same-named source resources update it
fn remember_resource(destination: &mut Context, resource: &Resource, destination_id: &str) {
    let resources = destination.resources.get_or_insert_with(Vec::new);
    if let Some(existing) = resources.iter_mut().find(|r| r.name == resource.name) {
        existing.id = Some(destination_id.to_string());
        existing.datastore_active = existing.datastore_active || resource.datastore_active;
        return;
    }

    resources.push(Resource {
        id: Some(destination_id.to_string()),
        name: resource.name.clone(),
        format: resource.format.clone(),
        datastore_active: resource.datastore_active,
        ..Default::default()
    });
}
