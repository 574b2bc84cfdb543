//! Datastore table migration for one resource.
//!
//! Rows are fetched in a single `datastore_search` call sized from a zero-row probe;
//! there is no paging, so the whole table is held in memory for the duration of one
//! resource's migration. A fetch that comes back short of the probed total fails the
//! resource instead of writing a partial table.

use super::error::{MigrationError, TabularStage};
use crate::api::constants::actions;
use crate::api::{CatalogApi, CatalogError, Context, Resource, SearchParams, TabularCreate, TabularTable, TabularTarget};
use log::{debug, info, warn};
use serde_json::Value;

/// Read a source resource's table with the `_id` column removed
pub async fn read_table(api: &dyn CatalogApi, source: &Context, resource: &Resource) -> Result<TabularTable, MigrationError> {
    let resource_id = resource.id.as_deref().ok_or_else(|| {
        MigrationError::tabular(
            &resource.name,
            TabularStage::Discovering,
            CatalogError::precondition(actions::DATASTORE_SEARCH, "source resource has no id"),
        )
    })?;

    let probe = api
        .search_tabular(source, resource_id, SearchParams::probe())
        .await
        .map_err(|e| MigrationError::tabular(&resource.name, TabularStage::Discovering, e))?;
    let total = probe.total.unwrap_or(0);
    debug!("Datastore table for '{}' has {} rows", resource.name, total);

    let search = if total == 0 {
        probe
    } else {
        api.search_tabular(source, resource_id, SearchParams::all_rows(total))
            .await
            .map_err(|e| MigrationError::tabular(&resource.name, TabularStage::Fetching, e))?
    };

    // The store caps `limit` at its configured maximum without saying so
    let returned = search.records.len() as u64;
    if returned != total {
        warn!(
            "Datastore for '{}' reported {} rows but returned {}",
            resource.name, total, returned
        );
        return Err(MigrationError::tabular(
            &resource.name,
            TabularStage::Fetching,
            CatalogError::invalid_result(
                actions::DATASTORE_SEARCH,
                format!("returned {} of {} rows", returned, total),
            ),
        ));
    }

    let mut table = TabularTable::new(search.fields, search.records);
    table.strip_row_ids();
    Ok(table)
}

/// Write a table to the destination and return the id of the resource holding it.
///
/// A new resource is created by the same `datastore_create` call. An existing
/// resource has its table dropped first since the store cannot replace a schema in
/// place.
pub async fn write_table(
    api: &dyn CatalogApi,
    destination: &Context,
    resource_name: &str,
    target: TabularTarget,
    table: TabularTable,
) -> Result<String, MigrationError> {
    if let TabularTarget::ExistingResource(resource_id) = &target {
        match api.delete_tabular(destination, resource_id).await {
            Ok(_) => debug!("Dropped destination table for '{}'", resource_name),
            Err(e) if e.is_not_found() => debug!("No destination table to drop for '{}'", resource_name),
            Err(e) => return Err(MigrationError::tabular(resource_name, TabularStage::Deleting, e)),
        }
    }

    let rows = table.row_count();
    let payload = TabularCreate { target, table };
    let result = api
        .create_tabular(destination, &payload)
        .await
        .map_err(|e| MigrationError::tabular(resource_name, TabularStage::Creating, e))?;

    let resource_id = match &payload.target {
        TabularTarget::ExistingResource(resource_id) => resource_id.clone(),
        TabularTarget::NewResource(_) => result
            .get("resource_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                MigrationError::tabular(
                    resource_name,
                    TabularStage::Creating,
                    CatalogError::invalid_result(actions::DATASTORE_CREATE, "response carries no resource_id"),
                )
            })?,
    };

    info!("Wrote {} rows to datastore table of '{}' ({})", rows, resource_name, resource_id);
    Ok(resource_id)
}
