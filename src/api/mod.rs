//! CKAN action API module
//!
//! Typed access to one catalog instance's action endpoints. The `CatalogApi` trait is
//! the seam the orchestrators are written against; `CatalogClient` is the HTTP
//! implementation.

pub mod client;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;

pub use client::{CatalogClient, ClientSettings};
pub use error::CatalogError;
pub use logging::{ApiLogger, LogLevel, MonitoringConfig};
pub use models::{
    Context, ContextError, Dataset, DatastoreSearch, FileUpload, Organization, Resource, ResourceWrite,
    SearchParams, TabularCreate, TabularTable, TabularTarget, UpsertMode, UrlType,
};

use async_trait::async_trait;
use serde_json::Value;

/// One method per catalog action.
///
/// Every call takes the `Context` that names the instance and carries its API key,
/// and returns the `result` member of a successful response.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn show_organization(&self, ctx: &Context, name_or_id: &str) -> error::Result<Value>;

    async fn show_dataset(&self, ctx: &Context, id_or_slug: &str) -> error::Result<Value>;

    /// `package_create` or `package_update` depending on `mode`
    async fn create_or_update_dataset(&self, ctx: &Context, dataset: &Dataset, mode: UpsertMode)
        -> error::Result<Value>;

    /// `resource_create` or `resource_patch`, optionally with an uploaded file
    async fn create_or_update_resource(
        &self,
        ctx: &Context,
        write: &ResourceWrite,
        file: Option<FileUpload>,
    ) -> error::Result<Value>;

    async fn search_tabular(&self, ctx: &Context, resource_id: &str, params: SearchParams)
        -> error::Result<DatastoreSearch>;

    async fn create_tabular(&self, ctx: &Context, payload: &TabularCreate) -> error::Result<Value>;

    async fn delete_tabular(&self, ctx: &Context, resource_id: &str) -> error::Result<Value>;

    async fn delete_resource(&self, ctx: &Context, resource_id: &str) -> error::Result<Value>;

    async fn purge_dataset(&self, ctx: &Context, dataset_id: &str) -> error::Result<Value>;

    async fn patch_dataset_visibility(&self, ctx: &Context, dataset_id: &str, is_private: bool)
        -> error::Result<Value>;

    /// Download the bytes behind an uploaded resource URL
    async fn fetch_file(&self, ctx: &Context, url: &str) -> error::Result<Vec<u8>>;
}
