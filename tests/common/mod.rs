//! In-memory catalog used by the orchestrator tests.
//!
//! `FakeCatalog` serves any number of instances keyed by base URL, records every
//! call in order and can be told to fail specific calls.

#![allow(dead_code)]

use async_trait::async_trait;
use ckan_migrate::api::{
    CatalogApi, CatalogError, Context, Dataset, DatastoreSearch, FileUpload, ResourceWrite, SearchParams,
    TabularCreate, UpsertMode,
};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

pub const SOURCE_URL: &str = "https://source.example.org/api/3";
pub const DEST_URL: &str = "https://dest.example.org/api/3";

/// One recorded catalog call
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub instance: String,
    pub action: &'static str,
    /// Id, name or URL the call was about
    pub target: String,
    pub body: Value,
}

#[derive(Default)]
struct Instance {
    organizations: Vec<Value>,
    datasets: Vec<Value>,
    tables: HashMap<String, (Vec<Value>, Vec<Value>)>,
}

struct Failure {
    action: &'static str,
    target: String,
    error: CatalogError,
}

#[derive(Default)]
struct State {
    instances: HashMap<String, Instance>,
    files: HashMap<String, Vec<u8>>,
    calls: Vec<Call>,
    failures: Vec<Failure>,
    /// Most rows one `datastore_search` returns, whatever `limit` asks for
    row_cap: Option<u64>,
    next_id: u64,
}

#[derive(Default)]
pub struct FakeCatalog {
    state: Mutex<State>,
}

fn not_found(action: &str, what: &str) -> CatalogError {
    CatalogError::new(404, action, format!("Not found: {}", what))
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn instance(&mut self, base_url: &str) -> &mut Instance {
        self.instances.entry(base_url.to_string()).or_default()
    }

    fn record(&mut self, ctx: &Context, action: &'static str, target: &str, body: Value) -> Result<(), CatalogError> {
        self.calls.push(Call {
            instance: ctx.base_url().to_string(),
            action,
            target: target.to_string(),
            body,
        });
        match self
            .failures
            .iter()
            .find(|f| f.action == action && f.target == target)
        {
            Some(failure) => Err(failure.error.clone()),
            None => Ok(()),
        }
    }
}

impl Instance {
    fn dataset_mut(&mut self, id_or_name: &str) -> Option<&mut Value> {
        self.datasets
            .iter_mut()
            .find(|d| d["id"] == id_or_name || d["name"] == id_or_name)
    }

    fn resource_mut(&mut self, resource_id: &str) -> Option<&mut Value> {
        self.datasets
            .iter_mut()
            .filter_map(|d| d["resources"].as_array_mut())
            .flatten()
            .find(|r| r["id"] == resource_id)
    }
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_organization(&self, base_url: &str, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .instance(base_url)
            .organizations
            .push(json!({ "id": id, "name": name, "title": name, "description": "" }));
    }

    /// Seed a full `package_show` result, resources included
    pub fn seed_dataset(&self, base_url: &str, dataset: Value) {
        let mut state = self.state.lock().unwrap();
        state.instance(base_url).datasets.push(dataset);
    }

    pub fn seed_table(&self, base_url: &str, resource_id: &str, fields: Vec<Value>, records: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        state
            .instance(base_url)
            .tables
            .insert(resource_id.to_string(), (fields, records));
    }

    pub fn seed_file(&self, url: &str, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(url.to_string(), content.to_vec());
    }

    /// Fail every `action` call about `target` with `status`
    pub fn fail_on(&self, action: &'static str, target: &str, status: u16) {
        let mut state = self.state.lock().unwrap();
        state.failures.push(Failure {
            action,
            target: target.to_string(),
            error: CatalogError::new(status, action, "injected failure"),
        });
    }

    /// Silently cap search results like `ckan.datastore.search.rows_max` does
    pub fn cap_rows(&self, max: u64) {
        self.state.lock().unwrap().row_cap = Some(max);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Actions called against one instance, in order
    pub fn actions(&self, base_url: &str) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter(|c| c.instance == base_url)
            .map(|c| c.action)
            .collect()
    }

    pub fn dataset(&self, base_url: &str, id_or_name: &str) -> Option<Value> {
        let mut state = self.state.lock().unwrap();
        state.instance(base_url).dataset_mut(id_or_name).cloned()
    }

    pub fn table(&self, base_url: &str, resource_id: &str) -> Option<(Vec<Value>, Vec<Value>)> {
        let mut state = self.state.lock().unwrap();
        state.instance(base_url).tables.get(resource_id).cloned()
    }

    pub fn file(&self, url: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(url).cloned()
    }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
    async fn show_organization(&self, ctx: &Context, name_or_id: &str) -> Result<Value, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "organization_show", name_or_id, Value::Null)?;
        state
            .instance(ctx.base_url())
            .organizations
            .iter()
            .find(|o| o["id"] == name_or_id || o["name"] == name_or_id)
            .cloned()
            .ok_or_else(|| not_found("organization_show", name_or_id))
    }

    async fn show_dataset(&self, ctx: &Context, id_or_slug: &str) -> Result<Value, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "package_show", id_or_slug, Value::Null)?;
        state
            .instance(ctx.base_url())
            .dataset_mut(id_or_slug)
            .cloned()
            .ok_or_else(|| not_found("package_show", id_or_slug))
    }

    async fn create_or_update_dataset(
        &self,
        ctx: &Context,
        dataset: &Dataset,
        mode: UpsertMode,
    ) -> Result<Value, CatalogError> {
        let action = match mode {
            UpsertMode::Create => "package_create",
            UpsertMode::Update => "package_update",
        };
        let payload = dataset.to_payload(mode).map_err(|e| CatalogError::precondition(action, e.to_string()))?;
        let mut state = self.state.lock().unwrap();
        state.record(ctx, action, &dataset.name, payload.clone())?;

        match mode {
            UpsertMode::Create => {
                if state.instance(ctx.base_url()).dataset_mut(&dataset.name).is_some() {
                    return Err(CatalogError::new(409, action, "That URL is already in use."));
                }
                let id = state.id("ds");
                let mut created = payload;
                created["id"] = json!(id);
                created["resources"] = json!([]);
                state.instance(ctx.base_url()).datasets.push(created.clone());
                Ok(created)
            }
            UpsertMode::Update => {
                let id = dataset.id.clone().unwrap_or_default();
                let existing = state
                    .instance(ctx.base_url())
                    .dataset_mut(&id)
                    .ok_or_else(|| not_found(action, &id))?;
                let resources = existing["resources"].take();
                *existing = payload;
                existing["resources"] = resources;
                Ok(existing.clone())
            }
        }
    }

    async fn create_or_update_resource(
        &self,
        ctx: &Context,
        write: &ResourceWrite,
        file: Option<FileUpload>,
    ) -> Result<Value, CatalogError> {
        let action = match write.mode {
            UpsertMode::Create => "resource_create",
            UpsertMode::Update => "resource_patch",
        };
        let mut body: Map<String, Value> = write
            .text_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        if let Some(file) = &file {
            body.insert("upload".to_string(), json!(file.file_name));
        }

        let mut state = self.state.lock().unwrap();
        state.record(ctx, action, &write.name, Value::Object(body))?;
        let base = ctx.base_url().to_string();

        let resource_id = match write.mode {
            UpsertMode::Create => {
                let id = state.id("res");
                let dataset = state
                    .instance(&base)
                    .dataset_mut(&write.target_id)
                    .ok_or_else(|| not_found(action, &write.target_id))?;
                let resource = json!({
                    "id": id,
                    "package_id": dataset["id"],
                    "name": write.name,
                    "format": write.format,
                    "description": write.description,
                    "url": write.url.clone().unwrap_or_default(),
                    "url_type": "",
                    "datastore_active": false,
                    "created": "2024-01-01T00:00:00",
                });
                dataset["resources"]
                    .as_array_mut()
                    .ok_or_else(|| CatalogError::new(500, action, "dataset without resources"))?
                    .push(resource);
                id
            }
            UpsertMode::Update => write.target_id.clone(),
        };

        let upload_url = file
            .as_ref()
            .map(|f| format!("{}/download/{}/{}", base, resource_id, f.file_name));
        if let (Some(file), Some(url)) = (file, &upload_url) {
            state.files.insert(url.clone(), file.content);
        }

        let resource = state
            .instance(&base)
            .resource_mut(&resource_id)
            .ok_or_else(|| not_found(action, &resource_id))?;
        resource["name"] = json!(write.name);
        if let Some(format) = &write.format {
            resource["format"] = json!(format);
        }
        if let Some(description) = &write.description {
            resource["description"] = json!(description);
        }
        if let Some(url) = &write.url {
            resource["url"] = json!(url);
            resource["url_type"] = json!("");
        }
        if let Some(url) = upload_url {
            resource["url"] = json!(url);
            resource["url_type"] = json!("upload");
        }
        Ok(resource.clone())
    }

    async fn search_tabular(
        &self,
        ctx: &Context,
        resource_id: &str,
        params: SearchParams,
    ) -> Result<DatastoreSearch, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.record(
            ctx,
            "datastore_search",
            resource_id,
            json!({ "limit": params.limit, "include_total": params.include_total }),
        )?;
        let (fields, records) = state
            .instance(ctx.base_url())
            .tables
            .get(resource_id)
            .cloned()
            .ok_or_else(|| not_found("datastore_search", resource_id))?;

        let total = records.len() as u64;
        let row_cap = state.row_cap.unwrap_or(u64::MAX);
        let mut all_fields = vec![json!({ "id": "_id", "type": "int" })];
        all_fields.extend(fields);
        let rows = records
            .into_iter()
            .enumerate()
            .take(params.limit.min(row_cap) as usize)
            .map(|(i, mut row)| {
                row["_id"] = json!(i + 1);
                row
            })
            .collect();

        Ok(DatastoreSearch {
            fields: all_fields,
            records: rows,
            total: params.include_total.then_some(total),
        })
    }

    async fn create_tabular(&self, ctx: &Context, payload: &TabularCreate) -> Result<Value, CatalogError> {
        let action = "datastore_create";
        let body = payload.to_payload();
        let target = body["resource_id"]
            .as_str()
            .or_else(|| body["resource"]["name"].as_str())
            .unwrap_or_default()
            .to_string();

        let mut state = self.state.lock().unwrap();
        state.record(ctx, action, &target, body.clone())?;
        let base = ctx.base_url().to_string();

        if body["fields"]
            .as_array()
            .into_iter()
            .flatten()
            .any(|f| f["id"] == "_id")
        {
            return Err(CatalogError::new(409, action, "_id is a reserved column"));
        }

        let resource_id = match body["resource_id"].as_str() {
            Some(id) => {
                if state.instance(&base).tables.contains_key(id) {
                    return Err(CatalogError::new(409, action, "table already exists"));
                }
                id.to_string()
            }
            None => {
                let descriptor = &body["resource"];
                let package_id = descriptor["package_id"].as_str().unwrap_or_default().to_string();
                let id = state.id("res");
                let dataset = state
                    .instance(&base)
                    .dataset_mut(&package_id)
                    .ok_or_else(|| not_found(action, &package_id))?;
                let mut resource = descriptor.clone();
                resource["id"] = json!(id);
                resource["url_type"] = json!("");
                if resource.get("url").is_none() {
                    resource["url"] = json!("");
                }
                dataset["resources"]
                    .as_array_mut()
                    .ok_or_else(|| CatalogError::new(500, action, "dataset without resources"))?
                    .push(resource);
                id
            }
        };

        let resource = state
            .instance(&base)
            .resource_mut(&resource_id)
            .ok_or_else(|| not_found(action, &resource_id))?;
        resource["datastore_active"] = json!(true);

        let fields = body["fields"].as_array().cloned().unwrap_or_default();
        let records = body["records"].as_array().cloned().unwrap_or_default();
        state
            .instance(&base)
            .tables
            .insert(resource_id.clone(), (fields.clone(), records));
        Ok(json!({ "resource_id": resource_id, "fields": fields }))
    }

    async fn delete_tabular(&self, ctx: &Context, resource_id: &str) -> Result<Value, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "datastore_delete", resource_id, json!({ "force": true }))?;
        let instance = state.instance(ctx.base_url());
        instance
            .tables
            .remove(resource_id)
            .ok_or_else(|| not_found("datastore_delete", resource_id))?;
        if let Some(resource) = instance.resource_mut(resource_id) {
            resource["datastore_active"] = json!(false);
        }
        Ok(json!({ "resource_id": resource_id }))
    }

    async fn delete_resource(&self, ctx: &Context, resource_id: &str) -> Result<Value, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "resource_delete", resource_id, Value::Null)?;
        let instance = state.instance(ctx.base_url());
        for dataset in &mut instance.datasets {
            if let Some(resources) = dataset["resources"].as_array_mut() {
                let before = resources.len();
                resources.retain(|r| r["id"] != resource_id);
                if resources.len() != before {
                    return Ok(Value::Null);
                }
            }
        }
        Err(not_found("resource_delete", resource_id))
    }

    async fn purge_dataset(&self, ctx: &Context, dataset_id: &str) -> Result<Value, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "dataset_purge", dataset_id, Value::Null)?;
        let instance = state.instance(ctx.base_url());
        let before = instance.datasets.len();
        instance.datasets.retain(|d| d["id"] != dataset_id);
        if instance.datasets.len() == before {
            return Err(not_found("dataset_purge", dataset_id));
        }
        Ok(Value::Null)
    }

    async fn patch_dataset_visibility(
        &self,
        ctx: &Context,
        dataset_id: &str,
        is_private: bool,
    ) -> Result<Value, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "package_patch", dataset_id, json!({ "private": is_private }))?;
        let dataset = state
            .instance(ctx.base_url())
            .dataset_mut(dataset_id)
            .ok_or_else(|| not_found("package_patch", dataset_id))?;
        dataset["private"] = json!(is_private);
        Ok(dataset.clone())
    }

    async fn fetch_file(&self, ctx: &Context, url: &str) -> Result<Vec<u8>, CatalogError> {
        let mut state = self.state.lock().unwrap();
        state.record(ctx, "file_download", url, Value::Null)?;
        state
            .files
            .get(url)
            .cloned()
            .ok_or_else(|| not_found("file_download", url))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const TRAILS_UPLOAD_URL: &str = "https://source.example.org/dataset/ds-src/resource/src-csv/download/trails.csv";
pub const TRAILS_MAP_URL: &str = "https://maps.example.org/parks/trails";

/// Source `parks` organization with `trails-2024`: an uploaded, tabular `trails.csv`
/// holding 3 rows
pub fn seed_trails_source(catalog: &FakeCatalog) {
    catalog.seed_organization(SOURCE_URL, "org-src", "parks");
    catalog.seed_dataset(
        SOURCE_URL,
        json!({
            "id": "ds-src",
            "name": "trails-2024",
            "title": "Trails",
            "notes": "Hiking trails",
            "owner_org": "org-src",
            "private": false,
            "metadata_created": "2024-01-01T00:00:00",
            "resources": [
                {
                    "id": "src-csv",
                    "package_id": "ds-src",
                    "name": "trails.csv",
                    "format": "CSV",
                    "description": "All trails",
                    "url": TRAILS_UPLOAD_URL,
                    "url_type": "upload",
                    "datastore_active": true
                }
            ]
        }),
    );
    catalog.seed_table(
        SOURCE_URL,
        "src-csv",
        vec![json!({ "id": "trail", "type": "text" }), json!({ "id": "km", "type": "numeric" })],
        vec![
            json!({ "trail": "Ridge", "km": 4.2 }),
            json!({ "trail": "Lakeshore", "km": 7.5 }),
            json!({ "trail": "Summit", "km": 11.0 }),
        ],
    );
    catalog.seed_file(TRAILS_UPLOAD_URL, b"trail,km\nRidge,4.2\nLakeshore,7.5\nSummit,11.0\n");
}

/// Add a link resource, without a datastore table, to the source `trails-2024`
pub fn add_source_link(catalog: &FakeCatalog) {
    let mut state = catalog.state.lock().unwrap();
    if let Some(dataset) = state.instance(SOURCE_URL).dataset_mut("trails-2024") {
        if let Some(resources) = dataset["resources"].as_array_mut() {
            resources.push(json!({
                "id": "src-map",
                "package_id": "ds-src",
                "name": "trail map",
                "format": "HTML",
                "url": TRAILS_MAP_URL,
                "url_type": "",
                "datastore_active": false
            }));
        }
    }
}

pub fn seed_empty_destination(catalog: &FakeCatalog) {
    catalog.seed_organization(DEST_URL, "org-dest", "parks-mirror");
}

pub fn source_context() -> Context {
    Context::new(SOURCE_URL, "", "parks")
        .unwrap()
        .with_dataset_ref("trails-2024")
}

pub fn destination_context() -> Context {
    Context::new(DEST_URL, "dest-key", "parks-mirror").unwrap()
}
