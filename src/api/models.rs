//! Entity shapes shared by the client and the orchestrators

use super::constants::{DATASTORE_ROW_ID, form_fields};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// Whether a write creates a new entity or updates an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertMode {
    Create,
    Update,
}

impl UpsertMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertMode::Create => "create",
            UpsertMode::Update => "update",
        }
    }
}

impl fmt::Display for UpsertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Organization reference must not be empty")]
    MissingOrganization,
}

/// Handle on one catalog instance: where it lives, how to authenticate, and the
/// entity graph resolved from it during a run.
#[derive(Clone)]
pub struct Context {
    base_url: String,
    api_key: String,
    organization_ref: String,
    dataset_ref: Option<String>,
    pub organization: Option<Organization>,
    pub dataset: Option<Dataset>,
    pub resources: Option<Vec<Resource>>,
}

impl Context {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        organization_ref: impl Into<String>,
    ) -> Result<Self, ContextError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        let parsed = reqwest::Url::parse(&base_url).map_err(|e| ContextError::InvalidBaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ContextError::InvalidBaseUrl {
                url: base_url,
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        let organization_ref = organization_ref.into().trim().to_string();
        if organization_ref.is_empty() {
            return Err(ContextError::MissingOrganization);
        }

        Ok(Self {
            base_url,
            api_key: api_key.into().trim().to_string(),
            organization_ref,
            dataset_ref: None,
            organization: None,
            dataset: None,
            resources: None,
        })
    }

    /// Name or id of the dataset this context reads, reuses or deletes
    pub fn with_dataset_ref(mut self, dataset_ref: impl Into<String>) -> Self {
        let dataset_ref = dataset_ref.into();
        self.dataset_ref = if dataset_ref.trim().is_empty() {
            None
        } else {
            Some(dataset_ref.trim().to_string())
        };
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        if self.api_key.is_empty() {
            None
        } else {
            Some(&self.api_key)
        }
    }

    pub fn organization_ref(&self) -> &str {
        &self.organization_ref
    }

    pub fn dataset_ref(&self) -> Option<&str> {
        self.dataset_ref.as_deref()
    }

    /// Id of the resolved dataset, if any
    pub fn dataset_id(&self) -> Option<&str> {
        self.dataset.as_ref().and_then(|d| d.id.as_deref())
    }

    /// Find a resolved resource by name
    pub fn find_resource(&self, name: &str) -> Option<&Resource> {
        self.resources
            .as_ref()
            .and_then(|resources| resources.iter().find(|r| r.name == name))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "<none>" } else { "<redacted>" })
            .field("organization_ref", &self.organization_ref)
            .field("dataset_ref", &self.dataset_ref)
            .field("organization", &self.organization)
            .field("dataset", &self.dataset)
            .field("resources", &self.resources)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A dataset (CKAN package). Field names on the wire follow the catalog schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limitations: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub information_url: Option<String>,
    #[serde(rename = "dataset_category", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_retired: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_rate: Option<String>,
    /// Kept as raw JSON, instances disagree on list vs comma separated string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_division: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "owner_org", skip_serializing_if = "Option::is_none")]
    pub owner_org_id: Option<String>,
    #[serde(rename = "private", skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
}

impl Dataset {
    /// Build a `package_create` / `package_update` body.
    ///
    /// Create never carries an id so the server assigns one.
    pub fn to_payload(&self, mode: UpsertMode) -> serde_json::Result<Value> {
        let mut payload = serde_json::to_value(self)?;
        if mode == UpsertMode::Create {
            if let Value::Object(ref mut map) = payload {
                map.remove("id");
            }
        }
        Ok(payload)
    }
}

/// How a resource's file is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlType {
    Link,
    Upload,
    Other(String),
}

impl UrlType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "" => None,
            "link" => Some(UrlType::Link),
            "upload" => Some(UrlType::Upload),
            other => Some(UrlType::Other(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            UrlType::Link => "link",
            UrlType::Upload => "upload",
            UrlType::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resource {
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub datastore_active: bool,
    pub url: Option<String>,
    pub url_type: Option<UrlType>,
    pub extract_job: Option<String>,
    pub format: Option<String>,
}

impl Resource {
    pub fn is_upload(&self) -> bool {
        matches!(self.url_type, Some(UrlType::Upload))
    }

    /// Descriptor used when `datastore_create` creates the resource itself
    pub fn to_descriptor(&self, package_id: &str) -> Value {
        let mut map = Map::new();
        map.insert(form_fields::PACKAGE_ID.to_string(), json!(package_id));
        map.insert(form_fields::NAME.to_string(), json!(self.name));
        if let Some(format) = &self.format {
            map.insert(form_fields::FORMAT.to_string(), json!(format));
        }
        if let Some(description) = &self.description {
            map.insert(form_fields::DESCRIPTION.to_string(), json!(description));
        }
        if let Some(extract_job) = &self.extract_job {
            map.insert("extract_job".to_string(), json!(extract_job));
        }
        if !self.is_upload() {
            if let Some(url) = &self.url {
                map.insert(form_fields::URL.to_string(), json!(url));
            }
        }
        Value::Object(map)
    }
}

/// Metadata half of a `resource_create` / `resource_patch` multipart request
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceWrite {
    pub mode: UpsertMode,
    /// Owning package id on create, the resource's own id on update
    pub target_id: String,
    pub name: String,
    pub format: Option<String>,
    pub description: Option<String>,
    /// Forwarded URL; `None` when the file travels as an upload part
    pub url: Option<String>,
}

impl ResourceWrite {
    pub fn create(package_id: impl Into<String>, resource: &Resource) -> Self {
        Self::build(UpsertMode::Create, package_id.into(), resource)
    }

    pub fn update(resource_id: impl Into<String>, resource: &Resource) -> Self {
        Self::build(UpsertMode::Update, resource_id.into(), resource)
    }

    /// Patch that only attaches an uploaded file to an existing resource
    pub fn attach_upload(resource_id: impl Into<String>, resource: &Resource) -> Self {
        let mut write = Self::build(UpsertMode::Update, resource_id.into(), resource);
        write.url = None;
        write
    }

    fn build(mode: UpsertMode, target_id: String, resource: &Resource) -> Self {
        Self {
            mode,
            target_id,
            name: resource.name.clone(),
            format: resource.format.clone(),
            description: resource.description.clone(),
            url: if resource.is_upload() { None } else { resource.url.clone() },
        }
    }

    /// Form field carrying `target_id`
    pub fn target_field(&self) -> &'static str {
        match self.mode {
            UpsertMode::Create => form_fields::PACKAGE_ID,
            UpsertMode::Update => form_fields::ID,
        }
    }

    /// Text fields in submission order
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            (self.target_field(), self.target_id.clone()),
            (form_fields::NAME, self.name.clone()),
            (form_fields::FORMAT, self.format.clone().unwrap_or_default()),
        ];
        if let Some(description) = &self.description {
            fields.push((form_fields::DESCRIPTION, description.clone()));
        }
        if let Some(url) = &self.url {
            fields.push((form_fields::URL, url.clone()));
        }
        fields
    }
}

/// File bytes re-uploaded to the destination's file storage
#[derive(Clone, PartialEq)]
pub struct FileUpload {
    pub file_name: String,
    pub content: Vec<u8>,
}

impl FileUpload {
    /// Name the blob after the last path segment of its source URL
    pub fn from_source_url(url: &str, content: Vec<u8>) -> Self {
        let file_name = url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("upload")
            .to_string();
        Self { file_name, content }
    }
}

impl fmt::Debug for FileUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileUpload")
            .field("file_name", &self.file_name)
            .field("bytes", &self.content.len())
            .finish()
    }
}

/// Parameters for `datastore_search`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub limit: u64,
    pub include_total: bool,
}

impl SearchParams {
    /// Zero-row probe that only reports fields and the row count
    pub fn probe() -> Self {
        Self { limit: 0, include_total: true }
    }

    pub fn all_rows(total: u64) -> Self {
        Self { limit: total, include_total: false }
    }
}

/// `result` of a `datastore_search` call
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DatastoreSearch {
    #[serde(default)]
    pub fields: Vec<Value>,
    #[serde(default)]
    pub records: Vec<Value>,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Field descriptors plus rows of one datastore table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularTable {
    pub fields: Vec<Value>,
    pub records: Vec<Value>,
}

impl TabularTable {
    pub fn new(fields: Vec<Value>, records: Vec<Value>) -> Self {
        Self { fields, records }
    }

    /// Drop the store-assigned `_id` column from the schema and from every row
    pub fn strip_row_ids(&mut self) {
        self.fields
            .retain(|field| field.get("id").and_then(Value::as_str) != Some(DATASTORE_ROW_ID));
        for field in &mut self.fields {
            if let Value::Object(map) = field {
                map.remove(DATASTORE_ROW_ID);
            }
        }
        for record in &mut self.records {
            if let Value::Object(map) = record {
                map.remove(DATASTORE_ROW_ID);
            }
        }
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}

/// Where `datastore_create` should put the table
#[derive(Debug, Clone, PartialEq)]
pub enum TabularTarget {
    /// Create the resource from this descriptor in the same call
    NewResource(Value),
    /// Fill the table of a resource that already exists
    ExistingResource(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabularCreate {
    pub target: TabularTarget,
    pub table: TabularTable,
}

impl TabularCreate {
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "fields": self.table.fields,
            "records": self.table.records,
            "force": true,
        });
        match &self.target {
            TabularTarget::NewResource(descriptor) => {
                payload["resource"] = descriptor.clone();
            }
            TabularTarget::ExistingResource(resource_id) => {
                payload["resource_id"] = json!(resource_id);
            }
        }
        payload
    }
}
