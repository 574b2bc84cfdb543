//! Projection of raw catalog responses onto entity shapes.
//!
//! Each entity has a declared allow-list of wire fields. Anything else the server
//! returns (revision ids, audit timestamps, internal flags, nested extras) is dropped
//! here so the shapes can be reused as payloads against another instance.

use super::models::{Dataset, Organization, Resource, UrlType};
use serde_json::Value;

pub const ORGANIZATION_FIELDS: &[&str] = &["id", "name", "title", "description"];

pub const DATASET_FIELDS: &[&str] = &[
    "id",
    "name",
    "title",
    "notes",
    "collection_method",
    "excerpt",
    "limitations",
    "information_url",
    "dataset_category",
    "is_retired",
    "refresh_rate",
    "topics",
    "owner_division",
    "owner_section",
    "owner_unit",
    "owner_email",
    "image_url",
    "owner_org",
    "private",
];

pub const RESOURCE_FIELDS: &[&str] = &[
    "id",
    "name",
    "description",
    "datastore_active",
    "url",
    "url_type",
    "extract_job",
    "format",
];

pub fn normalize_organization(raw: &Value) -> Organization {
    let fields = Projection::new(raw, ORGANIZATION_FIELDS);
    Organization {
        id: fields.string("id"),
        name: fields.string("name").unwrap_or_default(),
        title: fields.string("title"),
        description: fields.string("description"),
    }
}

pub fn normalize_dataset(raw: &Value) -> Dataset {
    let fields = Projection::new(raw, DATASET_FIELDS);
    Dataset {
        id: fields.string("id"),
        name: fields.string("name").unwrap_or_default(),
        title: fields.string("title"),
        notes: fields.string("notes"),
        collection_method: fields.string("collection_method"),
        excerpt: fields.string("excerpt"),
        limitations: fields.string("limitations"),
        information_url: fields.string("information_url"),
        category: fields.string("dataset_category"),
        is_retired: fields.boolean("is_retired"),
        refresh_rate: fields.string("refresh_rate"),
        topics: fields.raw("topics"),
        owner_division: fields.string("owner_division"),
        owner_section: fields.string("owner_section"),
        owner_unit: fields.string("owner_unit"),
        owner_email: fields.string("owner_email"),
        image_url: fields.string("image_url"),
        owner_org_id: fields.string("owner_org"),
        is_private: fields.boolean("private"),
    }
}

pub fn normalize_resource(raw: &Value) -> Resource {
    let fields = Projection::new(raw, RESOURCE_FIELDS);
    Resource {
        id: fields.string("id"),
        name: fields.string("name").unwrap_or_default(),
        description: fields.string("description"),
        datastore_active: fields.boolean("datastore_active").unwrap_or(false),
        url: fields.string("url"),
        url_type: fields.string("url_type").as_deref().and_then(UrlType::parse),
        extract_job: fields.string("extract_job"),
        format: fields.string("format"),
    }
}

/// Resources listed inside a `package_show` result, in listing order
pub fn normalize_resources(raw_dataset: &Value) -> Vec<Resource> {
    raw_dataset
        .get("resources")
        .and_then(Value::as_array)
        .map(|resources| resources.iter().map(normalize_resource).collect())
        .unwrap_or_default()
}

/// Read-only view over the allow-listed keys of one JSON object
struct Projection<'a> {
    raw: &'a Value,
    allowed: &'static [&'static str],
}

impl<'a> Projection<'a> {
    fn new(raw: &'a Value, allowed: &'static [&'static str]) -> Self {
        Self { raw, allowed }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        debug_assert!(self.allowed.contains(&key), "field '{}' is not allow-listed", key);
        if !self.allowed.contains(&key) {
            return None;
        }
        match self.raw.get(key) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn raw(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }

    fn string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn boolean(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}
