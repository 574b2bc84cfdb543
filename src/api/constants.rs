//! API Constants for the CKAN action API

/// Path segment every action lives under, relative to the instance base URL
pub const ACTION_PATH: &str = "action";

/// Action verbs understood by the remote catalog.
///
/// These names are part of the wire contract and must not change.
pub mod actions {
    pub const ORGANIZATION_SHOW: &str = "organization_show";

    pub const PACKAGE_SHOW: &str = "package_show";
    pub const PACKAGE_CREATE: &str = "package_create";
    pub const PACKAGE_UPDATE: &str = "package_update";
    pub const PACKAGE_PATCH: &str = "package_patch";
    pub const DATASET_PURGE: &str = "dataset_purge";

    pub const RESOURCE_CREATE: &str = "resource_create";
    pub const RESOURCE_PATCH: &str = "resource_patch";
    pub const RESOURCE_DELETE: &str = "resource_delete";

    pub const DATASTORE_SEARCH: &str = "datastore_search";
    pub const DATASTORE_CREATE: &str = "datastore_create";
    pub const DATASTORE_DELETE: &str = "datastore_delete";

    /// Pseudo action used when downloading an uploaded file from its storage URL
    pub const FILE_DOWNLOAD: &str = "file_download";
}

/// Standard headers for catalog requests
pub mod headers {
    /// Content type for JSON requests
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// Header carrying the per-instance API key
    pub const AUTHORIZATION: &str = "Authorization";

    /// Value substituted for secrets when headers are logged
    pub const REDACTED: &str = "<redacted>";
}

/// Multipart form field names used by resource writes
pub mod form_fields {
    pub const ID: &str = "id";
    pub const PACKAGE_ID: &str = "package_id";
    pub const NAME: &str = "name";
    pub const FORMAT: &str = "format";
    pub const DESCRIPTION: &str = "description";
    pub const URL: &str = "url";
    pub const UPLOAD: &str = "upload";
}

/// Column the datastore injects into every table
pub const DATASTORE_ROW_ID: &str = "_id";

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("ckan-migrate/", env!("CARGO_PKG_VERSION"));

/// Build full action endpoint URL
pub fn action_endpoint(base_url: &str, action: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), ACTION_PATH, action)
}
