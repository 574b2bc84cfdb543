use super::constants::{self, actions, form_fields, headers};
use super::error::{CatalogError, Result};
use super::logging::{ActionContext, ApiLogger, MonitoringConfig};
use super::models::{
    Context, Dataset, DatastoreSearch, FileUpload, ResourceWrite, SearchParams, TabularCreate, UpsertMode,
};
use super::CatalogApi;
use async_trait::async_trait;
use log::debug;
use reqwest::Url;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;

/// Longest server error body carried into a `CatalogError`
const MAX_ERROR_BODY: usize = 512;

/// HTTP client settings shared by every catalog instance a run talks to
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub monitoring: MonitoringConfig,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            // Single-shot datastore fetches can be large
            request_timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            monitoring: MonitoringConfig::default(),
        }
    }
}

/// CKAN action API client.
///
/// Holds no per-instance state: base URL and API key come from the `Context`
/// passed to each call, so one client serves both sides of a migration.
#[derive(Clone)]
pub struct CatalogClient {
    http_client: reqwest::Client,
    api_logger: ApiLogger,
}

impl CatalogClient {
    pub fn new(settings: &ClientSettings) -> std::result::Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .user_agent(constants::USER_AGENT)
            .build()?;

        Ok(Self::with_custom_client(http_client, settings.monitoring.clone()))
    }

    /// Create a client around an already configured HTTP client
    pub fn with_custom_client(http_client: reqwest::Client, monitoring: MonitoringConfig) -> Self {
        Self {
            http_client,
            api_logger: ApiLogger::new(monitoring),
        }
    }

    async fn get_action(&self, ctx: &Context, action: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = constants::action_endpoint(ctx.base_url(), action);
        let request = self.http_client.get(&url).query(query);
        self.send(ctx, action, "GET", &url, request).await
    }

    async fn post_action(&self, ctx: &Context, action: &str, body: &Value) -> Result<Value> {
        require_api_key(ctx, action)?;
        let url = constants::action_endpoint(ctx.base_url(), action);
        let request = self
            .http_client
            .post(&url)
            .header("Content-Type", headers::CONTENT_TYPE_JSON)
            .json(body);
        self.send(ctx, action, "POST", &url, request).await
    }

    async fn post_multipart(&self, ctx: &Context, action: &str, form: Form) -> Result<Value> {
        require_api_key(ctx, action)?;
        let url = constants::action_endpoint(ctx.base_url(), action);
        let request = self.http_client.post(&url).multipart(form);
        self.send(ctx, action, "POST", &url, request).await
    }

    /// Attach shared headers, send, and unwrap the `{ success, result }` envelope
    async fn send(
        &self,
        ctx: &Context,
        action: &str,
        method: &str,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value> {
        let context = self.api_logger.start_action(action, ctx.base_url());
        let request = authorize(request.header("Accept", headers::CONTENT_TYPE_JSON), ctx);
        self.api_logger.log_request(&context, method, url, &request_headers(ctx));

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(&context, CatalogError::transport(action, &e))),
        };

        let status = response.status().as_u16();
        self.api_logger.log_response(&context, status);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Err(self.fail(&context, CatalogError::transport(action, &e))),
        };

        match parse_envelope(action, status, &body) {
            Ok(result) => {
                self.api_logger.complete_action(&context, Some(status), None);
                Ok(result)
            }
            Err(e) => Err(self.fail(&context, e)),
        }
    }

    fn fail(&self, context: &ActionContext, error: CatalogError) -> CatalogError {
        let status = if error.is_transport() { None } else { Some(error.status) };
        self.api_logger.complete_action(context, status, Some(&error.message));
        error
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    async fn show_organization(&self, ctx: &Context, name_or_id: &str) -> Result<Value> {
        self.get_action(ctx, actions::ORGANIZATION_SHOW, &[("id", name_or_id.to_string())])
            .await
    }

    async fn show_dataset(&self, ctx: &Context, id_or_slug: &str) -> Result<Value> {
        self.get_action(ctx, actions::PACKAGE_SHOW, &[("id", id_or_slug.to_string())])
            .await
    }

    async fn create_or_update_dataset(&self, ctx: &Context, dataset: &Dataset, mode: UpsertMode) -> Result<Value> {
        let action = match mode {
            UpsertMode::Create => actions::PACKAGE_CREATE,
            UpsertMode::Update => actions::PACKAGE_UPDATE,
        };
        if mode == UpsertMode::Update && dataset.id.is_none() {
            return Err(CatalogError::precondition(action, "dataset update requires an id"));
        }

        let payload = dataset
            .to_payload(mode)
            .map_err(|e| CatalogError::precondition(action, format!("Failed to serialize dataset: {}", e)))?;
        self.post_action(ctx, action, &payload).await
    }

    async fn create_or_update_resource(
        &self,
        ctx: &Context,
        write: &ResourceWrite,
        file: Option<FileUpload>,
    ) -> Result<Value> {
        let action = match write.mode {
            UpsertMode::Create => actions::RESOURCE_CREATE,
            UpsertMode::Update => actions::RESOURCE_PATCH,
        };

        let mut form = Form::new();
        for (name, value) in write.text_fields() {
            form = form.text(name, value);
        }
        if let Some(file) = file {
            let part = Part::bytes(file.content).file_name(file.file_name);
            form = form.part(form_fields::UPLOAD, part);
        }

        self.post_multipart(ctx, action, form).await
    }

    async fn search_tabular(&self, ctx: &Context, resource_id: &str, params: SearchParams) -> Result<DatastoreSearch> {
        let query = [
            ("resource_id", resource_id.to_string()),
            ("limit", params.limit.to_string()),
            ("include_total", params.include_total.to_string()),
        ];
        let result = self.get_action(ctx, actions::DATASTORE_SEARCH, &query).await?;
        serde_json::from_value(result).map_err(|e| {
            CatalogError::invalid_result(actions::DATASTORE_SEARCH, format!("Unexpected search result: {}", e))
        })
    }

    async fn create_tabular(&self, ctx: &Context, payload: &TabularCreate) -> Result<Value> {
        self.post_action(ctx, actions::DATASTORE_CREATE, &payload.to_payload())
            .await
    }

    async fn delete_tabular(&self, ctx: &Context, resource_id: &str) -> Result<Value> {
        let body = json!({ "resource_id": resource_id, "force": true });
        self.post_action(ctx, actions::DATASTORE_DELETE, &body).await
    }

    async fn delete_resource(&self, ctx: &Context, resource_id: &str) -> Result<Value> {
        self.post_action(ctx, actions::RESOURCE_DELETE, &json!({ "id": resource_id }))
            .await
    }

    async fn purge_dataset(&self, ctx: &Context, dataset_id: &str) -> Result<Value> {
        self.post_action(ctx, actions::DATASET_PURGE, &json!({ "id": dataset_id }))
            .await
    }

    async fn patch_dataset_visibility(&self, ctx: &Context, dataset_id: &str, is_private: bool) -> Result<Value> {
        let body = json!({ "id": dataset_id, "private": is_private });
        self.post_action(ctx, actions::PACKAGE_PATCH, &body).await
    }

    async fn fetch_file(&self, ctx: &Context, url: &str) -> Result<Vec<u8>> {
        let action = actions::FILE_DOWNLOAD;
        let context = self.api_logger.start_action(action, ctx.base_url());

        // File URLs can point anywhere, the key only goes to the catalog itself
        let mut request = self.http_client.get(url);
        let mut logged_headers = request_headers(ctx);
        if same_origin(ctx.base_url(), url) {
            request = authorize(request, ctx);
        } else {
            debug!("Fetching {} without credentials, it is not served by {}", url, ctx.base_url());
            logged_headers.remove(headers::AUTHORIZATION);
        }
        self.api_logger.log_request(&context, "GET", url, &logged_headers);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(&context, CatalogError::transport(action, &e))),
        };

        let status = response.status();
        self.api_logger.log_response(&context, status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(self.fail(&context, CatalogError::new(status.as_u16(), action, truncate(&body))));
        }

        match response.bytes().await {
            Ok(bytes) => {
                self.api_logger.complete_action(&context, Some(status.as_u16()), None);
                Ok(bytes.to_vec())
            }
            Err(e) => Err(self.fail(&context, CatalogError::transport(action, &e))),
        }
    }
}

fn authorize(request: reqwest::RequestBuilder, ctx: &Context) -> reqwest::RequestBuilder {
    match ctx.api_key() {
        Some(key) => request.header(headers::AUTHORIZATION, key),
        None => request,
    }
}

/// Whether `url` shares scheme, host and port with the catalog at `base_url`
fn same_origin(base_url: &str, url: &str) -> bool {
    match (Url::parse(base_url), Url::parse(url)) {
        (Ok(base), Ok(url)) => base.origin() == url.origin(),
        _ => false,
    }
}

fn require_api_key(ctx: &Context, action: &str) -> Result<()> {
    if ctx.api_key().is_none() {
        return Err(CatalogError::missing_api_key(action));
    }
    Ok(())
}

fn request_headers(ctx: &Context) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Accept".to_string(), headers::CONTENT_TYPE_JSON.to_string());
    if let Some(key) = ctx.api_key() {
        headers.insert(headers::AUTHORIZATION.to_string(), key.to_string());
    }
    headers
}

/// Unwrap the action envelope, turning every failure shape into a `CatalogError`
fn parse_envelope(action: &str, status: u16, body: &str) -> Result<Value> {
    let envelope: Option<Value> = serde_json::from_str(body).ok();
    let is_http_success = (200..300).contains(&status);

    match envelope {
        Some(envelope) => {
            let success = envelope.get("success").and_then(Value::as_bool).unwrap_or(is_http_success);
            if is_http_success && success {
                return Ok(envelope.get("result").cloned().unwrap_or(Value::Null));
            }
            // The catalog occasionally reports failure inside a 200
            let status = if is_http_success { 400 } else { status };
            Err(CatalogError::new(status, action, error_message(&envelope, body)))
        }
        None if is_http_success => Err(CatalogError::new(
            status,
            action,
            format!("Invalid JSON response: {}", truncate(body)),
        )),
        None => Err(CatalogError::new(status, action, truncate(body))),
    }
}

fn error_message(envelope: &Value, body: &str) -> String {
    match envelope.get("error") {
        Some(error) => match error.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => error.to_string(),
        },
        None => truncate(body),
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
