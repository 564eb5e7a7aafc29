use std::collections::HashSet;
use std::fmt;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde_json::json;

use crate::config::{Config, NOTION_API_VERSION};
use crate::error::ReporterError;
use crate::report::ReportRecord;
use crate::schema::{missing_columns, ColumnSpec, SchemaDiff};

/// Identifier of the created page, non-empty on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote sink for report rows. The pipeline talks to this seam so tests can
/// substitute a recording fake for the live API.
pub trait ReportSink {
    fn ensure_schema(&self, required: &[ColumnSpec]) -> Result<SchemaDiff, ReporterError>;
    fn upload(&self, record: &ReportRecord) -> Result<RecordId, ReporterError>;
}

/// Blocking Notion API client. Every call is bounded by the configured HTTP
/// timeout; there are no retries, the next scheduled run is the retry.
pub struct NotionClient {
    http: Client,
    api_base_url: String,
    api_key: String,
    database_id: String,
}

impl NotionClient {
    pub fn new(config: &Config) -> Result<Self, ReporterError> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|err| {
                ReporterError::Configuration(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            http,
            api_base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
            database_id: config.database_id.clone(),
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_API_VERSION)
    }
}

/// Remote schema operations behind the reconciliation loop, separated so the
/// loop itself can be exercised without a live API.
trait SchemaStore {
    fn fetch_existing_columns(&self) -> Result<HashSet<String>, ReporterError>;
    fn create_column(&self, column: &ColumnSpec) -> Result<(), ReporterError>;
}

/// Fetches the existing property names and creates the missing columns in
/// required-list order. A second call against a satisfied schema issues zero
/// create requests.
fn reconcile_schema(
    store: &dyn SchemaStore,
    required: &[ColumnSpec],
) -> Result<SchemaDiff, ReporterError> {
    let existing = store.fetch_existing_columns()?;
    let missing = missing_columns(required, &existing);
    let mut created = Vec::with_capacity(missing.len());
    for column in missing {
        tracing::info!(column = column.name, "creating missing database column");
        store.create_column(column)?;
        created.push(column.name.to_string());
    }
    Ok(SchemaDiff { created })
}

impl SchemaStore for NotionClient {
    fn fetch_existing_columns(&self) -> Result<HashSet<String>, ReporterError> {
        let url = format!("{}/databases/{}", self.api_base_url, self.database_id);
        let response = self
            .authorize(self.http.get(&url))
            .send()
            .map_err(|err| ReporterError::SchemaUpdateFailed(format!("schema fetch: {err}")))?;
        let status = response.status();
        let body = response.text().unwrap_or_default();
        parse_schema_response(status, &body)
    }

    fn create_column(&self, column: &ColumnSpec) -> Result<(), ReporterError> {
        let url = format!("{}/databases/{}", self.api_base_url, self.database_id);
        let payload = json!({ "properties": { column.name: column.definition() } });
        let response = self
            .authorize(self.http.patch(&url))
            .json(&payload)
            .send()
            .map_err(|err| {
                ReporterError::SchemaUpdateFailed(format!("create column {}: {err}", column.name))
            })?;
        let status = response.status();
        let body = response.text().unwrap_or_default();
        check_create_column_response(column.name, status, &body)
    }
}

impl ReportSink for NotionClient {
    fn ensure_schema(&self, required: &[ColumnSpec]) -> Result<SchemaDiff, ReporterError> {
        reconcile_schema(self, required)
    }

    fn upload(&self, record: &ReportRecord) -> Result<RecordId, ReporterError> {
        let url = format!("{}/pages", self.api_base_url);
        let payload = record.to_page_payload(&self.database_id);
        let response = self
            .authorize(self.http.post(&url))
            .json(&payload)
            .send()
            .map_err(|err| ReporterError::UploadFailed(format!("page create: {err}")))?;
        let status = response.status();
        let body = response.text().unwrap_or_default();
        parse_upload_response(status, &body)
    }
}

fn parse_schema_response(
    status: StatusCode,
    body: &str,
) -> Result<HashSet<String>, ReporterError> {
    if !status.is_success() {
        return Err(ReporterError::SchemaUpdateFailed(format!(
            "schema fetch returned {status}: {}",
            snippet(body)
        )));
    }
    let value: serde_json::Value = serde_json::from_str(body).map_err(|err| {
        ReporterError::SchemaUpdateFailed(format!("schema response is not JSON: {err}"))
    })?;
    let properties = value
        .get("properties")
        .and_then(|properties| properties.as_object())
        .ok_or_else(|| {
            ReporterError::SchemaUpdateFailed("schema response missing properties".to_string())
        })?;
    Ok(properties.keys().cloned().collect())
}

fn check_create_column_response(
    name: &str,
    status: StatusCode,
    body: &str,
) -> Result<(), ReporterError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ReporterError::SchemaUpdateFailed(format!(
            "create column {name} returned {status}: {}",
            snippet(body)
        )))
    }
}

fn parse_upload_response(status: StatusCode, body: &str) -> Result<RecordId, ReporterError> {
    if !status.is_success() {
        return Err(ReporterError::UploadFailed(format!(
            "page create returned {status}: {}",
            snippet(body)
        )));
    }
    let value: serde_json::Value = serde_json::from_str(body).map_err(|err| {
        ReporterError::UploadFailed(format!("page create response is not JSON: {err}"))
    })?;
    match value.get("id").and_then(|id| id.as_str()) {
        Some(id) if !id.is_empty() => Ok(RecordId(id.to_string())),
        _ => Err(ReporterError::UploadFailed(
            "page create response missing page id".to_string(),
        )),
    }
}

/// Bounded response excerpt for diagnostics; bodies may be large and may not
/// be logged wholesale.
fn snippet(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_CHARS).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::REQUIRED_COLUMNS;
    use std::cell::RefCell;

    struct FakeSchemaStore {
        existing: RefCell<HashSet<String>>,
        creates: RefCell<usize>,
    }

    impl SchemaStore for FakeSchemaStore {
        fn fetch_existing_columns(&self) -> Result<HashSet<String>, ReporterError> {
            Ok(self.existing.borrow().clone())
        }

        fn create_column(&self, column: &ColumnSpec) -> Result<(), ReporterError> {
            *self.creates.borrow_mut() += 1;
            self.existing.borrow_mut().insert(column.name.to_string());
            Ok(())
        }
    }

    #[test]
    fn second_reconciliation_issues_no_create_requests() {
        let store = FakeSchemaStore {
            existing: RefCell::new(std::iter::once("Date".to_string()).collect()),
            creates: RefCell::new(0),
        };

        let first = reconcile_schema(&store, REQUIRED_COLUMNS).unwrap();
        assert_eq!(first.created.len(), REQUIRED_COLUMNS.len());
        assert_eq!(*store.creates.borrow(), REQUIRED_COLUMNS.len());

        let second = reconcile_schema(&store, REQUIRED_COLUMNS).unwrap();
        assert!(second.created.is_empty());
        assert_eq!(*store.creates.borrow(), REQUIRED_COLUMNS.len());
    }

    #[test]
    fn upload_response_with_page_id_succeeds() {
        let id = parse_upload_response(StatusCode::OK, r#"{"id":"page-abc123"}"#).unwrap();
        assert_eq!(id, RecordId("page-abc123".to_string()));
        assert!(!id.to_string().is_empty());
    }

    #[test]
    fn unauthorized_upload_fails() {
        let err = parse_upload_response(
            StatusCode::UNAUTHORIZED,
            r#"{"object":"error","status":401,"code":"unauthorized"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ReporterError::UploadFailed(_)));
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn server_error_upload_fails() {
        let err = parse_upload_response(StatusCode::INTERNAL_SERVER_ERROR, "").unwrap_err();
        assert!(matches!(err, ReporterError::UploadFailed(_)));
    }

    #[test]
    fn upload_response_without_id_fails() {
        let err = parse_upload_response(StatusCode::OK, r#"{"object":"page"}"#).unwrap_err();
        assert!(matches!(err, ReporterError::UploadFailed(_)));
    }

    #[test]
    fn schema_response_yields_property_names() {
        let body = r#"{"properties":{"Date":{"type":"title"},"Cycle Count":{"type":"number"}}}"#;
        let existing = parse_schema_response(StatusCode::OK, body).unwrap();
        assert!(existing.contains("Date"));
        assert!(existing.contains("Cycle Count"));
        assert_eq!(existing.len(), 2);
    }

    #[test]
    fn forbidden_schema_fetch_fails() {
        let err = parse_schema_response(StatusCode::FORBIDDEN, "denied").unwrap_err();
        assert!(matches!(err, ReporterError::SchemaUpdateFailed(_)));
    }

    #[test]
    fn snippet_is_bounded() {
        let long = "x".repeat(500);
        assert!(snippet(&long).len() < 220);
        assert_eq!(snippet("short"), "short");
    }
}
