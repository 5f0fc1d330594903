//! Batch manifests and outcome reports for the CLI.
//!
//! A manifest is a JSON document listing the requests of one batch:
//!
//! ```json
//! {
//!   "requests": [
//!     { "method": "GET", "url": "https://example.com/", "headers": { "Accept": "text/html" } },
//!     { "method": "POST", "url": "https://example.com/form", "form": { "a": "1" } }
//!   ]
//! }
//! ```
//!
//! The report lists one entry per request, in manifest order.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::request::{LogicalRequest, UploadedFile};
use crate::http::response::{Cookie, Response};
use crate::http::statement::Statement;
use crate::kernel::error::TransportError;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Request {index}: invalid method '{method}'")]
    InvalidMethod { index: usize, method: String },

    #[error("Request {index}: upload file '{}' unavailable: {source}", path.display())]
    UploadFile {
        index: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchManifest {
    pub requests: Vec<RequestEntry>,
}

/// One request of a manifest. Only `url` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEntry {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub form: BTreeMap<String, String>,
    /// File streamed as the body of a PUT.
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub ignore_tls_errors: bool,
}

fn default_method() -> String {
    "GET".to_string()
}

impl BatchManifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn into_statements(self) -> Result<Vec<Statement>, ManifestError> {
        self.requests
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.into_request(index).map(Statement::new))
            .collect()
    }
}

impl RequestEntry {
    fn into_request(self, index: usize) -> Result<LogicalRequest, ManifestError> {
        let method = Method::from_bytes(self.method.to_ascii_uppercase().as_bytes()).map_err(|_| {
            ManifestError::InvalidMethod {
                index,
                method: self.method.clone(),
            }
        })?;

        let mut request = LogicalRequest::new(method, self.url);
        for (name, value) in self.headers {
            request = request.with_header(name, value);
        }
        for (name, value) in self.cookies {
            request = request.with_cookie(name, value);
        }
        for (name, value) in self.form {
            request = request.with_form_field(name, value);
        }
        if let Some(body) = self.body {
            request = request.with_content(body);
        }
        if let Some(path) = self.file {
            let size = std::fs::metadata(&path)
                .map_err(|source| ManifestError::UploadFile {
                    index,
                    path: path.clone(),
                    source,
                })?
                .len();
            request = request.with_file(UploadedFile::new(path, size));
        }
        if let Some(timeout_ms) = self.timeout_ms {
            request = request.with_timeout_ms(timeout_ms);
        }
        if self.ignore_tls_errors {
            request = request.ignore_tls_errors();
        }
        Ok(request)
    }
}

/// Outcome of the whole batch, in manifest order.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub entries: Vec<ReportEntry>,
}

#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub method: String,
    pub url: String,
    /// Request headers after reconciliation with what was sent.
    pub sent_headers: Vec<(String, String)>,
    #[serde(flatten)]
    pub outcome: ReportOutcome,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReportOutcome {
    Response {
        status: u16,
        reason: String,
        version: String,
        headers: Vec<(String, String)>,
        cookies: Vec<Cookie>,
        body: String,
        elapsed_ms: u64,
    },
    Error {
        kind: &'static str,
        message: String,
    },
    /// The statement never settled.
    Missing,
}

impl BatchReport {
    /// Build the report. With `catch`, failures are reported as 500 responses.
    pub fn from_statements(statements: &[Statement], catch: bool) -> Self {
        let entries = statements
            .iter()
            .map(|statement| {
                let request = statement.request();
                let outcome = match (statement.response(), statement.error()) {
                    (Some(response), _) => ReportOutcome::from_response(response),
                    (None, Some(error)) if catch => ReportOutcome::from_response(&Response::from_error(error.to_string())),
                    (None, Some(error)) => ReportOutcome::from_error(error),
                    (None, None) => ReportOutcome::Missing,
                };
                ReportEntry {
                    method: request.method.to_string(),
                    url: request.url.clone(),
                    sent_headers: pairs(request.headers.iter()),
                    outcome,
                }
            })
            .collect();
        Self { entries }
    }

    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !matches!(e.outcome, ReportOutcome::Response { .. }))
            .count()
    }
}

impl ReportOutcome {
    fn from_response(response: &Response) -> Self {
        ReportOutcome::Response {
            status: response.status_code(),
            reason: response.reason().to_string(),
            version: response.protocol_version().to_string(),
            headers: pairs(response.headers().iter()),
            cookies: response.cookies().to_vec(),
            body: response.text(),
            elapsed_ms: response.transfer().total_time.as_millis() as u64,
        }
    }

    fn from_error(error: &TransportError) -> Self {
        ReportOutcome::Error {
            kind: error.kind(),
            message: error.message().to_string(),
        }
    }
}

fn pairs<'a>(iter: impl Iterator<Item = (&'a str, &'a str)>) -> Vec<(String, String)> {
    iter.map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::statement::StatementState;

    #[test]
    fn parses_minimal_manifest() {
        let manifest = BatchManifest::parse(r#"{"requests":[{"url":"http://localhost/"}]}"#).unwrap();
        let statements = manifest.into_statements().unwrap();
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].request().method, Method::GET);
        assert_eq!(statements[0].state(), StatementState::Pending);
    }

    #[test]
    fn full_entry_maps_onto_request() {
        let manifest = BatchManifest::parse(
            r#"{"requests":[{
                "method": "post",
                "url": "http://localhost/form",
                "headers": {"X-Trace": "1"},
                "cookies": {"sid": "abc"},
                "form": {"a": "1"},
                "timeout_ms": 500,
                "ignore_tls_errors": true
            }]}"#,
        )
        .unwrap();
        let statements = manifest.into_statements().unwrap();
        let request = statements[0].request();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.headers.get("x-trace"), Some("1"));
        assert_eq!(request.cookies, vec![("sid".to_string(), "abc".to_string())]);
        assert_eq!(request.form, vec![("a".to_string(), "1".to_string())]);
        assert_eq!(request.options.timeout_ms, Some(500));
        assert!(request.options.ignore_tls_errors);
    }

    #[test]
    fn file_entry_records_size() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"hello").unwrap();
        let json = serde_json::json!({
            "requests": [{ "method": "PUT", "url": "http://localhost/u", "file": file.path() }]
        });
        let statements = BatchManifest::parse(&json.to_string())
            .unwrap()
            .into_statements()
            .unwrap();
        assert_eq!(statements[0].request().files[0].declared_size, 5);
    }

    #[test]
    fn missing_file_is_rejected() {
        let err = BatchManifest::parse(r#"{"requests":[{"method":"PUT","url":"http://x/","file":"/no/such/file"}]}"#)
            .unwrap()
            .into_statements()
            .unwrap_err();
        assert!(matches!(err, ManifestError::UploadFile { index: 0, .. }));
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(matches!(
            BatchManifest::parse("{not json"),
            Err(ManifestError::Parse(_))
        ));
    }

    #[test]
    fn report_keeps_order_and_honours_catch() {
        let mut ok = Statement::new(LogicalRequest::get("http://a/"));
        ok.set_response(Response::new(200, "OK", "1.1", Default::default(), b"hi".to_vec()));
        let mut failed = Statement::new(LogicalRequest::get("http://b/"));
        failed.set_error(TransportError::Timeout {
            message: "too slow".into(),
        });
        let pending = Statement::new(LogicalRequest::get("http://c/"));
        let statements = vec![ok, failed, pending];

        let report = BatchReport::from_statements(&statements, false);
        assert_eq!(report.entries[0].url, "http://a/");
        assert!(matches!(report.entries[0].outcome, ReportOutcome::Response { status: 200, .. }));
        assert!(matches!(report.entries[1].outcome, ReportOutcome::Error { kind: "timeout", .. }));
        assert!(matches!(report.entries[2].outcome, ReportOutcome::Missing));
        assert_eq!(report.failures(), 2);

        let caught = BatchReport::from_statements(&statements, true);
        assert!(matches!(caught.entries[1].outcome, ReportOutcome::Response { status: 500, .. }));
        assert_eq!(caught.failures(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["entries"][1]["outcome"], "error");
        assert_eq!(json["entries"][0]["body"], "hi");
    }
}
