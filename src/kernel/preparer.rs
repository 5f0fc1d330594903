//! Request preparation.
//!
//! # Responsibilities
//! - Turn a statement's logical request into a configured `TransportHandle`
//! - Apply timeout and TLS policy from the request and batch options
//! - Choose the method/body strategy (file stream, in-memory body, none)
//! - Serialize cookies and headers into wire form
//!
//! # Design Decisions
//! - Method/body policy, first match wins:
//!   1. PUT with exactly one file and no other body: stream the file
//!   2. any non-GET method: explicit method, raw content or urlencoded form
//!   3. GET: no body
//! - The collectors are installed when the handle is created; no later step
//!   can replace them
//! - `content-length` is written back onto the logical request so the
//!   header trace and the request agree

use crate::config::BatchOptions;
use crate::http::request::LogicalRequest;
use crate::http::statement::Statement;
use crate::kernel::error::HandleCreationError;
use crate::transport::{ContentCollector, HandleMethod, HeaderCollector, TransportHandle, Upload};
use reqwest::Method;
use url::Url;

/// Build the transport handle for one statement.
pub fn prepare(statement: &mut Statement, options: &BatchOptions) -> Result<TransportHandle, HandleCreationError> {
    let request = statement.request_mut();

    let url = Url::parse(&request.url).map_err(|source| HandleCreationError::InvalidUrl {
        url: request.url.clone(),
        source,
    })?;

    let mut handle = TransportHandle::new(url, ContentCollector::new(), HeaderCollector::new());
    handle.set_cookie(build_cookie_string(&request.cookies));
    handle.capture_header_out(true);

    if let Some(timeout_ms) = request.options.timeout_ms.or(options.default_timeout_ms) {
        handle.set_timeout_ms(timeout_ms);
    }

    if request.options.ignore_tls_errors || options.ignore_tls_errors {
        tracing::warn!(
            handle = %handle.id(),
            url = %request.url,
            "TLS verification disabled for request"
        );
        handle.disable_tls_verification();
    }

    if request.method == Method::PUT && request.files.len() == 1 && request.has_no_body() {
        let file = &request.files[0];
        let size = std::fs::metadata(&file.path)
            .map_err(|source| HandleCreationError::FileUnavailable {
                path: file.path.clone(),
                source,
            })?
            .len();
        if size != file.declared_size {
            tracing::debug!(
                path = %file.path.display(),
                declared = file.declared_size,
                actual = size,
                "Upload size differs from declared size"
            );
        }
        handle.set_method(HandleMethod::Standard(Method::PUT));
        handle.set_upload(Upload::File {
            path: file.path.clone(),
            size,
        });
    } else if request.method != Method::GET {
        handle.set_method(HandleMethod::Custom(request.method.clone()));
        if let Some(body) = post_fields(request) {
            request.headers.set("content-length", body.len().to_string());
            handle.set_upload(Upload::Fields(body));
        }
    } else {
        handle.set_method(HandleMethod::Standard(Method::GET));
    }

    handle.set_headers(request.headers.to_wire_lines());

    Ok(handle)
}

/// Body for a non-GET request: raw content if any, else the urlencoded form.
fn post_fields(request: &LogicalRequest) -> Option<Vec<u8>> {
    if !request.content.is_empty() {
        return Some(request.content.clone());
    }
    if !request.form.is_empty() {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(request.form.iter())
            .finish();
        return Some(encoded.into_bytes());
    }
    None
}

/// `k=v` pairs joined by `;`, in bag order.
fn build_cookie_string(cookies: &[(String, String)]) -> String {
    cookies
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::UploadedFile;
    use std::io::Write;

    fn prepare_one(request: LogicalRequest) -> (Statement, TransportHandle) {
        let mut stmt = Statement::new(request);
        let handle = prepare(&mut stmt, &BatchOptions::default()).unwrap();
        (stmt, handle)
    }

    #[test]
    fn get_has_no_write_side() {
        let (_, handle) = prepare_one(LogicalRequest::get("http://localhost/items?page=2"));
        assert_eq!(handle.method(), &HandleMethod::Standard(Method::GET));
        assert_eq!(handle.upload(), &Upload::None);
        assert!(handle.header("content-length").is_none());
        assert!(handle.captures_header_out());
        assert_eq!(handle.url().as_str(), "http://localhost/items?page=2");
    }

    #[test]
    fn post_form_is_urlencoded() {
        let (stmt, handle) = prepare_one(
            LogicalRequest::post("http://localhost/submit")
                .with_form_field("a", "1")
                .with_form_field("b", "2"),
        );
        assert_eq!(handle.method(), &HandleMethod::Custom(Method::POST));
        assert_eq!(handle.upload(), &Upload::Fields(b"a=1&b=2".to_vec()));
        assert_eq!(handle.header("content-length"), Some("7"));
        assert_eq!(stmt.request().headers.get("Content-Length"), Some("7"));
    }

    #[test]
    fn raw_content_wins_over_form() {
        let (_, handle) = prepare_one(
            LogicalRequest::new(Method::PATCH, "http://localhost/")
                .with_content("{\"x\":1}")
                .with_form_field("ignored", "yes"),
        );
        assert_eq!(handle.upload(), &Upload::Fields(b"{\"x\":1}".to_vec()));
        assert_eq!(handle.header("content-length"), Some("7"));
    }

    #[test]
    fn delete_without_body_sets_no_length() {
        let (_, handle) = prepare_one(LogicalRequest::new(Method::DELETE, "http://localhost/1"));
        assert_eq!(handle.method(), &HandleMethod::Custom(Method::DELETE));
        assert_eq!(handle.upload(), &Upload::None);
        assert!(handle.header("content-length").is_none());
    }

    #[test]
    fn put_single_file_streams_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let (_, handle) = prepare_one(
            LogicalRequest::put("http://localhost/upload").with_file(UploadedFile::new(file.path(), 999)),
        );
        assert_eq!(handle.method(), &HandleMethod::Standard(Method::PUT));
        assert_eq!(
            handle.upload(),
            &Upload::File {
                path: file.path().to_path_buf(),
                size: 10,
            }
        );
        assert!(handle.header("content-length").is_none());
    }

    #[test]
    fn put_file_with_body_sends_body() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (_, handle) = prepare_one(
            LogicalRequest::put("http://localhost/upload")
                .with_file(UploadedFile::new(file.path(), 0))
                .with_content("inline"),
        );
        assert_eq!(handle.method(), &HandleMethod::Custom(Method::PUT));
        assert_eq!(handle.upload(), &Upload::Fields(b"inline".to_vec()));
    }

    #[test]
    fn missing_upload_file_fails() {
        let mut stmt = Statement::new(
            LogicalRequest::put("http://localhost/upload")
                .with_file(UploadedFile::new("/definitely/not/here.bin", 1)),
        );
        let err = prepare(&mut stmt, &BatchOptions::default()).unwrap_err();
        assert!(matches!(err, HandleCreationError::FileUnavailable { .. }));
    }

    #[test]
    fn invalid_url_fails() {
        let mut stmt = Statement::new(LogicalRequest::get("not a url"));
        let err = prepare(&mut stmt, &BatchOptions::default()).unwrap_err();
        assert!(matches!(err, HandleCreationError::InvalidUrl { .. }));
    }

    #[test]
    fn cookies_timeout_and_tls_policy() {
        let (_, handle) = prepare_one(
            LogicalRequest::get("https://localhost/")
                .with_cookie("a", "1")
                .with_cookie("b", "2")
                .with_timeout_ms(1500)
                .ignore_tls_errors(),
        );
        assert_eq!(handle.cookie(), "a=1;b=2");
        assert_eq!(handle.timeout(), Some(std::time::Duration::from_millis(1500)));
        assert!(!handle.verifies_peer());
        assert!(!handle.verifies_host());
    }

    #[test]
    fn batch_default_timeout_applies() {
        let mut stmt = Statement::new(LogicalRequest::get("http://localhost/"));
        let options = BatchOptions {
            default_timeout_ms: Some(250),
            ignore_tls_errors: false,
        };
        let handle = prepare(&mut stmt, &options).unwrap();
        assert_eq!(handle.timeout(), Some(std::time::Duration::from_millis(250)));
        assert!(handle.verifies_peer());
    }

    #[test]
    fn headers_are_serialized_in_order() {
        let (_, handle) = prepare_one(
            LogicalRequest::get("http://localhost/")
                .with_header("Accept", "application/json")
                .with_header("X-Trace", "abc"),
        );
        assert_eq!(handle.headers(), &["Accept: application/json", "X-Trace: abc"]);
    }
}
