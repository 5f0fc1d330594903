//! Transport handle: one request configured for the native transport.
//!
//! # Responsibilities
//! - Give each handle a process-unique identity for completion correlation
//! - Hold transport options (method, upload, cookies, timeout, TLS policy)
//! - Own the header and content collectors fed during the transfer
//!
//! # Design Decisions
//! - Collectors are installed at construction and have no setter; the
//!   transport can write into them but nothing can swap them out
//! - Options are plain data so a prepared handle can be inspected without I/O

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Method;
use url::Url;

use crate::transport::collector::{ContentCollector, HeaderCollector};

/// Global counter for handle IDs. Only uniqueness matters, so relaxed ordering.
static HANDLE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a transport handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

impl HandleId {
    pub fn new() -> Self {
        Self(HANDLE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handle-{}", self.0)
    }
}

/// How the method is conveyed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleMethod {
    /// Method the transport knows natively (GET, or PUT with an infile).
    Standard(Method),
    /// Explicit method override.
    Custom(Method),
}

impl HandleMethod {
    pub fn method(&self) -> &Method {
        match self {
            HandleMethod::Standard(m) | HandleMethod::Custom(m) => m,
        }
    }
}

/// Write-side configuration of a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upload {
    /// Nothing is sent.
    None,
    /// In-memory body (raw content or encoded form).
    Fields(Vec<u8>),
    /// Streamed from disk with a known size.
    File { path: PathBuf, size: u64 },
}

#[derive(Debug)]
pub struct TransportHandle {
    id: HandleId,
    url: Url,
    method: HandleMethod,
    cookie: String,
    capture_header_out: bool,
    timeout: Option<Duration>,
    verify_peer: bool,
    verify_host: bool,
    upload: Upload,
    headers: Vec<String>,
    content_sink: ContentCollector,
    header_sink: HeaderCollector,
}

impl TransportHandle {
    /// Create a GET handle writing into the given collectors.
    pub fn new(url: Url, content_sink: ContentCollector, header_sink: HeaderCollector) -> Self {
        Self {
            id: HandleId::new(),
            url,
            method: HandleMethod::Standard(Method::GET),
            cookie: String::new(),
            capture_header_out: false,
            timeout: None,
            verify_peer: true,
            verify_host: true,
            upload: Upload::None,
            headers: Vec::new(),
            content_sink,
            header_sink,
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &HandleMethod {
        &self.method
    }

    pub fn set_method(&mut self, method: HandleMethod) {
        self.method = method;
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    pub fn set_cookie(&mut self, cookie: impl Into<String>) {
        self.cookie = cookie.into();
    }

    pub fn captures_header_out(&self) -> bool {
        self.capture_header_out
    }

    pub fn capture_header_out(&mut self, enabled: bool) {
        self.capture_header_out = enabled;
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn set_timeout_ms(&mut self, millis: u64) {
        self.timeout = Some(Duration::from_millis(millis));
    }

    pub fn verifies_peer(&self) -> bool {
        self.verify_peer
    }

    pub fn verifies_host(&self) -> bool {
        self.verify_host
    }

    /// Turn off both hostname and certificate verification.
    pub fn disable_tls_verification(&mut self) {
        self.verify_peer = false;
        self.verify_host = false;
    }

    pub fn upload(&self) -> &Upload {
        &self.upload
    }

    pub fn set_upload(&mut self, upload: Upload) {
        self.upload = upload;
    }

    /// Outgoing headers as `Name: value` lines.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn set_headers(&mut self, headers: Vec<String>) {
        self.headers = headers;
    }

    /// Value of the first `name` header line, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }

    /// Sink for response header lines.
    pub fn header_sink(&mut self) -> &mut HeaderCollector {
        &mut self.header_sink
    }

    /// Sink for response body bytes.
    pub fn content_sink(&mut self) -> &mut ContentCollector {
        &mut self.content_sink
    }

    /// Consume the handle, keeping only its collectors.
    pub fn into_collectors(self) -> (ContentCollector, HeaderCollector) {
        (self.content_sink, self.header_sink)
    }
}
