//! Logical request model.
//!
//! # Responsibilities
//! - Describe one outbound request as plain data (method, URL, headers, cookies, body)
//! - Keep headers ordered with case-insensitive lookup
//! - Carry per-request execution options (timeout, TLS policy)
//!
//! # Design Decisions
//! - Header names keep the caller's spelling; only lookups fold case
//! - Raw content and form fields are stored side by side; the preparer
//!   decides which one goes on the wire
//! - The request is built upstream and only borrowed by the engine

use std::path::PathBuf;

use reqwest::Method;
use serde::Serialize;

/// Ordered header collection with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderBag {
    entries: Vec<(String, String)>,
}

impl HeaderBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values stored under `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace every value of `name` with a single one.
    ///
    /// The entry keeps the position of the first existing occurrence, or is
    /// appended when the name is new.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(idx) => {
                self.entries[idx] = (name.clone(), value);
                let mut seen = false;
                self.entries.retain(|(k, _)| {
                    if !k.eq_ignore_ascii_case(&name) {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Add a value without touching existing ones.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Drop every entry and take the given ones instead.
    pub fn replace<I, K, V>(&mut self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.entries.clear();
        for (k, v) in headers {
            self.set(k, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `Name: value` line per entry, no folding.
    pub fn to_wire_lines(&self) -> Vec<String> {
        self.entries.iter().map(|(k, v)| format!("{}: {}", k, v)).collect()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderBag
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = HeaderBag::new();
        for (k, v) in iter {
            bag.append(k, v);
        }
        bag
    }
}

/// A file attached to the request for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Path on the local filesystem.
    pub path: PathBuf,
    /// Size declared by the caller; the preparer re-reads the real size from disk.
    pub declared_size: u64,
}

impl UploadedFile {
    pub fn new(path: impl Into<PathBuf>, declared_size: u64) -> Self {
        Self {
            path: path.into(),
            declared_size,
        }
    }
}

/// Per-request execution options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Whole-request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Skip hostname and peer certificate verification.
    pub ignore_tls_errors: bool,
}

/// One outbound request, as produced upstream.
#[derive(Debug, Clone)]
pub struct LogicalRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderBag,
    /// Cookie bag, serialized in iteration order.
    pub cookies: Vec<(String, String)>,
    /// Raw body content.
    pub content: Vec<u8>,
    /// Structured form fields, used when `content` is empty.
    pub form: Vec<(String, String)>,
    pub files: Vec<UploadedFile>,
    pub options: RequestOptions,
}

impl LogicalRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderBag::new(),
            cookies: Vec::new(),
            content: Vec::new(),
            form: Vec::new(),
            files: Vec::new(),
            options: RequestOptions::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn ignore_tls_errors(mut self) -> Self {
        self.options.ignore_tls_errors = true;
        self
    }

    /// True when neither raw content nor form fields are present.
    pub fn has_no_body(&self) -> bool {
        self.content.is_empty() && self.form.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_is_case_insensitive() {
        let bag: HeaderBag = [("Content-Type", "text/plain")].into_iter().collect();
        assert_eq!(bag.get("content-type"), Some("text/plain"));
        assert_eq!(bag.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(bag.get("accept").is_none());
    }

    #[test]
    fn set_collapses_duplicates_in_place() {
        let mut bag = HeaderBag::new();
        bag.append("Accept", "a");
        bag.append("X-Trace", "1");
        bag.append("accept", "b");
        bag.set("ACCEPT", "c");

        let entries: Vec<_> = bag.iter().collect();
        assert_eq!(entries, vec![("ACCEPT", "c"), ("X-Trace", "1")]);
    }

    #[test]
    fn replace_discards_previous_entries() {
        let mut bag: HeaderBag = [("A", "1"), ("B", "2")].into_iter().collect();
        bag.replace([("User-Agent", "custom/1.0")]);
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.get("user-agent"), Some("custom/1.0"));
    }

    #[test]
    fn wire_lines_keep_order_and_spelling() {
        let bag: HeaderBag = [("X-One", "1"), ("x-two", "2")].into_iter().collect();
        assert_eq!(bag.to_wire_lines(), vec!["X-One: 1", "x-two: 2"]);
    }

    #[test]
    fn builder_sets_body_fields() {
        let req = LogicalRequest::post("http://localhost/")
            .with_form_field("a", "1")
            .with_timeout_ms(250);
        assert_eq!(req.method, Method::POST);
        assert!(!req.has_no_body());
        assert_eq!(req.options.timeout_ms, Some(250));
        assert!(!req.options.ignore_tls_errors);
    }
}
