//! Response value and cookie parsing.
//!
//! # Responsibilities
//! - Hold the assembled outcome of one request (status, reason, version,
//!   headers, cookies, body, transfer metadata)
//! - Parse `Set-Cookie` values into structured cookies
//! - Provide the 500 fallback used when a top-level request fails
//!
//! # Design Decisions
//! - Built once by the assembler; response-filter observers may still adjust it
//! - Cookies that do not parse are rejected here and dropped by the caller

use reqwest::StatusCode;
use serde::Serialize;

use crate::http::request::HeaderBag;
use crate::transport::TransferInfo;

/// A cookie received through `Set-Cookie`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Raw `Expires` attribute, not interpreted.
    pub expires: Option<String>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<String>,
}

impl Cookie {
    /// Parse a `Set-Cookie` header value.
    ///
    /// Returns `None` when the name/value pair is missing or the name is not
    /// a valid token. Unknown attributes are ignored.
    pub fn parse(header_value: &str) -> Option<Self> {
        let mut parts = header_value.split(';');
        let pair = parts.next()?.trim();
        let (name, value) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() || !name.bytes().all(is_token_byte) {
            return None;
        }
        let value = value.trim().trim_matches('"');

        let mut cookie = Cookie {
            name: name.to_string(),
            value: value.to_string(),
            path: None,
            domain: None,
            expires: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        };

        for attr in parts {
            let attr = attr.trim();
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (attr, None),
            };
            match (key.to_ascii_lowercase().as_str(), val) {
                ("path", Some(v)) => cookie.path = Some(v.to_string()),
                ("domain", Some(v)) => cookie.domain = Some(v.trim_start_matches('.').to_string()),
                ("expires", Some(v)) => cookie.expires = Some(v.to_string()),
                ("max-age", Some(v)) => cookie.max_age = v.parse().ok(),
                ("samesite", Some(v)) => cookie.same_site = Some(v.to_string()),
                ("secure", _) => cookie.secure = true,
                ("httponly", _) => cookie.http_only = true,
                _ => {}
            }
        }

        Some(cookie)
    }
}

/// RFC 7230 token characters.
fn is_token_byte(b: u8) -> bool {
    matches!(b,
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' |
        b'^' | b'_' | b'`' | b'|' | b'~' | b'0'..=b'9' | b'a'..=b'z' | b'A'..=b'Z')
}

/// Outcome of a request that reached the server.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    status_code: u16,
    reason: String,
    protocol_version: String,
    headers: HeaderBag,
    cookies: Vec<Cookie>,
    body: Vec<u8>,
    transfer: TransferInfo,
}

impl Response {
    /// Build a response. An empty `reason` falls back to the canonical one.
    pub fn new(
        status_code: u16,
        reason: impl Into<String>,
        protocol_version: impl Into<String>,
        headers: HeaderBag,
        body: Vec<u8>,
    ) -> Self {
        let mut response = Self {
            status_code,
            reason: String::new(),
            protocol_version: protocol_version.into(),
            headers,
            cookies: Vec::new(),
            body,
            transfer: TransferInfo::default(),
        };
        response.set_status(status_code, reason);
        response
    }

    /// 500 response carrying an error message as body.
    pub fn from_error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(500, "", "1.1", HeaderBag::new(), message.into_bytes())
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    pub fn headers(&self) -> &HeaderBag {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderBag {
        &mut self.headers
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn transfer(&self) -> &TransferInfo {
        &self.transfer
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn set_status(&mut self, status_code: u16, reason: impl Into<String>) {
        let reason = reason.into();
        self.status_code = status_code;
        self.reason = if reason.is_empty() {
            StatusCode::from_u16(status_code)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or_default()
                .to_string()
        } else {
            reason
        };
    }

    pub fn set_protocol_version(&mut self, version: impl Into<String>) {
        self.protocol_version = version.into();
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    pub fn set_transfer(&mut self, transfer: TransferInfo) {
        self.transfer = transfer;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cookie_with_attributes() {
        let c = Cookie::parse("sid=abc123; Path=/; Domain=.example.com; Max-Age=60; Secure; HttpOnly; SameSite=Lax")
            .unwrap();
        assert_eq!(c.name, "sid");
        assert_eq!(c.value, "abc123");
        assert_eq!(c.path.as_deref(), Some("/"));
        assert_eq!(c.domain.as_deref(), Some("example.com"));
        assert_eq!(c.max_age, Some(60));
        assert!(c.secure);
        assert!(c.http_only);
        assert_eq!(c.same_site.as_deref(), Some("Lax"));
    }

    #[test]
    fn parse_cookie_rejects_garbage() {
        assert!(Cookie::parse("no-equals-sign").is_none());
        assert!(Cookie::parse("=value").is_none());
        assert!(Cookie::parse("bad name=value").is_none());
    }

    #[test]
    fn empty_value_is_allowed() {
        let c = Cookie::parse("cleared=; Expires=Thu, 01 Jan 1970 00:00:00 GMT").unwrap();
        assert_eq!(c.value, "");
        assert!(c.expires.is_some());
    }

    #[test]
    fn empty_reason_falls_back_to_canonical() {
        let r = Response::new(404, "", "2", HeaderBag::new(), Vec::new());
        assert_eq!(r.reason(), "Not Found");

        let r = Response::new(200, "Fine", "1.1", HeaderBag::new(), Vec::new());
        assert_eq!(r.reason(), "Fine");
    }

    #[test]
    fn error_response_is_500_with_message() {
        let r = Response::from_error("boom");
        assert_eq!(r.status_code(), 500);
        assert_eq!(r.reason(), "Internal Server Error");
        assert_eq!(r.text(), "boom");
        assert!(!r.is_success());
    }
}
