//! Streaming sinks for response headers and body.
//!
//! # Responsibilities
//! - Accumulate raw header lines and parse the status line
//! - Pick `Set-Cookie` headers out as structured cookies
//! - Accumulate body bytes
//!
//! # Design Decisions
//! - Lenient: malformed header lines and unparseable cookies are dropped
//! - A new status line starts a fresh header block, so interim responses
//!   (`100 Continue`) do not leak into the final one

use crate::http::request::HeaderBag;
use crate::http::response::Cookie;

/// Collects response header lines as the transport delivers them.
#[derive(Debug, Clone, Default)]
pub struct HeaderCollector {
    headers: HeaderBag,
    cookies: Vec<Cookie>,
    code: Option<u16>,
    message: String,
    version: String,
}

impl HeaderCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw header line, CRLF included or not.
    ///
    /// Returns the number of bytes consumed, which is always the full line.
    pub fn collect(&mut self, line: &[u8]) -> usize {
        let text = String::from_utf8_lossy(line);
        let text = text.trim_end_matches(['\r', '\n']);

        if text.is_empty() {
            return line.len();
        }

        if text.starts_with("HTTP/") {
            self.start_block(text);
            return line.len();
        }

        match text.split_once(':') {
            Some((name, value)) if !name.trim().is_empty() && !name.contains(' ') => {
                let name = name.trim();
                let value = value.trim();
                if name.eq_ignore_ascii_case("set-cookie") {
                    match Cookie::parse(value) {
                        Some(cookie) => self.cookies.push(cookie),
                        None => tracing::debug!(value = %value, "Dropping unparseable Set-Cookie"),
                    }
                }
                self.headers.append(name, value);
            }
            _ => tracing::debug!(line = %text, "Ignoring malformed header line"),
        }

        line.len()
    }

    fn start_block(&mut self, status_line: &str) {
        self.headers = HeaderBag::new();
        self.cookies.clear();

        let mut parts = status_line.splitn(3, ' ');
        let protocol = parts.next().unwrap_or_default();
        let code = parts.next().and_then(|c| c.trim().parse::<u16>().ok());
        let message = parts.next().unwrap_or_default().trim();

        match code {
            Some(code) => {
                self.version = protocol.trim_start_matches("HTTP/").to_string();
                self.code = Some(code);
                self.message = message.to_string();
            }
            None => tracing::debug!(line = %status_line, "Ignoring malformed status line"),
        }
    }

    /// Status code from the last parsed status line.
    pub fn code(&self) -> Option<u16> {
        self.code
    }

    /// Reason phrase from the last status line.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Protocol version, e.g. `1.1` or `2`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Headers of the final block.
    pub fn retrieve(&self) -> HeaderBag {
        self.headers.clone()
    }
}

/// Collects response body bytes.
#[derive(Debug, Clone, Default)]
pub struct ContentCollector {
    content: Vec<u8>,
}

impl ContentCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, returning the number of bytes taken.
    pub fn collect(&mut self, chunk: &[u8]) -> usize {
        self.content.extend_from_slice(chunk);
        chunk.len()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn retrieve(&self) -> Vec<u8> {
        self.content.clone()
    }
}
