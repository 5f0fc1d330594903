//! Outgoing header reconciliation.
//!
//! The transport may substitute header values (a default user agent, for
//! instance). After completion the request's header bag is replaced with what
//! the outgoing-header trace says was actually sent.

use crate::http::request::LogicalRequest;

/// Replace the request headers with the ones found in `trace`.
///
/// The first line is the request line and is discarded. Lines without a
/// `name:` prefix are skipped. Does nothing when no trace was captured.
pub fn reconcile_headers(request: &mut LogicalRequest, trace: Option<&str>) {
    let Some(trace) = trace else {
        return;
    };

    let sent = trace.split("\r\n").skip(1).filter_map(|line| {
        let (name, value) = line.split_once(':')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some((name.to_string(), value.trim().to_string()))
    });

    request.headers.replace(sent);
}
