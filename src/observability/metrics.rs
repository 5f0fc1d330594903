//! Batch metrics.
//!
//! # Metrics
//! - `fanout_batches_total` (counter): batches executed
//! - `fanout_batch_size` (histogram): statements per batch
//! - `fanout_batch_duration_seconds` (histogram): wall time per batch
//! - `fanout_statements_total` (counter): settled statements by method, outcome
//! - `fanout_statement_duration_seconds` (histogram): registration to settlement
//! - `fanout_transport_errors_total` (counter): failures by error kind
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; no exporter is bundled
//! - Outcome label is the status class (`2xx`..`5xx`) or `error`

use std::time::Instant;

pub fn record_batch(size: usize, started: Instant) {
    metrics::counter!("fanout_batches_total").increment(1);
    metrics::histogram!("fanout_batch_size").record(size as f64);
    metrics::histogram!("fanout_batch_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_response(method: &str, status: u16, started: Instant) {
    metrics::counter!(
        "fanout_statements_total",
        "method" => method.to_string(),
        "outcome" => status_class(status)
    )
    .increment(1);
    metrics::histogram!("fanout_statement_duration_seconds", "method" => method.to_string())
        .record(started.elapsed().as_secs_f64());
}

/// `started` is `None` when the request never reached the transport.
pub fn record_failure(method: &str, kind: &'static str, started: Option<Instant>) {
    metrics::counter!(
        "fanout_statements_total",
        "method" => method.to_string(),
        "outcome" => "error"
    )
    .increment(1);
    metrics::counter!("fanout_transport_errors_total", "kind" => kind).increment(1);
    if let Some(started) = started {
        metrics::histogram!("fanout_statement_duration_seconds", "method" => method.to_string())
            .record(started.elapsed().as_secs_f64());
    }
}

fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}
