//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the kernel.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct KernelConfig {
    /// Native transport settings.
    pub transport: TransportConfig,

    /// Defaults applied to every statement of a batch.
    pub batch: BatchOptions,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// User agent sent when the request does not set one.
    pub user_agent: String,

    /// Maximum transfers running at once in one batch (backpressure).
    pub max_in_flight: usize,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("fanout/", env!("CARGO_PKG_VERSION")).to_string(),
            max_in_flight: 64,
            connect_timeout_ms: 10_000,
        }
    }
}

/// Batch-wide execution options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Whole-request timeout for requests that set none, in milliseconds.
    pub default_timeout_ms: Option<u64>,

    /// Skip TLS verification for every request of the batch.
    pub ignore_tls_errors: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Attach the logging subscriber to the lifecycle event bus.
    pub log_events: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_events: false,
        }
    }
}
