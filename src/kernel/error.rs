//! Error taxonomy for batch execution.
//!
//! # Design Decisions
//! - `TransportError` is a closed set; callers match it exhaustively
//! - Per-statement failures are recorded on the statement, never returned
//!   from `execute`
//! - `BatchError` is reserved for internal-consistency violations

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::{HandleId, ResultCode};

/// Why a request did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request did not finish within its timeout.
    #[error("Request timed out: {message}")]
    Timeout { message: String },

    /// TLS handshake or certificate verification failed.
    #[error("TLS failure: {message}")]
    TlsFailure { message: String },

    /// The host name could not be resolved.
    #[error("Host not found: {message}")]
    HostNotFound { message: String },

    /// Any other transport failure, with the native code kept verbatim.
    #[error("Transport failure ({code}): {message}")]
    GenericTransportFailure { message: String, code: ResultCode },
}

impl TransportError {
    pub fn message(&self) -> &str {
        match self {
            TransportError::Timeout { message }
            | TransportError::TlsFailure { message }
            | TransportError::HostNotFound { message }
            | TransportError::GenericTransportFailure { message, .. } => message,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout { .. } => "timeout",
            TransportError::TlsFailure { .. } => "tls",
            TransportError::HostNotFound { .. } => "host_not_found",
            TransportError::GenericTransportFailure { .. } => "transport",
        }
    }
}

/// The native transport could not set up a handle.
#[derive(Debug, Error)]
pub enum HandleCreationError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Upload file '{}' unavailable: {source}", path.display())]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid header line '{0}'")]
    InvalidHeader(String),

    #[error("Transport client unavailable: {0}")]
    Client(String),

    #[error("Request rejected by transport: {0}")]
    Request(String),
}

impl HandleCreationError {
    /// The per-statement error recorded when a handle cannot be created.
    pub fn into_transport_error(self) -> TransportError {
        TransportError::GenericTransportFailure {
            message: format!("transport connection error: {}", self),
            code: ResultCode::FAILED_INIT,
        }
    }
}

/// Failure of the batch as a whole.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The multiplexer reported a handle this batch never registered.
    #[error("Completion for unregistered {0}")]
    UnknownHandle(HandleId),
}

/// Errors surfaced by the top-level `handle` entry point.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    /// The statement finished the batch without an outcome.
    #[error("Request produced no outcome")]
    NoOutcome,
}
