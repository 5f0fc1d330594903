//! Native transport boundary.
//!
//! # Data Flow
//! ```text
//! TransportHandle (prepared by the kernel)
//!     → Multiplexer::register
//!     → multiplexer drives I/O for every registered handle on one loop
//!     → collectors inside the handle are fed as bytes arrive
//!     → CompletionNotification { handle, result, diagnostic, transfer }
//! ```
//!
//! # Design Decisions
//! - One multiplexer per batch, created by `Transport::new_multiplexer`
//! - The handle travels into the multiplexer and comes back inside its
//!   completion notification; collectors are never shared
//! - The result code in the notification is authoritative for the outcome

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::kernel::error::HandleCreationError;

pub mod collector;
pub mod handle;
pub mod reqwest_mux;

pub use collector::{ContentCollector, HeaderCollector};
pub use handle::{HandleId, HandleMethod, TransportHandle, Upload};
pub use reqwest_mux::{ReqwestMultiplexer, ReqwestTransport};

/// Transport-level result code reported with each completion.
///
/// Numbering follows the libcurl `CURLcode` table so codes stay meaningful
/// when logged next to other HTTP tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ResultCode(pub u32);

impl ResultCode {
    pub const OK: Self = Self(0);
    pub const FAILED_INIT: Self = Self(2);
    pub const URL_MALFORMAT: Self = Self(3);
    pub const COULDNT_RESOLVE_PROXY: Self = Self(5);
    pub const COULDNT_RESOLVE_HOST: Self = Self(6);
    pub const COULDNT_CONNECT: Self = Self(7);
    pub const READ_ERROR: Self = Self(26);
    pub const OPERATION_TIMEDOUT: Self = Self(28);
    pub const SSL_CONNECT_ERROR: Self = Self(35);
    pub const TOO_MANY_REDIRECTS: Self = Self(47);
    pub const GOT_NOTHING: Self = Self(52);
    pub const SSL_ENGINE_NOTFOUND: Self = Self(53);
    pub const SEND_ERROR: Self = Self(55);
    pub const RECV_ERROR: Self = Self(56);
    pub const SSL_CERTPROBLEM: Self = Self(58);
    pub const SSL_CIPHER: Self = Self(59);
    pub const PEER_FAILED_VERIFICATION: Self = Self(60);
    pub const SSL_CACERT_BADFILE: Self = Self(77);
    pub const SSL_SHUTDOWN_FAILED: Self = Self(80);
    pub const SSL_CRL_BADFILE: Self = Self(82);
    pub const SSL_ISSUER_ERROR: Self = Self(83);
    pub const SSL_PINNEDPUBKEYNOTMATCH: Self = Self(90);
    pub const SSL_INVALIDCERTSTATUS: Self = Self(91);

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timing and size diagnostics for one transfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransferInfo {
    /// URL the transfer was made against.
    pub url: String,
    /// Remote peer address, when a connection was made.
    pub primary_ip: Option<String>,
    pub content_type: Option<String>,
    /// Bytes sent as request body.
    pub size_upload: u64,
    /// Bytes received as response body.
    pub size_download: u64,
    /// Time from transfer start to completion.
    pub total_time: Duration,
    /// Time until the response head arrived.
    pub starttransfer_time: Option<Duration>,
    /// Outgoing request line and headers as sent, CRLF separated.
    pub request_header: Option<String>,
}

/// Event delivered when a registered handle finishes.
#[derive(Debug)]
pub struct CompletionNotification {
    pub handle: TransportHandle,
    pub result: ResultCode,
    /// Native diagnostic text; empty on success.
    pub diagnostic: String,
    pub transfer: TransferInfo,
}

/// Factory for per-batch multiplexers.
pub trait Transport {
    type Multiplexer: Multiplexer;

    fn new_multiplexer(&self) -> Self::Multiplexer;
}

/// Drives many handles concurrently on the calling task.
#[allow(async_fn_in_trait)]
pub trait Multiplexer {
    /// Take ownership of a prepared handle and schedule its transfer.
    fn register(&mut self, handle: TransportHandle) -> Result<(), HandleCreationError>;

    /// Number of handles registered and not yet reported complete.
    fn pending(&self) -> usize;

    /// Drive I/O until one handle completes.
    ///
    /// Returns `None` once nothing is left in flight.
    async fn next_completion(&mut self) -> Option<CompletionNotification>;

    /// Drive every registered handle to completion.
    async fn drive_until_idle(&mut self) -> Vec<CompletionNotification> {
        let mut done = Vec::with_capacity(self.pending());
        while let Some(notification) = self.next_completion().await {
            done.push(notification);
        }
        done
    }

    /// Tear down the multiplexer, cancelling anything still running.
    fn release(self);
}

impl<T: Transport + ?Sized> Transport for &T {
    type Multiplexer = T::Multiplexer;

    fn new_multiplexer(&self) -> Self::Multiplexer {
        (**self).new_multiplexer()
    }
}
