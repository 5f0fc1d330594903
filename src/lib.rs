//! Concurrent batch HTTP execution kernel.
//!
//! Prepares a batch of logical requests, runs them concurrently over one
//! multiplexed transport, and settles every statement with either a response
//! or a classified transport error. Lifecycle events are published to an
//! injected event bus.

pub mod config;
pub mod hooks;
pub mod http;
pub mod kernel;
pub mod manifest;
pub mod observability;
pub mod transport;

pub use config::KernelConfig;
pub use hooks::{Dispatcher, EventBus, LifecycleEvent, Topic};
pub use http::{LogicalRequest, Response, Statement, StatementState};
pub use kernel::{Kernel, KernelError, TransportError};
pub use transport::ReqwestTransport;
