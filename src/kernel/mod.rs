//! Batch execution kernel.
//!
//! # Data Flow
//! ```text
//! &mut [Statement]
//!     → preparer.rs (LogicalRequest → TransportHandle)
//!     → Multiplexer (transport drives every handle concurrently)
//!     → engine.rs (correlate completion → statement)
//!         → reconcile.rs (sent header trace → request headers)
//!         → classifier.rs (no status line → TransportError)
//!         → assembler.rs (collectors → Response)
//!     → statements settled, lifecycle events published
//! ```
//!
//! # Design Decisions
//! - Per-statement failures are data, never batch errors
//! - The kernel depends on the transport and event bus only through traits

pub mod assembler;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod preparer;
pub mod reconcile;

pub use assembler::assemble;
pub use classifier::{Classifier, ErrorFamily};
pub use engine::Kernel;
pub use error::{BatchError, HandleCreationError, KernelError, TransportError};
pub use preparer::prepare;
pub use reconcile::reconcile_headers;
