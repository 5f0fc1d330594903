//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Kernel, hooks, CLI produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms via the metrics facade)
//!
//! Consumers:
//!     → stderr, pretty or JSON
//!     → whatever metrics recorder the embedding binary installs
//! ```
//!
//! # Design Decisions
//! - Every batch carries a `batch_id` field in its log events
//! - Metrics are no-ops until a recorder is installed
//! - Logging init is idempotent so tests and the CLI can both call it

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
