//! Request/response data model.
//!
//! # Data Flow
//! ```text
//! LogicalRequest (built upstream)
//!     → Statement (request + outcome slot)
//!     → kernel prepares, executes, settles the statement
//!     → Response (assembled) or TransportError (classified)
//! ```

pub mod request;
pub mod response;
pub mod statement;

pub use request::{HeaderBag, LogicalRequest, RequestOptions, UploadedFile};
pub use response::{Cookie, Response};
pub use statement::{Statement, StatementState};
