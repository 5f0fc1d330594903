//! Statement: a logical request bundled with its outcome slot.
//!
//! # States
//! ```text
//! Pending → InFlight → Completed (response set)
//!                    → Failed    (error set)
//! Pending → Failed   (handle could not be created)
//! ```
//!
//! # Design Decisions
//! - One enum holds the state and the outcome, so response and error can
//!   never both be set
//! - Outcomes are written once; later writes are ignored and logged

use crate::http::request::LogicalRequest;
use crate::http::response::Response;
use crate::kernel::error::TransportError;

/// Execution state of a statement within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Pending,
    InFlight,
    Completed,
    Failed,
}

#[derive(Debug)]
enum Outcome {
    Pending,
    InFlight,
    Completed(Box<Response>),
    Failed(TransportError),
}

#[derive(Debug)]
pub struct Statement {
    request: LogicalRequest,
    outcome: Outcome,
}

impl Statement {
    pub fn new(request: LogicalRequest) -> Self {
        Self {
            request,
            outcome: Outcome::Pending,
        }
    }

    pub fn request(&self) -> &LogicalRequest {
        &self.request
    }

    pub(crate) fn request_mut(&mut self) -> &mut LogicalRequest {
        &mut self.request
    }

    pub fn state(&self) -> StatementState {
        match self.outcome {
            Outcome::Pending => StatementState::Pending,
            Outcome::InFlight => StatementState::InFlight,
            Outcome::Completed(_) => StatementState::Completed,
            Outcome::Failed(_) => StatementState::Failed,
        }
    }

    pub fn response(&self) -> Option<&Response> {
        match &self.outcome {
            Outcome::Completed(response) => Some(response),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TransportError> {
        match &self.outcome {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.outcome, Outcome::Completed(_) | Outcome::Failed(_))
    }

    /// Give back the request and the outcome.
    pub fn into_parts(self) -> (LogicalRequest, Result<Response, Option<TransportError>>) {
        let outcome = match self.outcome {
            Outcome::Completed(response) => Ok(*response),
            Outcome::Failed(error) => Err(Some(error)),
            Outcome::Pending | Outcome::InFlight => Err(None),
        };
        (self.request, outcome)
    }

    pub(crate) fn mark_in_flight(&mut self) {
        if matches!(self.outcome, Outcome::Pending) {
            self.outcome = Outcome::InFlight;
        }
    }

    pub(crate) fn set_response(&mut self, response: Response) {
        if self.is_settled() {
            tracing::error!(url = %self.request.url, "Statement already settled, response dropped");
            return;
        }
        self.outcome = Outcome::Completed(Box::new(response));
    }

    pub(crate) fn set_error(&mut self, error: TransportError) {
        if self.is_settled() {
            tracing::error!(url = %self.request.url, "Statement already settled, error dropped");
            return;
        }
        self.outcome = Outcome::Failed(error);
    }
}

impl From<LogicalRequest> for Statement {
    fn from(request: LogicalRequest) -> Self {
        Self::new(request)
    }
}
