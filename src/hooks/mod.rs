//! Lifecycle hook integration.
//!
//! # Data Flow
//! ```text
//! Kernel, per statement:
//!     pre-request        before the handle is prepared
//!     exception          handle creation failed, or no status line received
//!     response-filter    response assembled, observers may still change it
//!     post-terminate     response attached to the statement
//! ```
//!
//! # Design Decisions
//! - The kernel sees only `EventBus::publish`; how observers are registered is
//!   the bus's business
//! - Observers are attached by constructor injection, never discovered
//! - Publishing returns nothing; the kernel never waits on observers

use std::sync::Arc;

use crate::http::request::LogicalRequest;
use crate::http::response::Response;
use crate::kernel::error::TransportError;

pub mod dispatcher;
pub mod logging;

pub use dispatcher::{Dispatcher, Subscriber};
pub use logging::LoggingSubscriber;

/// Hook point names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    PreRequest,
    ResponseFilter,
    Exception,
    PostTerminate,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::PreRequest => "pre-request",
            Topic::ResponseFilter => "response-filter",
            Topic::Exception => "exception",
            Topic::PostTerminate => "post-terminate",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload published at each hook point.
#[derive(Debug)]
pub enum LifecycleEvent<'a> {
    PreRequest {
        request: &'a LogicalRequest,
    },
    ResponseFilter {
        request: &'a LogicalRequest,
        response: &'a mut Response,
    },
    Exception {
        request: &'a LogicalRequest,
        error: &'a TransportError,
    },
    PostTerminate {
        request: &'a LogicalRequest,
        response: &'a Response,
    },
}

impl LifecycleEvent<'_> {
    pub fn topic(&self) -> Topic {
        match self {
            LifecycleEvent::PreRequest { .. } => Topic::PreRequest,
            LifecycleEvent::ResponseFilter { .. } => Topic::ResponseFilter,
            LifecycleEvent::Exception { .. } => Topic::Exception,
            LifecycleEvent::PostTerminate { .. } => Topic::PostTerminate,
        }
    }

    pub fn request(&self) -> &LogicalRequest {
        match self {
            LifecycleEvent::PreRequest { request }
            | LifecycleEvent::ResponseFilter { request, .. }
            | LifecycleEvent::Exception { request, .. }
            | LifecycleEvent::PostTerminate { request, .. } => request,
        }
    }
}

/// Publish-only view of the event bus.
pub trait EventBus {
    fn publish(&self, event: &mut LifecycleEvent<'_>);
}

impl<B: EventBus + ?Sized> EventBus for &B {
    fn publish(&self, event: &mut LifecycleEvent<'_>) {
        (**self).publish(event)
    }
}

impl<B: EventBus + ?Sized> EventBus for Arc<B> {
    fn publish(&self, event: &mut LifecycleEvent<'_>) {
        (**self).publish(event)
    }
}

impl<B: EventBus + ?Sized> EventBus for Box<B> {
    fn publish(&self, event: &mut LifecycleEvent<'_>) {
        (**self).publish(event)
    }
}
