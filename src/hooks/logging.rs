//! Subscriber that writes every lifecycle event to the log.

use crate::hooks::{LifecycleEvent, Subscriber};

/// Logs lifecycle events as structured `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSubscriber;

impl Subscriber for LoggingSubscriber {
    fn on_event(&self, event: &mut LifecycleEvent<'_>) {
        let topic = event.topic();
        match event {
            LifecycleEvent::PreRequest { request } => {
                tracing::debug!(topic = %topic, method = %request.method, url = %request.url, "Lifecycle event");
            }
            LifecycleEvent::ResponseFilter { request, response } => {
                tracing::debug!(
                    topic = %topic,
                    url = %request.url,
                    status = response.status_code(),
                    "Lifecycle event"
                );
            }
            LifecycleEvent::Exception { request, error } => {
                tracing::warn!(topic = %topic, url = %request.url, error = %error, "Lifecycle event");
            }
            LifecycleEvent::PostTerminate { request, response } => {
                tracing::info!(
                    topic = %topic,
                    method = %request.method,
                    url = %request.url,
                    status = response.status_code(),
                    bytes = response.body().len(),
                    elapsed_ms = response.transfer().total_time.as_millis() as u64,
                    "Request completed"
                );
            }
        }
    }
}
