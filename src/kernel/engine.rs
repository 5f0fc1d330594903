//! Batch execution engine.
//!
//! # Responsibilities
//! - Prepare every statement of a batch and register its handle
//! - Drive the multiplexer until every handle has completed
//! - Correlate each completion with its statement by handle identity
//! - Settle statements with a response or a classified error
//! - Publish lifecycle events around each request
//!
//! # Design Decisions
//! - One multiplexer per `execute` call, released before returning
//! - The handle → statement table lives only as long as the batch
//! - Completions are handled one at a time on the calling task, so
//!   statements need no synchronization
//! - Individual failures never abort the batch; an unknown handle does

use std::collections::HashMap;
use std::time::Instant;

use uuid::Uuid;

use crate::config::BatchOptions;
use crate::hooks::{EventBus, LifecycleEvent};
use crate::http::request::LogicalRequest;
use crate::http::response::Response;
use crate::http::statement::Statement;
use crate::kernel::assembler::assemble;
use crate::kernel::classifier::Classifier;
use crate::kernel::error::{BatchError, KernelError, TransportError};
use crate::kernel::preparer::prepare;
use crate::kernel::reconcile::reconcile_headers;
use crate::observability::metrics;
use crate::transport::{CompletionNotification, HandleId, Multiplexer, Transport};

/// Executes batches of statements over a transport.
#[derive(Debug)]
pub struct Kernel<T, B> {
    transport: T,
    bus: B,
    options: BatchOptions,
    classifier: Classifier,
}

impl<T, B> Kernel<T, B>
where
    T: Transport,
    B: EventBus,
{
    pub fn new(transport: T, bus: B) -> Self {
        Self {
            transport,
            bus,
            options: BatchOptions::default(),
            classifier: Classifier::default(),
        }
    }

    pub fn with_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run every statement concurrently and settle each one.
    ///
    /// Returns once the multiplexer reports all handles complete. Results are
    /// read back from the statements; completion order is not submission order.
    pub async fn execute(&self, statements: &mut [Statement]) -> Result<&Self, BatchError> {
        let batch_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::debug!(batch_id = %batch_id, size = statements.len(), "Batch starting");

        let mut batch = Batch {
            id: batch_id,
            mux: self.transport.new_multiplexer(),
            bus: &self.bus,
            classifier: &self.classifier,
            owners: HashMap::with_capacity(statements.len()),
        };

        for (index, statement) in statements.iter_mut().enumerate() {
            batch.submit(index, statement, &self.options);
        }

        let outcome = batch.run(statements).await;
        let Batch { mux, .. } = batch;
        mux.release();

        metrics::record_batch(statements.len(), started);
        match outcome {
            Ok(()) => {
                tracing::debug!(
                    batch_id = %batch_id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Batch complete"
                );
                Ok(self)
            }
            Err(e) => {
                tracing::error!(batch_id = %batch_id, error = %e, "Batch aborted");
                Err(e)
            }
        }
    }

    /// Execute a single request as its own batch.
    ///
    /// With `catch` set, any failure becomes a 500 response carrying the
    /// error message; otherwise the error is returned.
    pub async fn handle(&self, request: LogicalRequest, catch: bool) -> Result<Response, KernelError> {
        match self.handle_raw(request).await {
            Ok(response) => Ok(response),
            Err(e) if catch => {
                tracing::debug!(error = %e, "Converting failure into error response");
                Ok(Response::from_error(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn handle_raw(&self, request: LogicalRequest) -> Result<Response, KernelError> {
        let mut statements = [Statement::new(request)];
        self.execute(&mut statements).await?;
        let [statement] = statements;
        match statement.into_parts().1 {
            Ok(response) => Ok(response),
            Err(Some(error)) => Err(KernelError::Transport(error)),
            Err(None) => Err(KernelError::NoOutcome),
        }
    }
}

/// What the batch remembers about a registered handle.
struct InFlight {
    index: usize,
    started: Instant,
}

/// State of one `execute` call.
struct Batch<'k, M, B> {
    id: Uuid,
    mux: M,
    bus: &'k B,
    classifier: &'k Classifier,
    owners: HashMap<HandleId, InFlight>,
}

impl<M, B> Batch<'_, M, B>
where
    M: Multiplexer,
    B: EventBus,
{
    /// Prepare and register one statement. Failures settle the statement.
    fn submit(&mut self, index: usize, statement: &mut Statement, options: &BatchOptions) {
        self.bus.publish(&mut LifecycleEvent::PreRequest {
            request: statement.request(),
        });

        let registered = prepare(statement, options).and_then(|handle| {
            let id = handle.id();
            self.mux.register(handle).map(|()| id)
        });

        match registered {
            Ok(id) => {
                tracing::trace!(batch_id = %self.id, handle = %id, url = %statement.request().url, "Handle registered");
                statement.mark_in_flight();
                self.owners.insert(
                    id,
                    InFlight {
                        index,
                        started: Instant::now(),
                    },
                );
            }
            Err(e) => {
                tracing::warn!(batch_id = %self.id, url = %statement.request().url, error = %e, "Handle creation failed");
                let error = e.into_transport_error();
                metrics::record_failure(statement.request().method.as_str(), error.kind(), None);
                self.fail(statement, error);
            }
        }
    }

    /// Drive the multiplexer and settle statements as handles complete.
    async fn run(&mut self, statements: &mut [Statement]) -> Result<(), BatchError> {
        while let Some(notification) = self.mux.next_completion().await {
            let id = notification.handle.id();
            let Some(owner) = self.owners.remove(&id) else {
                return Err(BatchError::UnknownHandle(id));
            };
            let statement = &mut statements[owner.index];
            self.complete(statement, notification, owner.started);
        }
        Ok(())
    }

    fn complete(&self, statement: &mut Statement, notification: CompletionNotification, started: Instant) {
        let CompletionNotification {
            handle,
            result,
            diagnostic,
            transfer,
        } = notification;
        let handle_id = handle.id();

        reconcile_headers(statement.request_mut(), transfer.request_header.as_deref());

        let (content, headers) = handle.into_collectors();
        let method = statement.request().method.as_str().to_string();

        if headers.code().is_none() {
            let error = self.classifier.classify(&diagnostic, result);
            tracing::debug!(
                batch_id = %self.id,
                handle = %handle_id,
                code = %result,
                error = %error,
                "No response received"
            );
            metrics::record_failure(&method, error.kind(), Some(started));
            self.fail(statement, error);
            return;
        }

        if !result.is_ok() {
            tracing::debug!(
                batch_id = %self.id,
                handle = %handle_id,
                code = %result,
                diagnostic = %diagnostic,
                "Transfer ended with error after response head, keeping partial response"
            );
        }

        let mut response = assemble(&content, &headers, transfer);
        self.bus.publish(&mut LifecycleEvent::ResponseFilter {
            request: statement.request(),
            response: &mut response,
        });

        metrics::record_response(&method, response.status_code(), started);
        statement.set_response(response);

        if let Some(response) = statement.response() {
            self.bus.publish(&mut LifecycleEvent::PostTerminate {
                request: statement.request(),
                response,
            });
        }
    }

    fn fail(&self, statement: &mut Statement, error: TransportError) {
        self.bus.publish(&mut LifecycleEvent::Exception {
            request: statement.request(),
            error: &error,
        });
        statement.set_error(error);
    }
}
