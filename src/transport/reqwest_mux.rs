//! Multiplexer backed by `reqwest`.
//!
//! # Responsibilities
//! - Translate a prepared `TransportHandle` into a native request
//! - Run up to `max_in_flight` transfers at once on the calling task
//! - Feed status line, headers and body chunks into the handle's collectors
//! - Map native failures to result codes with a diagnostic string
//!
//! # Design Decisions
//! - One client per TLS policy, built lazily and dropped with the
//!   multiplexer, so nothing is pooled across batches
//! - Redirects are not followed: a 3xx is the outcome of the one attempt
//! - The whole-request deadline starts when the transfer starts and is
//!   checked around the head and every body chunk, so partial data stays
//!   in the collectors
//! - Default headers are added here and reported in the header trace

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use hyper::ext::ReasonPhrase;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Body, Client, Version};
use tokio::time::Instant;

use crate::config::TransportConfig;
use crate::kernel::error::HandleCreationError;
use crate::transport::{
    CompletionNotification, Multiplexer, ResultCode, TransferInfo, Transport, TransportHandle, Upload,
};

/// Creates one `ReqwestMultiplexer` per batch.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    config: TransportConfig,
}

impl ReqwestTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for ReqwestTransport {
    type Multiplexer = ReqwestMultiplexer;

    fn new_multiplexer(&self) -> ReqwestMultiplexer {
        ReqwestMultiplexer::new(self.config.clone())
    }
}

/// A transfer waiting for a free slot.
struct Queued {
    client: Client,
    request: reqwest::Request,
    handle: TransportHandle,
    transfer: TransferInfo,
}

pub struct ReqwestMultiplexer {
    config: TransportConfig,
    verifying: Option<Client>,
    insecure: Option<Client>,
    backlog: VecDeque<Queued>,
    running: FuturesUnordered<BoxFuture<'static, CompletionNotification>>,
}

impl ReqwestMultiplexer {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            verifying: None,
            insecure: None,
            backlog: VecDeque::new(),
            running: FuturesUnordered::new(),
        }
    }

    /// Transfers currently holding a slot.
    pub fn running(&self) -> usize {
        self.running.len()
    }

    fn client(&mut self, verify: bool) -> Result<Client, HandleCreationError> {
        let slot = if verify { &mut self.verifying } else { &mut self.insecure };
        if let Some(client) = slot {
            return Ok(client.clone());
        }

        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(Duration::from_millis(self.config.connect_timeout_ms))
            .danger_accept_invalid_certs(!verify)
            .danger_accept_invalid_hostnames(!verify)
            .build()
            .map_err(|e| HandleCreationError::Client(error_chain(&e)))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Start queued transfers until the in-flight bound is reached.
    fn fill_slots(&mut self) {
        let limit = self.config.max_in_flight.max(1);
        while self.running.len() < limit {
            let Some(queued) = self.backlog.pop_front() else {
                break;
            };
            tracing::trace!(handle = %queued.handle.id(), url = %queued.transfer.url, "Transfer started");
            self.running.push(Box::pin(perform(queued)));
        }
    }
}

impl Multiplexer for ReqwestMultiplexer {
    fn register(&mut self, handle: TransportHandle) -> Result<(), HandleCreationError> {
        let client = self.client(handle.verifies_peer())?;
        let (request, trace, size_upload) = build_request(&client, &handle, &self.config.user_agent)?;

        let transfer = TransferInfo {
            url: handle.url().to_string(),
            size_upload,
            request_header: handle.captures_header_out().then_some(trace),
            ..Default::default()
        };

        self.backlog.push_back(Queued {
            client,
            request,
            handle,
            transfer,
        });
        Ok(())
    }

    fn pending(&self) -> usize {
        self.backlog.len() + self.running.len()
    }

    async fn next_completion(&mut self) -> Option<CompletionNotification> {
        self.fill_slots();
        let done = self.running.next().await?;
        self.fill_slots();
        Some(done)
    }

    fn release(self) {
        let abandoned = self.pending();
        if abandoned > 0 {
            tracing::warn!(abandoned, "Multiplexer released with transfers still pending");
        }
    }
}

/// Build the native request and the outgoing-header trace.
fn build_request(
    client: &Client,
    handle: &TransportHandle,
    default_user_agent: &str,
) -> Result<(reqwest::Request, String, u64), HandleCreationError> {
    let url = handle.url();
    let method = handle.method().method().clone();

    let mut sent: Vec<(String, String)> = Vec::new();
    for line in handle.headers() {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HandleCreationError::InvalidHeader(line.clone()))?;
        sent.push((name.trim().to_string(), value.trim().to_string()));
    }

    fn has(sent: &[(String, String)], name: &str) -> bool {
        sent.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    // The client fills in Host itself; only the trace needs it then.
    let auto_host = !has(&sent, "host");
    if auto_host {
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        sent.insert(0, ("Host".to_string(), host));
    }

    if !handle.cookie().is_empty() && !has(&sent, "cookie") {
        sent.push(("Cookie".to_string(), handle.cookie().to_string()));
    }
    if !has(&sent, "user-agent") {
        sent.push(("User-Agent".to_string(), default_user_agent.to_string()));
    }
    if !has(&sent, "accept") {
        sent.push(("Accept".to_string(), "*/*".to_string()));
    }

    let (body, size_upload) = match handle.upload() {
        Upload::None => (None, 0),
        Upload::Fields(bytes) => (Some(Body::from(bytes.clone())), bytes.len() as u64),
        Upload::File { path, size } => {
            let file = std::fs::File::open(path).map_err(|source| HandleCreationError::FileUnavailable {
                path: path.clone(),
                source,
            })?;
            if !has(&sent, "content-length") {
                sent.push(("Content-Length".to_string(), size.to_string()));
            }
            (Some(Body::from(tokio::fs::File::from_std(file))), *size)
        }
    };

    let mut headers = HeaderMap::with_capacity(sent.len());
    for (name, value) in sent.iter().skip(usize::from(auto_host)) {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HandleCreationError::InvalidHeader(format!("{}: {}", name, value)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| HandleCreationError::InvalidHeader(format!("{}: {}", name, value)))?;
        headers.append(header_name, header_value);
    }

    let mut builder = client.request(method.clone(), url.clone()).headers(headers);
    if let Some(body) = body {
        builder = builder.body(body);
    }
    let request = builder
        .build()
        .map_err(|e| HandleCreationError::Request(error_chain(&e)))?;

    let target = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };
    // HTTP/1.1 until the response reports the negotiated version.
    let mut trace = format!("{} {} {}\r\n", method, target, version_label(Version::HTTP_11));
    for (name, value) in &sent {
        trace.push_str(&format!("{}: {}\r\n", name, value));
    }
    trace.push_str("\r\n");

    Ok((request, trace, size_upload))
}

/// Failure observed while driving one transfer.
struct Failure {
    code: ResultCode,
    message: String,
}

impl Failure {
    fn timed_out(budget: Duration, received: u64) -> Self {
        Self {
            code: ResultCode::OPERATION_TIMEDOUT,
            message: format!(
                "Operation timed out after {} milliseconds with {} bytes received",
                budget.as_millis(),
                received
            ),
        }
    }
}

impl From<reqwest::Error> for Failure {
    fn from(err: reqwest::Error) -> Self {
        Self {
            code: result_code_for(&err),
            message: error_chain(&err),
        }
    }
}

async fn perform(queued: Queued) -> CompletionNotification {
    let Queued {
        client,
        request,
        mut handle,
        mut transfer,
    } = queued;

    let started = Instant::now();
    let deadline = handle.timeout().map(|budget| (started + budget, budget));
    let outcome = exchange(&client, request, &mut handle, &mut transfer, started, deadline).await;
    transfer.total_time = started.elapsed();

    let (result, diagnostic) = match outcome {
        Ok(()) => (ResultCode::OK, String::new()),
        Err(failure) => {
            tracing::debug!(
                handle = %handle.id(),
                code = %failure.code,
                error = %failure.message,
                "Transfer failed"
            );
            (failure.code, failure.message)
        }
    };

    CompletionNotification {
        handle,
        result,
        diagnostic,
        transfer,
    }
}

async fn exchange(
    client: &Client,
    request: reqwest::Request,
    handle: &mut TransportHandle,
    transfer: &mut TransferInfo,
    started: Instant,
    deadline: Option<(Instant, Duration)>,
) -> Result<(), Failure> {
    let mut response = within(deadline, 0, client.execute(request)).await?;
    transfer.starttransfer_time = Some(started.elapsed());
    transfer.primary_ip = response.remote_addr().map(|addr| addr.ip().to_string());
    transfer.content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(trace) = transfer.request_header.as_mut() {
        stamp_version(trace, response.version());
    }

    let status = response.status();
    // hyper only records the phrase when it differs from the canonical one.
    let reason = match response.extensions().get::<ReasonPhrase>() {
        Some(phrase) => String::from_utf8_lossy(phrase.as_bytes()).into_owned(),
        None => status.canonical_reason().unwrap_or_default().to_string(),
    };
    let status_line = format!(
        "{} {} {}\r\n",
        version_label(response.version()),
        status.as_u16(),
        reason
    );
    let sink = handle.header_sink();
    sink.collect(status_line.as_bytes());
    for (name, value) in response.headers() {
        let line = format!("{}: {}\r\n", name, String::from_utf8_lossy(value.as_bytes()));
        sink.collect(line.as_bytes());
    }
    sink.collect(b"\r\n");

    while let Some(chunk) = within(deadline, transfer.size_download, response.chunk()).await? {
        transfer.size_download += handle.content_sink().collect(&chunk) as u64;
    }
    Ok(())
}

/// Await a native step, bounded by the transfer deadline when there is one.
async fn within<T, F>(deadline: Option<(Instant, Duration)>, received: u64, step: F) -> Result<T, Failure>
where
    F: Future<Output = Result<T, reqwest::Error>>,
{
    match deadline {
        Some((at, budget)) => match tokio::time::timeout_at(at, step).await {
            Ok(result) => result.map_err(Failure::from),
            Err(_) => Err(Failure::timed_out(budget, received)),
        },
        None => step.await.map_err(Failure::from),
    }
}

/// Rewrite the protocol of the trace's request line.
fn stamp_version(trace: &mut String, version: Version) {
    let Some(end) = trace.find("\r\n") else {
        return;
    };
    if let Some(space) = trace[..end].rfind(' ') {
        trace.replace_range(space + 1..end, version_label(version));
    }
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
}

/// Error message with every source appended.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Causes below the top-level error. Its own message embeds the request URL,
/// which must not take part in classification.
fn cause_chain(err: &reqwest::Error) -> String {
    err.source().map(error_chain).unwrap_or_default()
}

/// Whether an I/O error in the chain is a refused connection.
fn refused(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Map a native error to the closest result code.
fn result_code_for(err: &reqwest::Error) -> ResultCode {
    if err.is_timeout() {
        return ResultCode::OPERATION_TIMEDOUT;
    }
    if err.is_redirect() {
        return ResultCode::TOO_MANY_REDIRECTS;
    }
    if err.is_builder() {
        return ResultCode::URL_MALFORMAT;
    }

    if refused(err) {
        return ResultCode::COULDNT_CONNECT;
    }

    let chain = cause_chain(err).to_ascii_lowercase();
    if chain.contains("dns error") || chain.contains("failed to lookup address") || chain.contains("no such host") {
        return ResultCode::COULDNT_RESOLVE_HOST;
    }
    if chain.contains("certificate") || chain.contains("unknownissuer") {
        return ResultCode::PEER_FAILED_VERIFICATION;
    }
    if chain.contains("tls") || chain.contains("ssl") || chain.contains("handshake") {
        return ResultCode::SSL_CONNECT_ERROR;
    }
    if err.is_connect() {
        return ResultCode::COULDNT_CONNECT;
    }
    if chain.contains("connection closed before message completed") {
        return ResultCode::GOT_NOTHING;
    }
    if err.is_body() || err.is_decode() {
        return ResultCode::RECV_ERROR;
    }
    if err.is_request() {
        return ResultCode::SEND_ERROR;
    }
    ResultCode::RECV_ERROR
}
