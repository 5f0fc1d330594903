//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fanout::hooks::{LifecycleEvent, Subscriber, Topic};
use fanout::kernel::HandleCreationError;
use fanout::transport::{
    CompletionNotification, ContentCollector, HeaderCollector, Multiplexer, ResultCode, TransferInfo, Transport,
    TransportHandle,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

/// Request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MockRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What a mock backend sends back.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub delay: Duration,
}

impl MockReply {
    pub fn new(status: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Start a simple mock backend that returns a fixed response.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { MockReply::new("200 OK", response) }).await
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MockReply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let reply = f(request).await;
                        if !reply.delay.is_zero() {
                            tokio::time::sleep(reply.delay).await;
                        }
                        let mut head = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                            reply.status,
                            reply.body.len()
                        );
                        for (name, value) in &reply.headers {
                            head.push_str(&format!("{}: {}\r\n", name, value));
                        }
                        head.push_str("\r\n");
                        let _ = socket.write_all(head.as_bytes()).await;
                        let _ = socket.write_all(&reply.body).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Backend that echoes method, target and body of every request.
pub async fn start_echo_backend() -> SocketAddr {
    start_programmable_backend(|req: MockRequest| async move {
        let mut body = format!("{} {}\n", req.method, req.target).into_bytes();
        body.extend_from_slice(&req.body);
        MockReply::new("200 OK", body).header("Content-Type", "text/plain")
    })
    .await
}

/// A local address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn read_request(socket: &mut TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(MockRequest {
        method,
        target,
        headers,
        body,
    })
}

/// Canned behaviour of the scripted transport for one URL.
#[derive(Debug, Clone)]
pub enum Script {
    /// Feed a raw header block and body, then complete with `OK`.
    Respond { head: &'static str, body: &'static [u8] },
    /// Feed a header block and body, then complete with an error code.
    Partial {
        head: &'static str,
        body: &'static [u8],
        code: ResultCode,
    },
    /// Complete without any response data.
    Fail { code: ResultCode, message: &'static str },
    /// Reject the handle at registration.
    Reject,
    /// Complete with a handle this batch never registered.
    Stray,
}

/// In-memory transport that completes handles from a script, in reverse
/// registration order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    routes: Arc<HashMap<String, Script>>,
    /// Extra header lines reported as sent, after the handle's own.
    added_headers: Vec<String>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, script: Script) -> Self {
        Arc::make_mut(&mut self.routes).insert(url.to_string(), script);
        self
    }

    pub fn adds_header(mut self, line: &str) -> Self {
        self.added_headers.push(line.to_string());
        self
    }
}

impl Transport for ScriptedTransport {
    type Multiplexer = ScriptedMultiplexer;

    fn new_multiplexer(&self) -> ScriptedMultiplexer {
        ScriptedMultiplexer {
            transport: self.clone(),
            queued: VecDeque::new(),
        }
    }
}

pub struct ScriptedMultiplexer {
    transport: ScriptedTransport,
    queued: VecDeque<TransportHandle>,
}

impl Multiplexer for ScriptedMultiplexer {
    fn register(&mut self, handle: TransportHandle) -> Result<(), HandleCreationError> {
        if let Some(Script::Reject) = self.transport.routes.get(handle.url().as_str()) {
            return Err(HandleCreationError::Client("scripted rejection".into()));
        }
        self.queued.push_back(handle);
        Ok(())
    }

    fn pending(&self) -> usize {
        self.queued.len()
    }

    async fn next_completion(&mut self) -> Option<CompletionNotification> {
        let mut handle = self.queued.pop_back()?;
        tokio::task::yield_now().await;

        let mut trace = format!("{} {} HTTP/1.1\r\n", handle.method().method(), handle.url().path());
        for line in handle.headers().iter().chain(self.transport.added_headers.iter()) {
            trace.push_str(line);
            trace.push_str("\r\n");
        }
        trace.push_str("\r\n");

        let mut transfer = TransferInfo {
            url: handle.url().to_string(),
            request_header: handle.captures_header_out().then_some(trace),
            ..Default::default()
        };

        let script = self
            .transport
            .routes
            .get(handle.url().as_str())
            .cloned()
            .unwrap_or(Script::Fail {
                code: ResultCode::COULDNT_RESOLVE_HOST,
                message: "Could not resolve host",
            });

        let (result, diagnostic) = match script {
            Script::Respond { head, body } => {
                feed(&mut handle, head, body);
                transfer.size_download = body.len() as u64;
                (ResultCode::OK, String::new())
            }
            Script::Partial { head, body, code } => {
                feed(&mut handle, head, body);
                (code, "connection reset mid-body".to_string())
            }
            Script::Fail { code, message } => (code, message.to_string()),
            Script::Reject => (ResultCode::FAILED_INIT, "unreachable".to_string()),
            Script::Stray => {
                handle = TransportHandle::new(handle.url().clone(), ContentCollector::new(), HeaderCollector::new());
                (ResultCode::OK, String::new())
            }
        };

        Some(CompletionNotification {
            handle,
            result,
            diagnostic,
            transfer,
        })
    }

    fn release(self) {}
}

fn feed(handle: &mut TransportHandle, head: &str, body: &[u8]) {
    for line in head.split_inclusive("\r\n") {
        handle.header_sink().collect(line.as_bytes());
    }
    handle.content_sink().collect(body);
}

/// Subscriber that records `(topic, url)` for every event it sees.
#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Arc<Mutex<Vec<(Topic, String)>>>,
}

impl Recorder {
    pub fn snapshot(&self) -> Vec<(Topic, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn topics_for(&self, url: &str) -> Vec<Topic> {
        self.snapshot()
            .into_iter()
            .filter(|(_, u)| u == url)
            .map(|(t, _)| t)
            .collect()
    }
}

impl Subscriber for Recorder {
    fn on_event(&self, event: &mut LifecycleEvent<'_>) {
        let url = event.request().url.clone();
        self.events.lock().unwrap().push((event.topic(), url));
    }
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}
