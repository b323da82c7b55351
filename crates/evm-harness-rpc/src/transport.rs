//! RPC transports: HTTP, WebSocket and an in-memory handler for tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::SinkExt;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use tracing::trace;
use url::Url;

use crate::error::TransportError;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Http,
    Ws,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Http => "http",
            TransportKind::Ws => "ws",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

/// Moves one serialized request to the node and returns the raw reply text.
///
/// `request_id` is the id carried in `body`. Transports that multiplex one
/// connection use it to pair the reply with its request.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn send(&self, request_id: u64, body: String) -> Result<String, TransportError>;

    fn kind(&self) -> TransportKind;
}

pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    pub fn new(url: Url, credentials: Option<Credentials>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url,
            credentials,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, _request_id: u64, body: String) -> Result<String, TransportError> {
        let mut request = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(credentials) = &self.credentials {
            request = request.basic_auth(&credentials.user, Some(&credentials.password));
        }

        let response = request.send().await?;
        let status = response.status();
        // Error-shaped RPC replies arrive with non-2xx statuses; keep the body.
        let text = response.text().await?;
        if text.trim().is_empty() && !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
            });
        }
        trace!(url = %self.url, status = status.as_u16(), bytes = text.len(), "HTTP reply");
        Ok(text)
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    url: Url,
    socket: Mutex<WsStream>,
}

impl WsTransport {
    pub async fn connect(url: Url) -> Result<Self, TransportError> {
        debug!(url = %url, "Connecting websocket transport");
        let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(Self {
            url,
            socket: Mutex::new(socket),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl RpcTransport for WsTransport {
    async fn send(&self, request_id: u64, body: String) -> Result<String, TransportError> {
        // One request in flight per connection: the lock spans send and reply.
        // Replies to requests whose caller gave up are still on the socket and
        // get skipped by id.
        let mut socket = self.socket.lock().await;
        socket.send(Message::Text(body)).await?;

        loop {
            let frame = socket.next().await.ok_or(TransportError::Closed)??;
            match frame {
                Message::Text(text) => match classify_frame(&text, request_id) {
                    FrameKind::Reply => return Ok(text),
                    FrameKind::Notification => {}
                    FrameKind::Stale(id) => {
                        debug!(
                            url = %self.url,
                            request_id,
                            stale_id = %id,
                            "Discarding stale reply"
                        );
                    }
                },
                Message::Ping(payload) => socket.send(Message::Pong(payload)).await?,
                Message::Pong(_) => {}
                Message::Close(_) => return Err(TransportError::Closed),
                Message::Binary(_) => {
                    return Err(TransportError::UnexpectedFrame(
                        "binary frame; expected text JSON-RPC".to_string(),
                    ));
                }
                Message::Frame(_) => {}
            }
        }
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Ws
    }
}

#[derive(Debug, PartialEq)]
enum FrameKind {
    /// Answer to the pending request, or something only the caller can judge.
    Reply,
    /// Server-initiated message without an id.
    Notification,
    /// Answer to an earlier request.
    Stale(Value),
}

fn classify_frame(text: &str, request_id: u64) -> FrameKind {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return FrameKind::Reply;
    };
    match value.get("id") {
        None if value.get("method").is_some() => FrameKind::Notification,
        None | Some(Value::Null) => FrameKind::Reply,
        Some(id) if id.as_u64() == Some(request_id) => FrameKind::Reply,
        Some(id) => FrameKind::Stale(id.clone()),
    }
}

type Handler = dyn Fn(String) -> Result<String, TransportError> + Send + Sync;

/// Answers requests with a closure instead of a socket.
pub struct InMemoryTransport {
    handler: Arc<Handler>,
    kind: TransportKind,
}

impl InMemoryTransport {
    pub fn new<F>(kind: TransportKind, handler: F) -> Self
    where
        F: Fn(String) -> Result<String, TransportError> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            kind,
        }
    }
}

#[async_trait]
impl RpcTransport for InMemoryTransport {
    async fn send(&self, _request_id: u64, body: String) -> Result<String, TransportError> {
        (self.handler)(body)
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_display() {
        assert_eq!(TransportKind::Http.to_string(), "http");
        assert_eq!(TransportKind::Ws.to_string(), "ws");
        assert_eq!(TransportKind::default(), TransportKind::Http);
    }

    #[test]
    fn frames_are_classified_against_the_pending_id() {
        assert_eq!(
            classify_frame(
                r#"{"jsonrpc":"2.0","method":"eth_subscription","params":{}}"#,
                4
            ),
            FrameKind::Notification
        );
        assert_eq!(
            classify_frame(r#"{"jsonrpc":"2.0","id":4,"result":"0x1"}"#, 4),
            FrameKind::Reply
        );
        assert_eq!(
            classify_frame(r#"{"jsonrpc":"2.0","id":3,"result":"0x1"}"#, 4),
            FrameKind::Stale(Value::from(3))
        );
        assert_eq!(
            classify_frame(
                r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}"#,
                4
            ),
            FrameKind::Reply
        );
        assert_eq!(classify_frame("not json", 4), FrameKind::Reply);
    }

    #[tokio::test]
    async fn in_memory_transport_echoes_through_handler() {
        let transport = InMemoryTransport::new(TransportKind::Ws, |body| Ok(body.to_uppercase()));
        assert_eq!(transport.kind(), TransportKind::Ws);
        assert_eq!(transport.send(1, "ping".to_string()).await.unwrap(), "PING");
    }

    #[test]
    fn http_transport_keeps_url() {
        let url = Url::parse("http://127.0.0.1:19554").unwrap();
        let transport =
            HttpTransport::new(url.clone(), Some(Credentials::new("test", "test"))).unwrap();
        assert_eq!(transport.url(), &url);
        assert_eq!(transport.kind(), TransportKind::Http);
    }
}
