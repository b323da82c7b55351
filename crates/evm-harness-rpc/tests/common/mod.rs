//! Loopback HTTP and WebSocket JSON-RPC servers for transport tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;

pub fn reply(request: &Value, result: Value) -> String {
    json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }).to_string()
}

pub fn error_reply(request: &Value, code: i64, message: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "error": { "code": code, "message": message }
    })
    .to_string()
}

pub fn method(request: &Value) -> &str {
    request["method"].as_str().unwrap_or_default()
}

async fn bind() -> (TcpListener, std::net::SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("local addr");
    (listener, addr)
}

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

type HttpReply = dyn Fn(&Value) -> (StatusCode, String) + Send + Sync;

#[derive(Clone)]
struct HttpState {
    reply: Arc<HttpReply>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

pub struct HttpNode {
    pub url: Url,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl HttpNode {
    pub async fn spawn<F>(reply: F) -> Self
    where
        F: Fn(&Value) -> (StatusCode, String) + Send + Sync + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = HttpState {
            reply: Arc::new(reply),
            seen: Arc::clone(&seen),
        };
        let app = Router::new().route("/", post(handle_http)).with_state(state);
        let (listener, addr) = bind().await;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            url: Url::parse(&format!("http://{addr}/")).expect("loopback url"),
            seen,
        }
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().expect("seen lock").clone()
    }
}

async fn handle_http(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    state.seen.lock().expect("seen lock").push(SeenRequest {
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: request.clone(),
    });
    (state.reply)(&request)
}

/// What the WebSocket node does in answer to one request.
#[derive(Debug, Clone)]
pub enum Step {
    Send(String),
    Ping(Vec<u8>),
    Delay(Duration),
    Close,
}

type WsScript = dyn Fn(&Value) -> Vec<Step> + Send + Sync;

#[derive(Clone)]
struct WsState {
    script: Arc<WsScript>,
    pongs: Arc<Mutex<Vec<Vec<u8>>>>,
}

pub struct WsNode {
    pub url: Url,
    pongs: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl WsNode {
    pub async fn spawn<F>(script: F) -> Self
    where
        F: Fn(&Value) -> Vec<Step> + Send + Sync + 'static,
    {
        let pongs = Arc::new(Mutex::new(Vec::new()));
        let state = WsState {
            script: Arc::new(script),
            pongs: Arc::clone(&pongs),
        };
        let app = Router::new().route("/", get(upgrade)).with_state(state);
        let (listener, addr) = bind().await;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            url: Url::parse(&format!("ws://{addr}/")).expect("loopback url"),
            pongs,
        }
    }

    pub fn pongs(&self) -> Vec<Vec<u8>> {
        self.pongs.lock().expect("pong lock").clone()
    }

    /// Waits until the server has read at least one pong.
    pub async fn wait_for_pong(&self, within: Duration) -> Vec<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + within;
        while self.pongs().is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.pongs()
    }
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: WsState) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                let Ok(request) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                for step in (state.script)(&request) {
                    let sent = match step {
                        Step::Send(text) => socket.send(Message::Text(text)).await,
                        Step::Ping(payload) => socket.send(Message::Ping(payload)).await,
                        Step::Delay(delay) => {
                            tokio::time::sleep(delay).await;
                            Ok(())
                        }
                        Step::Close => {
                            let _ = socket.send(Message::Close(None)).await;
                            return;
                        }
                    };
                    if sent.is_err() {
                        return;
                    }
                }
            }
            Message::Pong(payload) => state.pongs.lock().expect("pong lock").push(payload),
            _ => {}
        }
    }
}
