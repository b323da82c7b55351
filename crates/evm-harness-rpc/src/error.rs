use serde_json::Value;
use thiserror::Error;

/// Failure below the JSON-RPC layer: nothing usable came back from the node.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http status {status} with empty body")]
    HttpStatus { status: u16 },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("websocket closed by peer")]
    Closed,

    #[error("unexpected frame: {0}")]
    UnexpectedFrame(String),

    #[error("in-memory handler failed: {0}")]
    Handler(String),
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Failed to send custom request ({method} ({params})): {message}")]
    Transport {
        method: String,
        params: Value,
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("RPC error ({code}) from {method}: {message}")]
    Rpc {
        method: String,
        params: Value,
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("Invalid response to {method}: {message}")]
    InvalidResponse { method: String, message: String },

    #[error("Failed to serialize request: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    pub(crate) fn transport(method: &str, params: &Value, source: TransportError) -> Self {
        ClientError::Transport {
            method: method.to_string(),
            params: params.clone(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    pub(crate) fn invalid(method: &str, message: impl Into<String>) -> Self {
        ClientError::InvalidResponse {
            method: method.to_string(),
            message: message.into(),
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            ClientError::Transport { method, .. }
            | ClientError::Rpc { method, .. }
            | ClientError::InvalidResponse { method, .. } => Some(method),
            ClientError::Serialization(_) => None,
        }
    }

    pub fn params(&self) -> Option<&Value> {
        match self {
            ClientError::Transport { params, .. } | ClientError::Rpc { params, .. } => Some(params),
            _ => None,
        }
    }

    /// JSON-RPC error code when the node answered with an error object.
    pub fn code(&self) -> Option<i64> {
        match self {
            ClientError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }
}
