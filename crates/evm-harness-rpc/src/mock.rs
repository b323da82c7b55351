use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Instant;

use serde_json::Value;
use serde_json::json;

use crate::error::TransportError;
use crate::transport::InMemoryTransport;
use crate::transport::RpcTransport;
use crate::transport::TransportKind;

#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    Result(Value),
    Error { code: i64, message: String },
    /// Fails below the RPC layer, as a refused connection would.
    TransportFailure(String),
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
    pub at: Instant,
}

#[derive(Default)]
struct MockState {
    sequences: HashMap<String, VecDeque<MockReply>>,
    responses: HashMap<String, MockReply>,
    calls: Vec<RecordedCall>,
}

/// Scripted JSON-RPC endpoint.
///
/// Replies come from a per-method queue first, then from the sticky response
/// for that method; unknown methods answer `-32601 Method not found`. Every
/// call is recorded with the instant it arrived.
///
/// # Example
///
/// ```ignore
/// let node = MockRpc::new();
/// node.set_response("eth_chainId", json!("0x46d"));
/// let evm = EvmClient::with_transport(node.transport(TransportKind::Http));
/// assert_eq!(evm.chain_id().await?, 1133);
/// assert_eq!(node.call_count("eth_chainId"), 1);
/// ```
#[derive(Clone, Default)]
pub struct MockRpc {
    state: Arc<Mutex<MockState>>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_response(&self, method: &str, result: Value) {
        self.state()
            .responses
            .insert(method.to_string(), MockReply::Result(result));
    }

    pub fn set_error(&self, method: &str, code: i64, message: &str) {
        self.state().responses.insert(
            method.to_string(),
            MockReply::Error {
                code,
                message: message.to_string(),
            },
        );
    }

    /// Queues replies consumed one per call before the sticky response applies.
    pub fn push_sequence(&self, method: &str, replies: impl IntoIterator<Item = MockReply>) {
        self.state()
            .sequences
            .entry(method.to_string())
            .or_default()
            .extend(replies);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.state().calls.iter().map(|c| c.method.clone()).collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn params_for(&self, method: &str) -> Vec<Value> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.params.clone())
            .collect()
    }

    pub fn first_call_at(&self) -> Option<Instant> {
        self.state().calls.first().map(|c| c.at)
    }

    fn reply_to(&self, body: &str) -> Result<String, TransportError> {
        let request: Value = serde_json::from_str(body)
            .map_err(|err| TransportError::Handler(format!("bad request json: {err}")))?;
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let params = request.get("params").cloned().unwrap_or(Value::Null);

        let reply = {
            let mut state = self.state();
            state.calls.push(RecordedCall {
                method: method.clone(),
                params,
                at: Instant::now(),
            });
            let queued = state
                .sequences
                .get_mut(&method)
                .and_then(VecDeque::pop_front);
            queued.or_else(|| state.responses.get(&method).cloned())
        };

        let envelope = match reply {
            Some(MockReply::Result(result)) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Some(MockReply::Error { code, message }) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": code, "message": message }
            }),
            Some(MockReply::TransportFailure(message)) => {
                return Err(TransportError::Handler(message));
            }
            None => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": "Method not found" }
            }),
        };
        Ok(envelope.to_string())
    }

    pub fn transport(&self, kind: TransportKind) -> Arc<dyn RpcTransport> {
        let node = self.clone();
        Arc::new(InMemoryTransport::new(kind, move |body| node.reply_to(&body)))
    }
}
