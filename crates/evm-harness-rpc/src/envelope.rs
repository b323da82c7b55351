//! JSON-RPC 2.0 request/response envelopes.

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;

use crate::error::ClientError;

#[derive(Debug, Clone, Serialize)]
pub struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: &'a Value,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: &'a Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// Full response envelope, kept intact for callers that assert on error shape.
///
/// The chain-native RPC server answers in the 1.0 dialect (no `jsonrpc` field,
/// `"error": null` on success), so every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    /// `Some(Value::Null)` when the node sent `"result": null`, `None` when
    /// the key was absent.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl Response {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Collapses the envelope into the call outcome. A missing or null
    /// `result` on success is `Value::Null` (void wallet calls answer that way).
    pub fn into_result(self, method: &str, params: &Value) -> Result<Value, ClientError> {
        if let Some(error) = self.error {
            return Err(ClientError::Rpc {
                method: method.to_string(),
                params: params.clone(),
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}
