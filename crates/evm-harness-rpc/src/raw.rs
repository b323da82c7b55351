use std::sync::Arc;

use serde_json::Value;

use crate::client::JsonRpcClient;
use crate::envelope::Response;
use crate::error::ClientError;

/// Issues arbitrary methods and hands back the untouched envelope.
///
/// Error-shaped replies are returned as `Ok(Response { error: Some(..), .. })`
/// so tests can assert on codes and messages; only transport failures and
/// unparseable replies are `Err`.
#[derive(Clone)]
pub struct RawRpc {
    rpc: Arc<JsonRpcClient>,
}

impl RawRpc {
    pub(crate) fn new(rpc: Arc<JsonRpcClient>) -> Self {
        Self { rpc }
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Response, ClientError> {
        self.rpc.request(method, params).await
    }
}
