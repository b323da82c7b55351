//! Chain-native RPC client: wallet, governance and block minting.
//!
//! Only fixture bootstrap and the block production driver use this client;
//! assertions go through [`crate::EvmClient`].

use std::sync::Arc;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use url::Url;

use crate::client::JsonRpcClient;
use crate::error::ClientError;
use crate::error::TransportError;
use crate::transport::Credentials;
use crate::transport::HttpTransport;
use crate::transport::RpcTransport;

#[derive(Clone)]
pub struct ChainClient {
    rpc: Arc<JsonRpcClient>,
}

impl ChainClient {
    pub fn http(url: Url, credentials: Credentials) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(url, Some(credentials))?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    pub fn with_transport(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            rpc: Arc::new(JsonRpcClient::new(transport)),
        }
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        self.rpc.call(method, params).await
    }

    pub async fn get_new_address(&self) -> Result<String, ClientError> {
        self.rpc.call_as("getnewaddress", json!([])).await
    }

    pub async fn import_priv_key(&self, private_key: &str) -> Result<(), ClientError> {
        self.rpc.call("importprivkey", json!([private_key])).await?;
        Ok(())
    }

    /// Sets governance `ATTRIBUTES` entries and returns the governance txid.
    pub async fn set_gov_attributes(
        &self,
        attributes: &[(&str, &str)],
    ) -> Result<String, ClientError> {
        let entries: Map<String, Value> = attributes
            .iter()
            .map(|(key, value)| ((*key).to_string(), Value::String((*value).to_string())))
            .collect();
        self.rpc
            .call_as("setgov", json!([{ "ATTRIBUTES": entries }, []]))
            .await
    }

    /// One `generatetoaddress` call. Returns how many blocks the node reports
    /// as minted; zero is a legitimate outcome.
    pub async fn generate_to_address(
        &self,
        blocks: u64,
        address: &str,
        max_tries: u64,
    ) -> Result<u64, ClientError> {
        const METHOD: &str = "generatetoaddress";
        let result = self
            .rpc
            .call(METHOD, json!([blocks, address, max_tries]))
            .await?;
        minted_count(&result).ok_or_else(|| {
            ClientError::InvalidResponse {
                method: METHOD.to_string(),
                message: format!("expected block count or hash list, got {result}"),
            }
        })
    }

    pub async fn get_block_count(&self) -> Result<u64, ClientError> {
        self.rpc.call_as("getblockcount", json!([])).await
    }
}

fn minted_count(result: &Value) -> Option<u64> {
    match result {
        Value::Number(n) => n.as_u64(),
        Value::Array(hashes) => Some(hashes.len() as u64),
        _ => None,
    }
}
