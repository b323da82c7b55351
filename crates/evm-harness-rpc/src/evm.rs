//! EVM-compatible RPC client used by every assertion-facing test.

use std::sync::Arc;

use serde_json::Value;
use serde_json::json;
use url::Url;

use crate::client::JsonRpcClient;
use crate::error::ClientError;
use crate::error::TransportError;
use crate::quantity;
use crate::raw::RawRpc;
use crate::transport::HttpTransport;
use crate::transport::RpcTransport;
use crate::transport::TransportKind;
use crate::transport::WsTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Earliest,
    Latest,
    Pending,
    Safe,
    Finalized,
    Number(u64),
}

impl BlockTag {
    pub fn to_param(self) -> Value {
        match self {
            BlockTag::Earliest => json!("earliest"),
            BlockTag::Latest => json!("latest"),
            BlockTag::Pending => json!("pending"),
            BlockTag::Safe => json!("safe"),
            BlockTag::Finalized => json!("finalized"),
            BlockTag::Number(n) => json!(quantity::to_quantity(u128::from(n))),
        }
    }
}

impl From<u64> for BlockTag {
    fn from(number: u64) -> Self {
        BlockTag::Number(number)
    }
}

/// Tracer selection for the `debug_trace*` family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tracer {
    /// A tracer built into the node, e.g. `callTracer`.
    Named(String),
    /// A JavaScript tracer body evaluated by the node.
    Custom(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceOptions {
    tracer: Option<Tracer>,
    tracer_config: Option<Value>,
    timeout: Option<String>,
}

impl TraceOptions {
    pub fn call_tracer() -> Self {
        Self::default().with_tracer(Tracer::Named("callTracer".to_string()))
    }

    pub fn custom(body: impl Into<String>) -> Self {
        Self::default().with_tracer(Tracer::Custom(body.into()))
    }

    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }

    pub fn with_tracer_config(mut self, config: Value) -> Self {
        self.tracer_config = Some(config);
        self
    }

    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }

    pub fn to_param(&self) -> Value {
        let mut options = serde_json::Map::new();
        match &self.tracer {
            Some(Tracer::Named(name)) => {
                options.insert("tracer".to_string(), json!(name));
            }
            Some(Tracer::Custom(body)) => {
                options.insert("tracer".to_string(), json!(body));
            }
            None => {}
        }
        if let Some(config) = &self.tracer_config {
            options.insert("tracerConfig".to_string(), config.clone());
        }
        if let Some(timeout) = &self.timeout {
            options.insert("timeout".to_string(), json!(timeout));
        }
        Value::Object(options)
    }
}

#[derive(Clone)]
pub struct EvmClient {
    rpc: Arc<JsonRpcClient>,
}

impl EvmClient {
    pub fn http(url: Url) -> Result<Self, TransportError> {
        Ok(Self::with_transport(Arc::new(HttpTransport::new(url, None)?)))
    }

    pub async fn ws(url: Url) -> Result<Self, TransportError> {
        Ok(Self::with_transport(Arc::new(WsTransport::connect(url).await?)))
    }

    pub fn with_transport(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            rpc: Arc::new(JsonRpcClient::new(transport)),
        }
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.rpc.transport_kind()
    }

    /// Escape hatch returning full envelopes, error objects included.
    pub fn raw(&self) -> RawRpc {
        RawRpc::new(Arc::clone(&self.rpc))
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        self.rpc.call(method, params).await
    }

    async fn call_u64(&self, method: &str, params: Value) -> Result<u64, ClientError> {
        let value = self.rpc.call(method, params).await?;
        quantity::parse_u64(&value).map_err(|err| ClientError::invalid(method, err.to_string()))
    }

    async fn call_u128(&self, method: &str, params: Value) -> Result<u128, ClientError> {
        let value = self.rpc.call(method, params).await?;
        quantity::parse_u128(&value).map_err(|err| ClientError::invalid(method, err.to_string()))
    }

    async fn call_optional(&self, method: &str, params: Value) -> Result<Option<Value>, ClientError> {
        let value = self.rpc.call(method, params).await?;
        Ok((!value.is_null()).then_some(value))
    }

    pub async fn chain_id(&self) -> Result<u64, ClientError> {
        self.call_u64("eth_chainId", json!([])).await
    }

    pub async fn block_number(&self) -> Result<u64, ClientError> {
        self.call_u64("eth_blockNumber", json!([])).await
    }

    pub async fn gas_price(&self) -> Result<u128, ClientError> {
        self.call_u128("eth_gasPrice", json!([])).await
    }

    pub async fn max_priority_fee_per_gas(&self) -> Result<u128, ClientError> {
        self.call_u128("eth_maxPriorityFeePerGas", json!([])).await
    }

    pub async fn get_balance(&self, address: &str, block: BlockTag) -> Result<u128, ClientError> {
        self.call_u128("eth_getBalance", json!([address, block.to_param()]))
            .await
    }

    pub async fn get_transaction_count(
        &self,
        address: &str,
        block: BlockTag,
    ) -> Result<u64, ClientError> {
        self.call_u64("eth_getTransactionCount", json!([address, block.to_param()]))
            .await
    }

    pub async fn get_code(&self, address: &str, block: BlockTag) -> Result<String, ClientError> {
        self.rpc
            .call_as("eth_getCode", json!([address, block.to_param()]))
            .await
    }

    pub async fn get_storage_at(
        &self,
        address: &str,
        slot: &str,
        block: BlockTag,
    ) -> Result<String, ClientError> {
        self.rpc
            .call_as("eth_getStorageAt", json!([address, slot, block.to_param()]))
            .await
    }

    pub async fn get_block(
        &self,
        block: BlockTag,
        full_transactions: bool,
    ) -> Result<Option<Value>, ClientError> {
        self.call_optional(
            "eth_getBlockByNumber",
            json!([block.to_param(), full_transactions]),
        )
        .await
    }

    pub async fn get_block_by_hash(
        &self,
        hash: &str,
        full_transactions: bool,
    ) -> Result<Option<Value>, ClientError> {
        self.call_optional("eth_getBlockByHash", json!([hash, full_transactions]))
            .await
    }

    pub async fn get_transaction(&self, hash: &str) -> Result<Option<Value>, ClientError> {
        self.call_optional("eth_getTransactionByHash", json!([hash]))
            .await
    }

    pub async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<Value>, ClientError> {
        self.call_optional("eth_getTransactionReceipt", json!([hash]))
            .await
    }

    /// Submits a signed transaction and returns its hash.
    pub async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String, ClientError> {
        self.rpc
            .call_as("eth_sendRawTransaction", json!([raw_tx]))
            .await
    }

    pub async fn estimate_gas(&self, call: Value) -> Result<u64, ClientError> {
        self.call_u64("eth_estimateGas", json!([call])).await
    }

    pub async fn eth_call(&self, call: Value, block: BlockTag) -> Result<String, ClientError> {
        self.rpc
            .call_as("eth_call", json!([call, block.to_param()]))
            .await
    }

    pub async fn client_version(&self) -> Result<String, ClientError> {
        self.rpc.call_as("web3_clientVersion", json!([])).await
    }

    /// Keccak-256 of `data` computed by the node.
    pub async fn sha3(&self, data: &str) -> Result<String, ClientError> {
        self.rpc.call_as("web3_sha3", json!([data])).await
    }

    pub async fn trace_transaction(
        &self,
        hash: &str,
        options: &TraceOptions,
    ) -> Result<Value, ClientError> {
        self.rpc
            .call("debug_traceTransaction", json!([hash, options.to_param()]))
            .await
    }

    pub async fn trace_block_by_number(
        &self,
        block: BlockTag,
        options: &TraceOptions,
    ) -> Result<Value, ClientError> {
        self.rpc
            .call(
                "debug_traceBlockByNumber",
                json!([block.to_param(), options.to_param()]),
            )
            .await
    }

    pub async fn trace_block_by_hash(
        &self,
        hash: &str,
        options: &TraceOptions,
    ) -> Result<Value, ClientError> {
        self.rpc
            .call("debug_traceBlockByHash", json!([hash, options.to_param()]))
            .await
    }
}
