//! Generic JSON-RPC client over any [`RpcTransport`].

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use tracing::trace;

use crate::envelope::Request;
use crate::envelope::Response;
use crate::error::ClientError;
use crate::transport::RpcTransport;
use crate::transport::TransportKind;

pub struct JsonRpcClient {
    transport: Arc<dyn RpcTransport>,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Sends one request and returns the whole envelope, error object included.
    pub async fn request(&self, method: &str, params: Value) -> Result<Response, ClientError> {
        let request_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();
        debug!(
            request_id,
            method = %method,
            transport = %self.transport.kind(),
            "RPC call started"
        );

        let body = serde_json::to_string(&Request::new(request_id, method, &params))?;
        trace!(request_id, bytes = body.len(), "RPC request serialized");

        let reply = self
            .transport
            .send(request_id, body)
            .await
            .map_err(|source| ClientError::transport(method, &params, source))?;
        trace!(request_id, bytes = reply.len(), "RPC response received");

        let response: Response = serde_json::from_str(&reply)
            .map_err(|err| ClientError::invalid(method, format!("malformed envelope: {err}")))?;
        // A null id is what servers send when they could not read the request.
        if !response.id.is_null() && response.id.as_u64() != Some(request_id) {
            return Err(ClientError::invalid(
                method,
                format!("reply id {} does not match request id {request_id}", response.id),
            ));
        }
        debug!(
            request_id,
            method = %method,
            is_error = response.is_error(),
            elapsed_ms = start.elapsed().as_millis(),
            "RPC call finished"
        );
        Ok(response)
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let response = self.request(method, params.clone()).await?;
        response.into_result(method, &params)
    }

    pub async fn call_as<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ClientError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value)
            .map_err(|err| ClientError::invalid(method, format!("unexpected result shape: {err}")))
    }
}
