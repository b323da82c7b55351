//! Binds chain and EVM clients to a ready node.

use async_trait::async_trait;
use evm_harness_rpc::ChainClient;
use evm_harness_rpc::Credentials;
use evm_harness_rpc::EvmClient;
use evm_harness_rpc::RawRpc;
use evm_harness_rpc::TransportKind;
use tracing::debug;

use crate::error::HarnessError;
use crate::profile::NodeProfile;
use crate::supervisor::NodeInstance;

/// Both client handles for one node, built together.
#[derive(Clone)]
pub struct ClientContext {
    chain: ChainClient,
    evm: EvmClient,
}

impl ClientContext {
    pub fn new(chain: ChainClient, evm: EvmClient) -> Self {
        Self { chain, evm }
    }

    pub fn chain(&self) -> &ChainClient {
        &self.chain
    }

    pub fn evm(&self) -> &EvmClient {
        &self.evm
    }

    pub fn raw(&self) -> RawRpc {
        self.evm.raw()
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.evm.transport_kind()
    }
}

/// Builds client handles for a ready node. Taking `&NodeInstance` keeps
/// client construction after readiness.
///
/// The two handles are built separately so a fixture can bootstrap through
/// the chain client before opening the EVM connection.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn chain(&self, node: &NodeInstance) -> Result<ChainClient, HarnessError>;

    async fn evm(
        &self,
        node: &NodeInstance,
        transport: TransportKind,
    ) -> Result<EvmClient, HarnessError>;

    async fn connect(
        &self,
        node: &NodeInstance,
        transport: TransportKind,
    ) -> Result<ClientContext, HarnessError> {
        let chain = self.chain(node).await?;
        let evm = self.evm(node, transport).await?;
        Ok(ClientContext::new(chain, evm))
    }
}

/// Loopback endpoints on the node's fixed ports.
#[derive(Debug, Clone)]
pub struct EndpointClientFactory {
    credentials: Credentials,
}

impl EndpointClientFactory {
    /// Authenticates with the RPC user the profile launches the node with.
    pub fn for_profile(profile: &NodeProfile) -> Self {
        Self::with_credentials(profile.credentials())
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl ClientFactory for EndpointClientFactory {
    async fn chain(&self, node: &NodeInstance) -> Result<ChainClient, HarnessError> {
        let url = node.ports().chain_rpc_url()?;
        Ok(ChainClient::http(url, self.credentials.clone())?)
    }

    async fn evm(
        &self,
        node: &NodeInstance,
        transport: TransportKind,
    ) -> Result<EvmClient, HarnessError> {
        let ports = node.ports();
        let evm = match transport {
            TransportKind::Http => EvmClient::http(ports.evm_http_url()?)?,
            TransportKind::Ws => EvmClient::ws(ports.evm_ws_url()?).await?,
        };
        debug!(pid = node.pid(), %transport, "EVM client bound to node");
        Ok(evm)
    }
}
