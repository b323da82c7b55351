//! Per-suite setup and teardown around one node.
//!
//! Setup starts the node (fatal on failure), binds the chain client, then
//! bootstraps chain state: both regtest keys are imported,
//! [`BOOTSTRAP_BLOCKS`] are minted, the EVM feature attribute is enabled and
//! one confirmation block is minted. An HTTP EVM client is bound and warmed
//! up before bootstrap; a websocket one is connected after it. Teardown stops
//! the node and removes its working directory.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Instant;

use evm_harness_rpc::ChainClient;
use evm_harness_rpc::ClientError;
use evm_harness_rpc::EvmClient;
use evm_harness_rpc::RawRpc;
use evm_harness_rpc::TransportKind;
use futures_util::FutureExt;
use tokio::sync::Mutex;
use tracing::Instrument;
use tracing::error;
use tracing::info;
use tracing::info_span;

use crate::clients::ClientContext;
use crate::clients::ClientFactory;
use crate::clients::EndpointClientFactory;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::mint;
use crate::mint::MintOutcome;
use crate::mint::MintRequest;
use crate::polling::StopPolicy;
use crate::profile::BOOTSTRAP_BLOCKS;
use crate::profile::CONFIRMATION_BLOCKS;
use crate::profile::EVM_FEATURE_ATTRIBUTE;
use crate::profile::KeyPair;
use crate::profile::NodePorts;
use crate::profile::NodeProfile;
use crate::profile::fresh_work_dir;
use crate::supervisor::NodeInstance;
use crate::supervisor::StopReport;
use crate::supervisor::Supervisor;

/// Ports are fixed, so at most one suite runs per process.
static SUITE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn suite_lock() -> &'static Mutex<()> {
    SUITE_LOCK.get_or_init(|| Mutex::new(()))
}

/// What a suite body sees: clients bound to the node plus mint helpers.
#[derive(Clone)]
pub struct TestContext {
    clients: ClientContext,
    keys: KeyPair,
    work_dir: PathBuf,
    ports: NodePorts,
    ready_at: Instant,
}

impl TestContext {
    pub fn chain(&self) -> &ChainClient {
        self.clients.chain()
    }

    pub fn evm(&self) -> &EvmClient {
        self.clients.evm()
    }

    pub fn raw(&self) -> RawRpc {
        self.clients.raw()
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.clients.transport_kind()
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn ports(&self) -> NodePorts {
        self.ports
    }

    pub fn ready_at(&self) -> Instant {
        self.ready_at
    }

    /// Mints `count` blocks to a fresh wallet address.
    pub async fn generate(&self, count: u64) -> Result<MintOutcome, ClientError> {
        mint::produce(self.chain(), &MintRequest::new(count)).await
    }

    pub async fn generate_with(&self, request: &MintRequest) -> Result<MintOutcome, ClientError> {
        mint::produce(self.chain(), request).await
    }

    pub async fn generate_no_wait(&self) -> Result<(), ClientError> {
        mint::produce_no_wait(self.chain()).await
    }
}

/// Imports the regtest keys, crosses the activation heights and enables the EVM.
pub async fn bootstrap(chain: &ChainClient, keys: &KeyPair) -> Result<(), ClientError> {
    chain.import_priv_key(keys.owner_priv_key).await?;
    chain.import_priv_key(keys.operator_priv_key).await?;
    mint::produce(chain, &MintRequest::new(BOOTSTRAP_BLOCKS)).await?;
    let (key, value) = EVM_FEATURE_ATTRIBUTE;
    chain.set_gov_attributes(&[(key, value)]).await?;
    mint::produce(chain, &MintRequest::new(CONFIRMATION_BLOCKS)).await?;
    info!("Chain bootstrapped with EVM enabled");
    Ok(())
}

pub struct Fixture {
    supervisor: Supervisor,
    node: NodeInstance,
    context: TestContext,
    policy: StopPolicy,
}

impl Fixture {
    /// Starts and bootstraps a node. A node that never becomes ready ends the
    /// process with exit code 1.
    pub async fn setup(
        config: &HarnessConfig,
        factory: &dyn ClientFactory,
        transport: TransportKind,
    ) -> Result<Self, HarnessError> {
        let supervisor = Supervisor::new();
        let profile = NodeProfile::regtest(config);
        let spec = profile.launch_spec(config, fresh_work_dir(config.work_root()));
        let node = supervisor.start_or_exit(spec).await;
        let policy = StopPolicy::from_config(config);

        let clients = match prepare(&node, factory, transport, &profile.keys).await {
            Ok(clients) => clients,
            Err(err) => {
                error!(error = %err, "Fixture setup failed; stopping node");
                if let Err(stop_err) = supervisor.stop(node, &policy).await {
                    error!(error = %stop_err, "Failed to stop node after setup failure");
                }
                return Err(err);
            }
        };

        let context = TestContext {
            clients,
            keys: profile.keys,
            work_dir: node.work_dir().to_path_buf(),
            ports: node.ports(),
            ready_at: node.ready_at(),
        };
        Ok(Self {
            supervisor,
            node,
            context,
            policy,
        })
    }

    pub fn context(&self) -> &TestContext {
        &self.context
    }

    pub fn node(&self) -> &NodeInstance {
        &self.node
    }

    pub async fn teardown(self) -> Result<StopReport, HarnessError> {
        self.supervisor.stop(self.node, &self.policy).await
    }
}

async fn prepare(
    node: &NodeInstance,
    factory: &dyn ClientFactory,
    transport: TransportKind,
    keys: &KeyPair,
) -> Result<ClientContext, HarnessError> {
    let chain = factory.chain(node).await?;
    let evm = match transport {
        TransportKind::Http => {
            let evm = factory.evm(node, transport).await?;
            // The EVM runtime answers its first request slowly.
            evm.chain_id().await?;
            bootstrap(&chain, keys).await?;
            evm
        }
        // The websocket endpoint is opened once the EVM is enabled.
        TransportKind::Ws => {
            bootstrap(&chain, keys).await?;
            factory.evm(node, transport).await?
        }
    };
    Ok(ClientContext::new(chain, evm))
}

/// Runs `body` against a freshly bootstrapped node configured from the environment.
pub async fn run_suite<F, Fut, T>(
    title: &str,
    transport: TransportKind,
    body: F,
) -> Result<T, HarnessError>
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = T>,
{
    let config = HarnessConfig::from_env();
    let factory = EndpointClientFactory::for_profile(&NodeProfile::regtest(&config));
    run_suite_with(title, &config, &factory, transport, body).await
}

pub async fn run_suite_ws<F, Fut, T>(title: &str, body: F) -> Result<T, HarnessError>
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = T>,
{
    run_suite(title, TransportKind::Ws, body).await
}

/// Serializes against other suites, runs setup, the body and teardown.
///
/// Teardown runs even when the body panics; the panic is resumed afterwards.
pub async fn run_suite_with<F, Fut, T>(
    title: &str,
    config: &HarnessConfig,
    factory: &dyn ClientFactory,
    transport: TransportKind,
    body: F,
) -> Result<T, HarnessError>
where
    F: FnOnce(TestContext) -> Fut,
    Fut: Future<Output = T>,
{
    let span = info_span!("suite", title, %transport);
    async move {
        let _serial = suite_lock().lock().await;
        let fixture = Fixture::setup(config, factory, transport).await?;
        info!("Suite started");

        let outcome = AssertUnwindSafe(body(fixture.context().clone()))
            .catch_unwind()
            .await;
        let stopped = fixture.teardown().await;

        match outcome {
            Ok(value) => {
                stopped?;
                info!("Suite finished");
                Ok(value)
            }
            Err(panic) => {
                if let Err(err) = stopped {
                    error!(error = %err, "Teardown after panic failed");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
    .instrument(span)
    .await
}
