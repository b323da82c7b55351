//! Shared helpers for integration tests: shell-script fake nodes and a spy
//! client factory backed by in-memory RPC endpoints.
#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use evm_harness::ClientFactory;
use evm_harness::HarnessConfig;
use evm_harness::HarnessError;
use evm_harness::LaunchSpec;
use evm_harness::NodeInstance;
use evm_harness::NodePorts;
use evm_harness_rpc::ChainClient;
use evm_harness_rpc::EvmClient;
use evm_harness_rpc::MockRpc;
use evm_harness_rpc::TransportKind;
use serde_json::Value;
use serde_json::json;

pub const READY_LINE: &str = "2024-01-01T00:00:00Z [addcon] addcon thread start";

#[derive(Debug, Clone, Copy)]
pub enum FakeNode {
    /// Prints a few lines, the readiness marker, then sleeps.
    Ready,
    /// Prints the marker on stderr after some stdout chatter.
    ReadyOnStderr,
    /// Never prints the marker.
    Silent,
    /// Exits with status 3 before becoming ready.
    Crash,
    /// Ready, but ignores SIGTERM.
    IgnoresTerm,
    /// Ready, then floods stdout well past a pipe buffer and touches `$1`.
    Chatty,
}

impl FakeNode {
    fn script(self) -> String {
        let body = match self {
            FakeNode::Ready => format!(
                "echo 'init: loading genesis'\necho 'init: opening wallet'\necho '{READY_LINE}'\nexec sleep 600\n"
            ),
            FakeNode::ReadyOnStderr => format!(
                "echo 'stdout chatter'\necho '{READY_LINE}' 1>&2\nexec sleep 600\n"
            ),
            FakeNode::Silent => "echo 'booting'\necho 'still booting' 1>&2\nexec sleep 600\n".to_string(),
            FakeNode::Crash => "echo 'fatal: bad genesis' 1>&2\nexit 3\n".to_string(),
            FakeNode::IgnoresTerm => format!(
                "trap '' TERM\necho '{READY_LINE}'\nwhile true; do sleep 1; done\n"
            ),
            FakeNode::Chatty => format!(
                "echo '{READY_LINE}'\ni=0\nwhile [ $i -lt 20000 ]; do\n  echo \"line $i padding padding padding padding\"\n  i=$((i+1))\ndone\ntouch \"$1\"\nexec sleep 600\n"
            ),
        };
        format!("#!/bin/sh\n{body}")
    }
}

pub fn write_fake_node(dir: &Path, kind: FakeNode) -> PathBuf {
    let path = dir.join(format!("fake-node-{kind:?}").to_lowercase());
    std::fs::write(&path, kind.script()).expect("write fake node");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake node");
    path
}

pub fn launch_spec(binary: PathBuf, work_dir: PathBuf, timeout: Duration) -> LaunchSpec {
    LaunchSpec {
        binary,
        args: Vec::new(),
        env: Vec::new(),
        work_dir,
        readiness_pattern: "addcon thread start".to_string(),
        timeout,
        display_log: true,
        ports: NodePorts::default(),
    }
}

pub fn fixture_config(binary: &Path, work_root: &Path) -> HarnessConfig {
    HarnessConfig::from_env()
        .with_node_binary(binary)
        .with_work_root(work_root)
        .with_startup_timeout(Duration::from_secs(10))
        .with_stop_poll_interval(Duration::from_millis(20))
        .with_stop_timeout(Duration::from_secs(10))
}

pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|it| it.count()).unwrap_or(0)
}

/// In-memory chain and EVM endpoints answering the bootstrap sequence.
#[derive(Clone, Default)]
pub struct SpyFactory {
    pub chain: MockRpc,
    pub evm: MockRpc,
    evm_opened: Arc<Mutex<Vec<(TransportKind, Instant)>>>,
}

impl SpyFactory {
    pub fn new() -> Self {
        let factory = Self::default();
        factory.chain.set_response("importprivkey", Value::Null);
        factory
            .chain
            .set_response("getnewaddress", json!("bcrt1qminer"));
        factory.chain.set_response("generatetoaddress", json!(1));
        factory.chain.set_response("setgov", json!("govtxid"));
        factory.evm.set_response("eth_chainId", json!("0x46d"));
        factory.evm.set_response("eth_blockNumber", json!("0x1"));
        factory
    }

    /// When each EVM client was built, in order.
    pub fn evm_opened(&self) -> Vec<(TransportKind, Instant)> {
        self.evm_opened.lock().expect("spy lock").clone()
    }
}

#[async_trait]
impl ClientFactory for SpyFactory {
    async fn chain(&self, _node: &NodeInstance) -> Result<ChainClient, HarnessError> {
        Ok(ChainClient::with_transport(
            self.chain.transport(TransportKind::Http),
        ))
    }

    async fn evm(
        &self,
        _node: &NodeInstance,
        transport: TransportKind,
    ) -> Result<EvmClient, HarnessError> {
        self.evm_opened
            .lock()
            .expect("spy lock")
            .push((transport, Instant::now()));
        Ok(EvmClient::with_transport(self.evm.transport(transport)))
    }
}
