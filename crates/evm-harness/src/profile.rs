//! Fixed launch profile for an isolated regtest node with the EVM feature.

use std::path::Path;
use std::path::PathBuf;

use evm_harness_rpc::Credentials;
use url::Url;
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::supervisor::LaunchSpec;

pub const RPC_USER: &str = "test";
pub const RPC_PASSWORD: &str = "test";

/// Blocks minted before the EVM attribute is flipped; crosses every activation height.
pub const BOOTSTRAP_BLOCKS: u64 = 105;
pub const CONFIRMATION_BLOCKS: u64 = 1;
pub const EVM_FEATURE_ATTRIBUTE: (&str, &str) = ("v0/params/feature/evm", "true");

pub const NODE_LOG_CHILD_ENV: &str = "RUST_LOG";
pub const BACKEND_TYPE_CHILD_ENV: &str = "EVM_BACKEND_TYPE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePorts {
    pub p2p: u16,
    pub chain_rpc: u16,
    pub evm_rpc: u16,
    pub evm_ws: u16,
}

impl Default for NodePorts {
    fn default() -> Self {
        Self {
            p2p: 19555,
            chain_rpc: 19554,
            evm_rpc: 19551,
            evm_ws: 19933,
        }
    }
}

impl NodePorts {
    pub fn chain_rpc_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://127.0.0.1:{}", self.chain_rpc))
    }

    pub fn evm_http_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("http://127.0.0.1:{}", self.evm_rpc))
    }

    pub fn evm_ws_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("ws://127.0.0.1:{}", self.evm_ws))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPair {
    pub owner_address: &'static str,
    pub owner_priv_key: &'static str,
    pub operator_address: &'static str,
    pub operator_priv_key: &'static str,
}

pub const REGTEST_KEYS: KeyPair = KeyPair {
    owner_address: "mwsZw8nF7pKxWH8eoKL9tPxTpaFkz7QeLU",
    owner_priv_key: "cRiRQ9cHmy5evDqNDdEV8f6zfbK6epi9Fpz4CRZsmLEmkwy54dWz",
    operator_address: "mswsMVsyGMj1FzDMbbxw2QW3KvQAv2FKiy",
    operator_priv_key: "cPGEaz8AGiM71NGMRybbCqFNRcuUhg3uGvyY4TFE1BZC26EW2PkC",
};

const DEBUG_EXCLUDES: [&str; 3] = ["libevent", "leveldb", "accountchange"];

/// Fork activation heights, in activation order.
pub const ACTIVATION_HEIGHTS: [(&str, u64); 13] = [
    ("amkheight", 50),
    ("bayfrontheight", 51),
    ("eunosheight", 80),
    ("fortcanningheight", 82),
    ("fortcanninghillheight", 84),
    ("fortcanningroadheight", 86),
    ("fortcanningcrunchheight", 88),
    ("fortcanningspringheight", 90),
    ("fortcanninggreatworldheight", 94),
    ("fortcanningepilogueheight", 96),
    ("grandcentralheight", 101),
    ("nextnetworkupgradeheight", 105),
    ("changiintermediateheight", 105),
];

#[derive(Debug, Clone)]
pub struct NodeProfile {
    pub keys: KeyPair,
    pub ports: NodePorts,
    pub genesis_path: PathBuf,
    pub node_log: String,
    pub backend_type: String,
}

impl NodeProfile {
    pub fn regtest(config: &HarnessConfig) -> Self {
        Self {
            keys: REGTEST_KEYS,
            ports: NodePorts::default(),
            genesis_path: config.genesis_path().to_path_buf(),
            node_log: config.node_log().to_string(),
            backend_type: config.backend_type().to_string(),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(RPC_USER, RPC_PASSWORD)
    }

    /// Full argument list: base flags, then the activation profile.
    pub fn args(&self, work_dir: &Path) -> Vec<String> {
        let mut args = vec![
            format!("-datadir={}", work_dir.display()),
            "-regtest".to_string(),
            format!("-ethstartstate={}", self.genesis_path.display()),
            "-gen=0".to_string(),
            format!("-rpcpassword={RPC_PASSWORD}"),
            format!("-rpcuser={RPC_USER}"),
            "-jellyfish_regtest".to_string(),
            "-logtimemicros".to_string(),
            "-logthreadnames".to_string(),
            "-debug".to_string(),
        ];
        args.extend(
            DEBUG_EXCLUDES
                .iter()
                .map(|category| format!("-debugexclude={category}")),
        );
        args.extend([
            format!("-masternode_operator={}", self.keys.operator_address),
            "-dummypos=1".to_string(),
            "-txnotokens=1".to_string(),
            "-datacarriersize=40000".to_string(),
        ]);
        args.extend(activation_args());
        args
    }

    pub fn env(&self) -> Vec<(String, String)> {
        vec![
            (NODE_LOG_CHILD_ENV.to_string(), self.node_log.clone()),
            (BACKEND_TYPE_CHILD_ENV.to_string(), self.backend_type.clone()),
        ]
    }

    pub fn launch_spec(&self, config: &HarnessConfig, work_dir: PathBuf) -> LaunchSpec {
        LaunchSpec {
            binary: config.node_binary().map(Path::to_path_buf).unwrap_or_default(),
            args: self.args(&work_dir),
            env: self.env(),
            work_dir,
            readiness_pattern: config.readiness_pattern().to_string(),
            timeout: config.startup_timeout(),
            display_log: config.display_log(),
            ports: self.ports,
        }
    }
}

fn activation_args() -> Vec<String> {
    let mut args = vec!["-dummypos=0".to_string(), "-txnotokens=0".to_string()];
    args.extend(
        ACTIVATION_HEIGHTS
            .iter()
            .map(|(flag, height)| format!("-{flag}={height}")),
    );
    args.extend(["-subsidytest=1".to_string(), "-txindex=1".to_string()]);
    args
}

/// `<root>/<uuid v4>`; nothing is created on disk.
pub fn fresh_work_dir(root: &Path) -> PathBuf {
    root.join(Uuid::new_v4().to_string())
}
