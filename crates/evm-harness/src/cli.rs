#![expect(clippy::print_stdout, reason = "CLI output is emitted here")]

//! `evm-harness` command line.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use clap_complete::generate;
use evm_harness_rpc::ChainClient;
use evm_harness_rpc::Credentials;
use evm_harness_rpc::TransportKind;
use tracing::info;
use url::Url;

use crate::clients::EndpointClientFactory;
use crate::config::HarnessConfig;
use crate::config::NODE_BINARY_ENV;
use crate::fixture::Fixture;
use crate::mint;
use crate::mint::DEFAULT_MAX_ATTEMPTS;
use crate::mint::MintRequest;
use crate::profile::NodeProfile;
use crate::profile::fresh_work_dir;

const PROGRAM_NAME: &str = "evm-harness";

pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
}

const AFTER_LONG_HELP: &str = r#"ENVIRONMENT:
    HARNESS_NODE_BINARY         Node binary to spawn (required for boot)
    HARNESS_DISPLAY_LOG         Forward node output to the log (1/true/yes/on)
    HARNESS_NODE_LOG            Node log level, exported as RUST_LOG (default info)
    HARNESS_BACKEND_TYPE        Exported as EVM_BACKEND_TYPE (default key-value)
    HARNESS_GENESIS_PATH        Genesis state (default ./genesis.json)
    HARNESS_WORK_ROOT           Parent of per-node working directories
    HARNESS_STARTUP_TIMEOUT_MS  Readiness timeout (default 45000)
    HARNESS_STOP_TIMEOUT_MS     Give-up threshold for shutdown (default 30000)
    HARNESS_STOP_POLL_MS        Max liveness poll interval (default 500)

EXAMPLES:
    HARNESS_NODE_BINARY=./build/defid evm-harness boot
    evm-harness mint 10
    evm-harness args"#;

#[derive(Debug, Parser)]
#[command(name = PROGRAM_NAME)]
#[command(author, version, propagate_version = true)]
#[command(about = "Boot an ephemeral EVM-enabled regtest node and drive block production")]
#[command(after_long_help = AFTER_LONG_HELP)]
#[command(subcommand_required = true, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Node binary to spawn
    #[arg(long, global = true, env = NODE_BINARY_ENV, value_name = "PATH")]
    pub node_binary: Option<PathBuf>,

    /// Milliseconds to wait for the readiness marker
    #[arg(long, global = true, value_name = "MS")]
    pub startup_timeout_ms: Option<u64>,

    /// Regex that marks the node as ready
    #[arg(long, global = true, value_name = "REGEX")]
    pub ready_pattern: Option<String>,

    /// Forward node output to the log
    #[arg(long, global = true)]
    pub display_log: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a node, bootstrap it and keep it running until Ctrl-C
    Boot {
        /// Bind the EVM client over WebSocket instead of HTTP
        #[arg(long)]
        ws: bool,
    },

    /// Mint blocks on an already running node
    Mint {
        /// Blocks to mint
        count: u64,

        /// Coinbase address (defaults to a fresh wallet address)
        #[arg(long)]
        address: Option<String>,

        /// Attempt budget; attempts that mint nothing still count
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u64,

        /// Chain RPC endpoint
        #[arg(long, default_value = "http://127.0.0.1:19554")]
        rpc_url: Url,
    },

    /// Print the node command line the profile would use
    Args,

    /// Generate shell completions
    Completions {
        #[arg(value_enum, value_name = "SHELL")]
        shell: Shell,
    },
}

impl Cli {
    pub fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig::from_env();
        if let Some(binary) = &self.node_binary {
            config = config.with_node_binary(binary);
        }
        if let Some(ms) = self.startup_timeout_ms {
            config = config.with_startup_timeout(Duration::from_millis(ms));
        }
        if let Some(pattern) = &self.ready_pattern {
            config = config.with_readiness_pattern(pattern);
        }
        if self.display_log {
            config = config.with_display_log(true);
        }
        config
    }
}

pub async fn run(cli: Cli) -> Result<i32> {
    let config = cli.config();
    match cli.command {
        Commands::Boot { ws } => boot(&config, ws).await,
        Commands::Mint {
            count,
            address,
            max_attempts,
            rpc_url,
        } => {
            let mut request = MintRequest::new(count).with_max_attempts(max_attempts);
            if let Some(address) = address {
                request = request.to_address(address);
            }
            let credentials = NodeProfile::regtest(&config).credentials();
            mint_blocks(rpc_url, credentials, &request).await
        }
        Commands::Args => {
            println!("{}", render_args(&config));
            Ok(exit_codes::SUCCESS)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, PROGRAM_NAME, &mut io::stdout());
            Ok(exit_codes::SUCCESS)
        }
    }
}

async fn boot(config: &HarnessConfig, ws: bool) -> Result<i32> {
    let transport = if ws {
        TransportKind::Ws
    } else {
        TransportKind::Http
    };
    let factory = EndpointClientFactory::for_profile(&NodeProfile::regtest(config));
    let fixture = Fixture::setup(config, &factory, transport)
        .await
        .context("Failed to bootstrap node")?;

    let node = fixture.node();
    let ports = node.ports();
    println!("Node ready (pid {})", node.pid());
    println!("  chain rpc  {}", ports.chain_rpc_url()?);
    println!("  evm http   {}", ports.evm_http_url()?);
    println!("  evm ws     {}", ports.evm_ws_url()?);
    println!("  work dir   {}", node.work_dir().display());
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Interrupt received; stopping node");

    let report = fixture.teardown().await?;
    println!(
        "Node stopped (pid {}) after {}ms",
        report.pid,
        report.waited.as_millis()
    );
    Ok(exit_codes::SUCCESS)
}

async fn mint_blocks(
    rpc_url: Url,
    credentials: Credentials,
    request: &MintRequest,
) -> Result<i32> {
    let chain = ChainClient::http(rpc_url, credentials)?;
    let outcome = mint::produce(&chain, request).await?;
    println!(
        "Minted {}/{} blocks in {} attempts",
        outcome.achieved, request.count, outcome.attempts
    );
    Ok(exit_codes::SUCCESS)
}

/// Child environment and command line, ready to paste into a shell.
fn render_args(config: &HarnessConfig) -> String {
    let profile = NodeProfile::regtest(config);
    let mut spec = profile.launch_spec(config, fresh_work_dir(config.work_root()));
    if spec.binary.as_os_str().is_empty() {
        spec.binary = PathBuf::from(format!("${NODE_BINARY_ENV}"));
    }
    spec.env
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .chain(std::iter::once(spec.command_line()))
        .collect::<Vec<_>>()
        .join(" ")
}
