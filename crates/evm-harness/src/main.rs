//! CLI entrypoint for evm-harness.
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

use anyhow::Result;
use clap::Parser;
use evm_harness::cli;
use evm_harness::cli::Cli;
use evm_harness::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let telemetry = telemetry::init_tracing("info");
    let exit_code = cli::run(cli).await?;
    drop(telemetry);
    std::process::exit(exit_code);
}
