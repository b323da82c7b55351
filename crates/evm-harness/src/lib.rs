#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! Boots an ephemeral regtest node with the EVM enabled, drives block
//! production and hands behavioural tests a pair of bound RPC clients.
//!
//! ```ignore
//! use evm_harness::fixture::run_suite;
//! use evm_harness_rpc::{BlockTag, TransportKind};
//!
//! #[tokio::test]
//! async fn latest_block_advances() {
//!     run_suite("block number", TransportKind::Http, |ctx| async move {
//!         let before = ctx.evm().block_number().await.unwrap();
//!         ctx.generate(2).await.unwrap();
//!         assert_eq!(ctx.evm().block_number().await.unwrap(), before + 2);
//!     })
//!     .await
//!     .unwrap();
//! }
//! ```

pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod fixture;
pub mod mint;
pub mod polling;
pub mod process;
pub mod profile;
pub mod supervisor;
pub mod telemetry;
#[cfg(test)]
mod test_support;

pub use clients::ClientContext;
pub use clients::ClientFactory;
pub use clients::EndpointClientFactory;
pub use config::HarnessConfig;
pub use error::HarnessError;
pub use error::StartupError;
pub use fixture::Fixture;
pub use fixture::TestContext;
pub use fixture::run_suite;
pub use fixture::run_suite_with;
pub use fixture::run_suite_ws;
pub use mint::BlockMinter;
pub use mint::MintOutcome;
pub use mint::MintRequest;
pub use profile::NodePorts;
pub use profile::NodeProfile;
pub use supervisor::LaunchSpec;
pub use supervisor::NodeInstance;
pub use supervisor::Supervisor;
