#![deny(clippy::all)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! JSON-RPC clients bound to a harnessed node: a chain-native client for
//! wallet, governance and minting, and an EVM client for assertions.

pub mod chain;
pub mod client;
pub mod envelope;
pub mod error;
pub mod evm;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod quantity;
pub mod raw;
pub mod transport;

pub use chain::ChainClient;
pub use client::JsonRpcClient;
pub use envelope::Response;
pub use envelope::RpcErrorObject;
pub use error::ClientError;
pub use error::TransportError;
pub use evm::BlockTag;
pub use evm::EvmClient;
pub use evm::TraceOptions;
pub use evm::Tracer;
#[cfg(any(test, feature = "test-support"))]
pub use mock::{MockReply, MockRpc, RecordedCall};
pub use raw::RawRpc;
pub use transport::Credentials;
pub use transport::HttpTransport;
pub use transport::InMemoryTransport;
pub use transport::RpcTransport;
pub use transport::TransportKind;
pub use transport::WsTransport;

pub type Result<T> = std::result::Result<T, ClientError>;
