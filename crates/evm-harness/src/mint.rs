//! Block production driver.
//!
//! Advances chain height one block per call. A call that reports no block is
//! skipped, not retried as an error; the loop ends when the requested count is
//! reached or the attempt budget runs out, whichever comes first.

use async_trait::async_trait;
use evm_harness_rpc::ChainClient;
use evm_harness_rpc::ClientError;
use tracing::debug;
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u64 = 1_000_000;

#[async_trait]
pub trait BlockMinter: Send + Sync {
    async fn new_address(&self) -> Result<String, ClientError>;

    /// One single-block mint attempt; returns the blocks the node reports.
    async fn mint_one(&self, address: &str) -> Result<u64, ClientError>;
}

#[async_trait]
impl BlockMinter for ChainClient {
    async fn new_address(&self) -> Result<String, ClientError> {
        self.get_new_address().await
    }

    async fn mint_one(&self, address: &str) -> Result<u64, ClientError> {
        self.generate_to_address(1, address, 1).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintRequest {
    pub count: u64,
    pub address: Option<String>,
    pub max_attempts: u64,
}

impl MintRequest {
    pub fn new(count: u64) -> Self {
        Self {
            count,
            address: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn to_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintOutcome {
    pub achieved: u64,
    pub attempts: u64,
}

impl MintOutcome {
    pub fn is_complete(&self, request: &MintRequest) -> bool {
        self.achieved == request.count
    }
}

pub async fn produce<M>(minter: &M, request: &MintRequest) -> Result<MintOutcome, ClientError>
where
    M: BlockMinter + ?Sized,
{
    let address = match &request.address {
        Some(address) => address.clone(),
        None => minter.new_address().await?,
    };

    let mut outcome = MintOutcome {
        achieved: 0,
        attempts: 0,
    };
    while outcome.achieved < request.count && outcome.attempts < request.max_attempts {
        outcome.attempts += 1;
        if minter.mint_one(&address).await? == 1 {
            outcome.achieved += 1;
        }
    }

    if outcome.is_complete(request) {
        debug!(
            achieved = outcome.achieved,
            attempts = outcome.attempts,
            "Blocks minted"
        );
    } else {
        warn!(
            requested = request.count,
            achieved = outcome.achieved,
            attempts = outcome.attempts,
            "Mint attempt budget exhausted"
        );
    }
    Ok(outcome)
}

/// One mint attempt to a fresh address; the outcome is not checked.
pub async fn produce_no_wait<M>(minter: &M) -> Result<(), ClientError>
where
    M: BlockMinter + ?Sized,
{
    let address = minter.new_address().await?;
    let minted = minter.mint_one(&address).await?;
    debug!(minted, "Single mint attempt issued");
    Ok(())
}
