use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use ethers::{
    prelude::*,
    providers::{Http, Provider},
    types::{transaction::eip2718::TypedTransaction, Address, U256, U64},
};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::config::Config;

/// Source of execution gas estimates for unsigned transactions.
#[async_trait]
pub trait GasEstimator: Send + Sync {
    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256>;
}

pub struct BlockchainClient {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
}

impl BlockchainClient {
    /// Connects to the configured RPC endpoint and refuses to run against a
    /// different chain than the one configured.
    pub async fn new(config: &Config) -> Result<Self> {
        let rpc_url = config.blockchain.rpc_url.as_str();
        info!("Connecting to Ethereum RPC: {}", rpc_url);

        let provider = Arc::new(
            Provider::<Http>::try_from(rpc_url).map_err(|e| anyhow!("Invalid RPC url {}: {}", rpc_url, e))?,
        );

        let remote = provider
            .get_chainid()
            .await
            .map_err(|e| anyhow!("Failed to query chain id from {}: {}", rpc_url, e))?
            .as_u64();

        if remote != config.blockchain.chain_id {
            bail!(
                "RPC serves chain {} but chain {} is configured",
                remote,
                config.blockchain.chain_id
            );
        }

        info!("Connected to chain {}", remote);

        Ok(Self {
            provider,
            chain_id: remote,
        })
    }

    pub fn provider(&self) -> Arc<Provider<Http>> {
        self.provider.clone()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub async fn get_block_number(&self) -> Result<U64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| anyhow!("Failed to get block number: {}", e))
    }

    pub async fn health_check(&self) -> Result<()> {
        debug!("Performing blockchain health check");

        let block_number = self.get_block_number().await?;

        debug!("Health check passed - Block: {}", block_number);

        Ok(())
    }
}

#[async_trait]
impl GasEstimator for BlockchainClient {
    async fn estimate_gas(&self, tx: &TypedTransaction) -> Result<U256> {
        self.provider
            .estimate_gas(tx, None)
            .await
            .map_err(|e| anyhow!("Failed to estimate gas: {}", e))
    }
}

pub fn parse_address(address_str: &str) -> Result<Address> {
    address_str
        .parse::<Address>()
        .map_err(|e| anyhow!("Invalid address format '{}': {}", address_str, e))
}

/// Runs a network-bound call, turning an elapsed deadline into that call's error.
pub async fn within<T, F>(limit: Duration, what: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("{} timed out after {:?}", what, limit)),
    }
}
