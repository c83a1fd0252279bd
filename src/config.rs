use ethers::{
    types::{I256, U256},
    utils::parse_ether,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ArbitrageError;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub blockchain: BlockchainConfig,
    pub tokens: TokenConfig,
    pub executor: ExecutorConfig,
    pub relay: RelayConfig,
    pub markets: MarketsConfig,
    pub arbitrage: ArbitrageConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BlockchainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TokenConfig {
    /// Asset that denominates volume and profit (DAI on mainnet).
    pub reference: String,
    /// Wrapped native fee currency (WETH on mainnet).
    pub native: String,
    /// Constant-product pair used to convert reference units into native units.
    pub native_price_pair: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ExecutorConfig {
    pub contract_address: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelayConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarketsConfig {
    pub uniswap_v2_pairs: Vec<String>,
}

/// Raw arbitrage settings as they appear in the config file. Amounts are
/// decimal strings in whole reference-asset units.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ArbitrageConfig {
    pub profit_floor: String,
    pub incentive_rate_pct: u64,
    pub borrow_fee_bps: u64,
    pub gas_ceiling: u64,
    pub trial_volumes: Vec<String>,
    pub reference_volume: String,
    pub network_timeout_ms: u64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let mut settings = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::Environment::with_prefix("ARBITRAGE").separator("__"));

        if let Ok(rpc_url) = std::env::var("ETHEREUM_RPC_URL") {
            settings = settings.set_override("blockchain.rpc_url", rpc_url)?;
        }

        if let Ok(relay_url) = std::env::var("FLASHBOTS_RELAY_URL") {
            settings = settings.set_override("relay.url", relay_url)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }
}

/// Typed parameters for one evaluation-and-execution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageParams {
    /// Opportunities must strictly exceed this profit to be ranked.
    pub profit_floor: I256,
    /// Share of the converted net profit paid to the block producer.
    pub incentive_rate_pct: u64,
    /// Flash-borrow cost in basis points of the borrowed volume.
    pub borrow_fee_bps: u64,
    /// Estimates above this are treated as anomalous.
    pub gas_ceiling: U256,
    /// Ascending grid walked by the volume sizer.
    pub trial_volumes: Vec<U256>,
    /// Small volume used to price every venue during crossing detection.
    pub reference_volume: U256,
    pub network_timeout: Duration,
}

impl TryFrom<&ArbitrageConfig> for ArbitrageParams {
    type Error = ArbitrageError;

    fn try_from(config: &ArbitrageConfig) -> Result<Self, Self::Error> {
        let profit_floor = I256::from_raw(parse_amount("profit_floor", &config.profit_floor)?);
        let reference_volume = parse_amount("reference_volume", &config.reference_volume)?;

        let trial_volumes = config
            .trial_volumes
            .iter()
            .map(|v| parse_amount("trial_volumes", v))
            .collect::<Result<Vec<_>, _>>()?;

        if trial_volumes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ArbitrageError::Config(
                "trial_volumes must be strictly increasing".to_string(),
            ));
        }

        if config.incentive_rate_pct > 100 {
            return Err(ArbitrageError::Config(format!(
                "incentive_rate_pct must be at most 100, got {}",
                config.incentive_rate_pct
            )));
        }

        if config.network_timeout_ms == 0 {
            return Err(ArbitrageError::Config(
                "network_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(Self {
            profit_floor,
            incentive_rate_pct: config.incentive_rate_pct,
            borrow_fee_bps: config.borrow_fee_bps,
            gas_ceiling: U256::from(config.gas_ceiling),
            trial_volumes,
            reference_volume,
            network_timeout: Duration::from_millis(config.network_timeout_ms),
        })
    }
}

fn parse_amount(field: &str, value: &str) -> Result<U256, ArbitrageError> {
    parse_ether(value)
        .map_err(|e| ArbitrageError::Config(format!("invalid {} '{}': {}", field, value, e)))
}
