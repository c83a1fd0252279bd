use ethers::types::U256;
use thiserror::Error;

use crate::{bot::RunReport, types::BundleEconomics};

/// Why a ranked opportunity was dropped before reaching the relay. None of
/// these end the run; the next opportunity is tried.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("call data generation failed: {0}")]
    CallData(String),

    #[error("native price lookup failed: {0}")]
    PriceLookup(String),

    #[error("unprofitable after fees and incentive: take home {}", .0.take_home)]
    Unprofitable(BundleEconomics),

    #[error("transaction encoding failed: {0}")]
    Encoding(String),

    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("gas estimate {estimate} exceeds ceiling {ceiling}")]
    AnomalousGas { estimate: U256, ceiling: U256 },

    #[error("bundle signing failed: {0}")]
    Signing(String),

    #[error("simulation failed: {0}")]
    Simulation(String),

    #[error("simulation reverted: {0}")]
    SimulationRevert(String),
}

#[derive(Debug, Error)]
pub enum ArbitrageError {
    #[error("no arbitrage submitted to relay ({} candidates attempted)", .0.attempts.len())]
    ExhaustedCandidates(RunReport),

    #[error("invalid configuration: {0}")]
    Config(String),
}
