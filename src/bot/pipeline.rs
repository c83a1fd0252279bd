use ethers::{
    types::{U256, U64},
    utils::format_units,
};
use futures::future::join;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    blockchain::{within, GasEstimator},
    config::ArbitrageParams,
    errors::SkipReason,
    relay::Relay,
    types::{Bundle, BundleAck, SignedBundle, SimulationReport},
};

/// Outcome of broadcasting the bundle for one target block.
#[derive(Debug, Clone)]
pub struct BlockBroadcast {
    pub target_block: U64,
    pub result: Result<BundleAck, String>,
}

/// A bundle that passed simulation and was broadcast.
#[derive(Debug, Clone)]
pub struct Submission {
    pub signed_bundle: SignedBundle,
    pub simulation: SimulationReport,
    pub gas_limit: U256,
    pub broadcasts: Vec<BlockBroadcast>,
}

impl Submission {
    pub fn accepted_blocks(&self) -> Vec<U64> {
        self.broadcasts
            .iter()
            .filter(|broadcast| broadcast.result.is_ok())
            .map(|broadcast| broadcast.target_block)
            .collect()
    }
}

/// Gas gate, simulation and dual-block broadcast for built bundles.
pub struct SubmissionPipeline {
    gas: Arc<dyn GasEstimator>,
    relay: Arc<dyn Relay>,
    gas_ceiling: U256,
    timeout: Duration,
}

impl SubmissionPipeline {
    pub fn new(gas: Arc<dyn GasEstimator>, relay: Arc<dyn Relay>, params: &ArbitrageParams) -> Self {
        Self {
            gas,
            relay,
            gas_ceiling: params.gas_ceiling,
            timeout: params.network_timeout,
        }
    }

    pub async fn submit(&self, mut bundle: Bundle, block_number: U64) -> Result<Submission, SkipReason> {
        let estimate = within(self.timeout, "gas estimate", self.gas.estimate_gas(&bundle.transaction))
            .await
            .map_err(|e| SkipReason::GasEstimation(e.to_string()))?;

        if estimate > self.gas_ceiling {
            return Err(SkipReason::AnomalousGas {
                estimate,
                ceiling: self.gas_ceiling,
            });
        }

        let gas_limit = estimate * U256::from(2u64);
        bundle.transaction.set_gas(gas_limit);

        let signed_bundle = within(self.timeout, "bundle signing", self.relay.sign_bundle(&bundle.transaction))
            .await
            .map_err(|e| SkipReason::Signing(e.to_string()))?;

        let next_block = block_number + U64::one();
        let simulation = within(self.timeout, "bundle simulation", self.relay.simulate(&signed_bundle, next_block))
            .await
            .map_err(|e| SkipReason::Simulation(e.to_string()))?;

        if let Some(error) = &simulation.error {
            return Err(SkipReason::Simulation(error.clone()));
        }
        if let Some(revert) = &simulation.first_revert {
            return Err(SkipReason::SimulationRevert(revert.clone()));
        }

        if !simulation.total_gas_used.is_zero() {
            let effective = simulation.coinbase_diff / simulation.total_gas_used;
            info!(
                "Simulation gas used {} | effective gas price {} gwei",
                simulation.total_gas_used,
                format_units(effective, "gwei").unwrap_or_else(|_| effective.to_string())
            );
        }

        let broadcasts = self.broadcast(&signed_bundle, next_block).await;

        Ok(Submission {
            signed_bundle,
            simulation,
            gas_limit,
            broadcasts,
        })
    }

    /// Sends the same signed bundle for the next two blocks at once and waits
    /// for both answers.
    async fn broadcast(&self, signed_bundle: &SignedBundle, next_block: U64) -> Vec<BlockBroadcast> {
        let targets = [next_block, next_block + U64::one()];

        let (first, second) = join(self.send(signed_bundle, targets[0]), self.send(signed_bundle, targets[1])).await;

        vec![first, second]
    }

    async fn send(&self, signed_bundle: &SignedBundle, target_block: U64) -> BlockBroadcast {
        let result = within(self.timeout, "bundle broadcast", self.relay.send_raw_bundle(signed_bundle, target_block))
            .await
            .map_err(|e| e.to_string());

        match &result {
            Ok(ack) => info!("Bundle submitted for block {}: {:?}", target_block, ack.bundle_hash),
            Err(e) => warn!("Bundle submission for block {} failed: {}", target_block, e),
        }

        BlockBroadcast { target_block, result }
    }
}
