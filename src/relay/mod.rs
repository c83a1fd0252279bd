pub mod flashbots;

use anyhow::Result;
use async_trait::async_trait;
use ethers::types::{transaction::eip2718::TypedTransaction, U64};

use crate::types::{BundleAck, SignedBundle, SimulationReport};

pub use flashbots::FlashbotsRelay;

/// Private transaction relay accepting atomic bundles.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Signs `transaction` into a single-transaction bundle.
    async fn sign_bundle(&self, transaction: &TypedTransaction) -> Result<SignedBundle>;

    async fn simulate(&self, bundle: &SignedBundle, target_block: U64) -> Result<SimulationReport>;

    async fn send_raw_bundle(&self, bundle: &SignedBundle, target_block: U64) -> Result<BundleAck>;
}
