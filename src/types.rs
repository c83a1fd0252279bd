use bigdecimal::BigDecimal;
use ethers::types::{transaction::eip2718::TypedTransaction, Address, Bytes, H256, I256, U256, U64};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};

use crate::dex::Market;

/// A single call performed by the executor contract, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub target: Address,
    pub data: Bytes,
}

/// Venue prices at the reference volume, both expressed in token units.
#[derive(Clone)]
pub struct PricedMarket {
    pub market: Arc<dyn Market>,
    /// Token that must be sold into the venue to receive the reference volume.
    pub buy_token_price: U256,
    /// Token received from the venue when spending the reference volume.
    pub sell_token_price: U256,
}

/// Ordered venue pair observed crossed at the reference volume.
#[derive(Clone)]
pub struct CrossedPair {
    pub buy_from: Arc<dyn Market>,
    pub sell_to: Arc<dyn Market>,
}

/// A sized arbitrage. `profit` is the proceeds from selling
/// `buy_from.quote_out(volume)` into `sell_to`, minus `volume`.
#[derive(Clone)]
pub struct Opportunity {
    pub token: Address,
    pub volume: U256,
    pub profit: I256,
    pub buy_from: Arc<dyn Market>,
    pub sell_to: Arc<dyn Market>,
}

impl fmt::Debug for PricedMarket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PricedMarket")
            .field("market", &self.market.address())
            .field("buy_token_price", &self.buy_token_price)
            .field("sell_token_price", &self.sell_token_price)
            .finish()
    }
}

impl fmt::Debug for CrossedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossedPair")
            .field("buy_from", &self.buy_from.address())
            .field("sell_to", &self.sell_to.address())
            .finish()
    }
}

impl fmt::Debug for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opportunity")
            .field("token", &self.token)
            .field("volume", &self.volume)
            .field("profit", &self.profit)
            .field("buy_from", &self.buy_from.address())
            .field("sell_to", &self.sell_to.address())
            .finish()
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (buy0, buy1) = self.buy_from.tokens();
        let (sell0, sell1) = self.sell_to.tokens();
        write!(
            f,
            "Profit: {} Volume: {} | {} ({:?}) {:?} => {:?} | {} ({:?}) {:?} => {:?}",
            to_decimal(self.profit),
            to_decimal(self.volume),
            self.buy_from.protocol(),
            self.buy_from.address(),
            buy0,
            buy1,
            self.sell_to.protocol(),
            self.sell_to.address(),
            sell0,
            sell1,
        )
    }
}

/// Money flow for one bundle. `fee` and `profit_after_fee` are in reference
/// units; the remaining fields are in native units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEconomics {
    pub fee: U256,
    pub profit_after_fee: I256,
    pub converted_profit: I256,
    pub incentive: I256,
    pub take_home: I256,
}

/// An unsigned executor transaction together with the route it encodes.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub calls: Vec<Call>,
    /// ABI-encoded `(uint256 incentive, address[] targets, bytes[] payloads)`.
    pub payload: Bytes,
    pub transaction: TypedTransaction,
    pub economics: BundleEconomics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBundle {
    pub raw_transactions: Vec<Bytes>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub error: Option<String>,
    pub first_revert: Option<String>,
    pub total_gas_used: U256,
    pub coinbase_diff: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleAck {
    pub target_block: U64,
    pub bundle_hash: Option<H256>,
}

/// Converts a raw 18-decimal amount into a human-readable decimal.
pub fn to_decimal(amount: impl fmt::Display) -> BigDecimal {
    BigDecimal::from_str(&format!("{}e-18", amount))
        .map(|d| d.normalized())
        .unwrap_or_else(|_| BigDecimal::from(0))
}
