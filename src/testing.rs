//! Scripted collaborators shared by the unit tests.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ethers::{
    abi::{encode, Token},
    types::{transaction::eip2718::TypedTransaction, Address, Bytes, H256, U256, U64},
};
use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use crate::{
    blockchain::GasEstimator,
    dex::{Market, NativePriceSource},
    relay::Relay,
    types::{BundleAck, Call, SignedBundle, SimulationReport},
};

pub fn ether(amount: u64) -> U256 {
    U256::exp10(18) * U256::from(amount)
}

pub fn reference_token() -> Address {
    Address::from_low_u64_be(0xda1)
}

pub fn traded_token() -> Address {
    Address::from_low_u64_be(0xe7)
}

type QuoteFn = Box<dyn Fn(Address, Address, U256) -> Result<U256> + Send + Sync>;

/// Market whose quotes come from closures. Every `quote_out` input is recorded.
pub struct MockMarket {
    address: Address,
    tokens: (Address, Address),
    receives_directly: bool,
    quote_out: QuoteFn,
    quote_in: QuoteFn,
    quoted_out: Mutex<Vec<(Address, U256)>>,
}

impl MockMarket {
    pub fn new(
        id: u64,
        quote_out: impl Fn(Address, Address, U256) -> Result<U256> + Send + Sync + 'static,
        quote_in: impl Fn(Address, Address, U256) -> Result<U256> + Send + Sync + 'static,
    ) -> Self {
        Self {
            address: Address::from_low_u64_be(id),
            tokens: (reference_token(), traded_token()),
            receives_directly: true,
            quote_out: Box::new(quote_out),
            quote_in: Box::new(quote_in),
            quoted_out: Mutex::new(Vec::new()),
        }
    }

    /// Depthless venue pricing the token at `numerator / denominator`
    /// reference units, without fees.
    pub fn fixed_price(id: u64, numerator: u64, denominator: u64) -> Self {
        let num = U256::from(numerator);
        let den = U256::from(denominator);
        Self::new(
            id,
            move |token_in, _, amount_in| {
                if token_in == reference_token() {
                    Ok(amount_in * den / num)
                } else {
                    Ok(amount_in * num / den)
                }
            },
            move |token_in, _, amount_out| {
                if token_in == traded_token() {
                    Ok(amount_out * den / num)
                } else {
                    Ok(amount_out * num / den)
                }
            },
        )
    }

    pub fn failing(id: u64) -> Self {
        Self::new(
            id,
            |_, _, _| Err(anyhow!("quote reverted")),
            |_, _, _| Err(anyhow!("quote reverted")),
        )
    }

    pub fn not_receiving_directly(mut self) -> Self {
        self.receives_directly = false;
        self
    }

    /// Reference-asset volumes this venue was asked to quote.
    pub fn quoted_volumes(&self) -> Vec<U256> {
        self.quoted_out
            .lock()
            .unwrap()
            .iter()
            .filter(|(token_in, _)| *token_in == reference_token())
            .map(|(_, amount)| *amount)
            .collect()
    }
}

#[async_trait]
impl Market for MockMarket {
    fn address(&self) -> Address {
        self.address
    }

    fn protocol(&self) -> &str {
        "Mock"
    }

    fn tokens(&self) -> (Address, Address) {
        self.tokens
    }

    fn receives_directly(&self) -> bool {
        self.receives_directly
    }

    async fn quote_out(&self, token_in: Address, token_out: Address, amount_in: U256) -> Result<U256> {
        self.quoted_out.lock().unwrap().push((token_in, amount_in));
        (self.quote_out)(token_in, token_out, amount_in)
    }

    async fn quote_in(&self, token_in: Address, token_out: Address, amount_out: U256) -> Result<U256> {
        (self.quote_in)(token_in, token_out, amount_out)
    }

    async fn sell_call_data(&self, token_in: Address, amount_in: U256, recipient: Address) -> Result<Bytes> {
        Ok(encode(&[
            Token::Address(token_in),
            Token::Uint(amount_in),
            Token::Address(recipient),
        ])
        .into())
    }

    async fn forward_calls(&self, token_in: Address, amount_in: U256, next: &dyn Market) -> Result<Vec<Call>> {
        if !next.receives_directly() {
            bail!("next market cannot receive directly");
        }
        let data = self.sell_call_data(token_in, amount_in, next.address()).await?;
        Ok(vec![Call {
            target: self.address,
            data,
        }])
    }
}

pub struct FixedRate(pub BigDecimal);

impl FixedRate {
    pub fn parse(rate: &str) -> Arc<Self> {
        Arc::new(Self(BigDecimal::from_str(rate).unwrap()))
    }
}

#[async_trait]
impl NativePriceSource for FixedRate {
    async fn native_per_reference(&self) -> Result<BigDecimal> {
        Ok(self.0.clone())
    }
}

pub struct UnavailableRate;

#[async_trait]
impl NativePriceSource for UnavailableRate {
    async fn native_per_reference(&self) -> Result<BigDecimal> {
        Err(anyhow!("pair reserves unavailable"))
    }
}

/// Returns the same estimate (or failure) for every transaction.
pub struct ScriptedGas {
    estimate: Option<U256>,
    pub calls: AtomicUsize,
}

impl ScriptedGas {
    pub fn returning(estimate: u64) -> Arc<Self> {
        Arc::new(Self {
            estimate: Some(U256::from(estimate)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            estimate: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl GasEstimator for ScriptedGas {
    async fn estimate_gas(&self, _tx: &TypedTransaction) -> Result<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.estimate.ok_or_else(|| anyhow!("execution reverted"))
    }
}

/// Relay that records every interaction and answers from a script.
pub struct RecordingRelay {
    simulation: Result<SimulationReport, String>,
    failing_block: Option<U64>,
    pub signed: Mutex<Vec<TypedTransaction>>,
    pub simulated: Mutex<Vec<U64>>,
    pub sent: Mutex<Vec<U64>>,
}

impl RecordingRelay {
    pub fn clean() -> Arc<Self> {
        Self::with_simulation(Ok(SimulationReport {
            total_gas_used: U256::from(300_000u64),
            coinbase_diff: U256::exp10(16),
            ..Default::default()
        }))
    }

    pub fn with_simulation(simulation: Result<SimulationReport, String>) -> Arc<Self> {
        Arc::new(Self::scripted(simulation, None))
    }

    pub fn rejecting_block(block: u64) -> Arc<Self> {
        let simulation = Self::clean().simulation.clone();
        Arc::new(Self::scripted(simulation, Some(U64::from(block))))
    }

    fn scripted(simulation: Result<SimulationReport, String>, failing_block: Option<U64>) -> Self {
        Self {
            simulation,
            failing_block,
            signed: Mutex::new(Vec::new()),
            simulated: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn signed_count(&self) -> usize {
        self.signed.lock().unwrap().len()
    }

    pub fn simulated_count(&self) -> usize {
        self.simulated.lock().unwrap().len()
    }
}

#[async_trait]
impl Relay for RecordingRelay {
    async fn sign_bundle(&self, transaction: &TypedTransaction) -> Result<SignedBundle> {
        self.signed.lock().unwrap().push(transaction.clone());
        Ok(SignedBundle {
            raw_transactions: vec![Bytes::from(vec![0xf8, 0x6b])],
        })
    }

    async fn simulate(&self, _bundle: &SignedBundle, target_block: U64) -> Result<SimulationReport> {
        self.simulated.lock().unwrap().push(target_block);
        self.simulation.clone().map_err(|e| anyhow!(e))
    }

    async fn send_raw_bundle(&self, _bundle: &SignedBundle, target_block: U64) -> Result<BundleAck> {
        self.sent.lock().unwrap().push(target_block);
        if self.failing_block == Some(target_block) {
            bail!("relay rejected bundle for block {}", target_block);
        }
        Ok(BundleAck {
            target_block,
            bundle_hash: Some(H256::from_low_u64_be(target_block.as_u64())),
        })
    }
}
