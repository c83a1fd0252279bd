use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ethers::{
    providers::{Http, Provider},
    types::Address,
};
use std::{str::FromStr, sync::Arc};
use tracing::debug;

use crate::dex::{traits::NativePriceSource, uniswap_v2::UniswapV2Pair};

/// Reads the mid price of a reference/native constant-product pair.
pub struct PairPriceSource {
    provider: Arc<Provider<Http>>,
    pair_address: Address,
    reference_token: Address,
    native_token: Address,
}

impl PairPriceSource {
    pub fn new(
        provider: Arc<Provider<Http>>,
        pair_address: Address,
        reference_token: Address,
        native_token: Address,
    ) -> Self {
        Self {
            provider,
            pair_address,
            reference_token,
            native_token,
        }
    }
}

#[async_trait]
impl NativePriceSource for PairPriceSource {
    async fn native_per_reference(&self) -> Result<BigDecimal> {
        let pair = UniswapV2Pair::fetch(self.provider.clone(), self.pair_address).await?;
        let rate = mid_price(&pair, self.reference_token, self.native_token)?;
        debug!("Native per reference unit: {}", rate);
        Ok(rate)
    }
}

/// Raw native reserve over raw reference reserve, so the rate converts raw
/// units directly regardless of token decimals.
pub fn mid_price(pair: &UniswapV2Pair, reference: Address, native: Address) -> Result<BigDecimal> {
    let reference_reserve = pair.reserve_of(reference)?;
    let native_reserve = pair.reserve_of(native)?;

    if reference_reserve.is_zero() {
        return Err(anyhow!("Reference reserve is empty"));
    }

    let reference_bd = BigDecimal::from_str(&reference_reserve.to_string())?;
    let native_bd = BigDecimal::from_str(&native_reserve.to_string())?;

    Ok(native_bd / reference_bd)
}
