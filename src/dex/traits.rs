use anyhow::Result;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use ethers::types::{Address, Bytes, U256};

use crate::types::Call;

/// A liquidity venue able to quote and execute swaps between its two tokens.
#[async_trait]
pub trait Market: Send + Sync {
    fn address(&self) -> Address;

    fn protocol(&self) -> &str;

    fn tokens(&self) -> (Address, Address);

    /// Whether tokens transferred to `address()` are credited to the next swap.
    fn receives_directly(&self) -> bool;

    /// Amount of `token_out` received for selling `amount_in` of `token_in`.
    async fn quote_out(&self, token_in: Address, token_out: Address, amount_in: U256) -> Result<U256>;

    /// Amount of `token_in` required to receive `amount_out` of `token_out`.
    async fn quote_in(&self, token_in: Address, token_out: Address, amount_out: U256) -> Result<U256>;

    /// Call data selling `amount_in` of `token_in`, output sent to `recipient`.
    async fn sell_call_data(&self, token_in: Address, amount_in: U256, recipient: Address) -> Result<Bytes>;

    /// Calls selling `amount_in` of `token_in` with the output forwarded to `next`.
    async fn forward_calls(&self, token_in: Address, amount_in: U256, next: &dyn Market) -> Result<Vec<Call>>;
}

/// Conversion rate from raw reference-asset units into raw native units.
#[async_trait]
pub trait NativePriceSource: Send + Sync {
    async fn native_per_reference(&self) -> Result<BigDecimal>;
}
