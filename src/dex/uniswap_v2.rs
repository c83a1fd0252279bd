use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use ethers::{
    abi::Abi,
    contract::{BaseContract, Contract},
    prelude::*,
    types::{Address, Bytes, U256},
};
use std::sync::Arc;
use tracing::debug;

use crate::{dex::traits::Market, types::Call};

const PROTOCOL: &str = "UniswapV2";

fn pair_abi() -> Result<Abi> {
    let abi: Abi = serde_json::from_str(
        r#"
        [
            {
                "inputs": [],
                "name": "token0",
                "outputs": [{"internalType": "address", "name": "", "type": "address"}],
                "stateMutability": "view",
                "type": "function"
            },
            {
                "inputs": [],
                "name": "token1",
                "outputs": [{"internalType": "address", "name": "", "type": "address"}],
                "stateMutability": "view",
                "type": "function"
            },
            {
                "inputs": [],
                "name": "getReserves",
                "outputs": [
                    {"internalType": "uint112", "name": "reserve0", "type": "uint112"},
                    {"internalType": "uint112", "name": "reserve1", "type": "uint112"},
                    {"internalType": "uint32", "name": "blockTimestampLast", "type": "uint32"}
                ],
                "stateMutability": "view",
                "type": "function"
            },
            {
                "inputs": [
                    {"internalType": "uint256", "name": "amount0Out", "type": "uint256"},
                    {"internalType": "uint256", "name": "amount1Out", "type": "uint256"},
                    {"internalType": "address", "name": "to", "type": "address"},
                    {"internalType": "bytes", "name": "data", "type": "bytes"}
                ],
                "name": "swap",
                "outputs": [],
                "stateMutability": "nonpayable",
                "type": "function"
            }
        ]
        "#,
    )?;
    Ok(abi)
}

/// Reserve snapshot of a constant-product pair with the standard 0.3% fee.
/// Quotes are computed locally and never change for the lifetime of the value.
#[derive(Clone)]
pub struct UniswapV2Pair {
    address: Address,
    token0: Address,
    token1: Address,
    reserve0: U256,
    reserve1: U256,
    pair_contract: BaseContract,
}

impl UniswapV2Pair {
    pub fn new(
        address: Address,
        token0: Address,
        token1: Address,
        reserve0: U256,
        reserve1: U256,
    ) -> Result<Self> {
        Ok(Self {
            address,
            token0,
            token1,
            reserve0,
            reserve1,
            pair_contract: BaseContract::from(pair_abi()?),
        })
    }

    pub async fn fetch(provider: Arc<Provider<Http>>, address: Address) -> Result<Self> {
        let contract: Contract<Provider<Http>> = Contract::new(address, pair_abi()?, provider);

        let token0 = contract
            .method::<_, Address>("token0", ())?
            .call()
            .await
            .map_err(|e| anyhow!("Failed to read token0 of {:?}: {}", address, e))?;

        let token1 = contract
            .method::<_, Address>("token1", ())?
            .call()
            .await
            .map_err(|e| anyhow!("Failed to read token1 of {:?}: {}", address, e))?;

        let (reserve0, reserve1, _) = contract
            .method::<_, (U256, U256, u32)>("getReserves", ())?
            .call()
            .await
            .map_err(|e| anyhow!("Failed to read reserves of {:?}: {}", address, e))?;

        debug!(
            "Fetched {:?}: {:?}={} {:?}={}",
            address, token0, reserve0, token1, reserve1
        );

        Self::new(address, token0, token1, reserve0, reserve1)
    }

    /// Reserves ordered as (token_in side, token_out side).
    pub fn reserves_for(&self, token_in: Address, token_out: Address) -> Result<(U256, U256)> {
        if token_in == self.token0 && token_out == self.token1 {
            Ok((self.reserve0, self.reserve1))
        } else if token_in == self.token1 && token_out == self.token0 {
            Ok((self.reserve1, self.reserve0))
        } else {
            Err(anyhow!(
                "Pair {:?} does not trade {:?} => {:?}",
                self.address,
                token_in,
                token_out
            ))
        }
    }

    pub fn reserve_of(&self, token: Address) -> Result<U256> {
        match token {
            t if t == self.token0 => Ok(self.reserve0),
            t if t == self.token1 => Ok(self.reserve1),
            _ => Err(anyhow!("Pair {:?} does not hold {:?}", self.address, token)),
        }
    }

    fn amount_out(&self, token_in: Address, token_out: Address, amount_in: U256) -> Result<U256> {
        let (reserve_in, reserve_out) = self.reserves_for(token_in, token_out)?;
        if reserve_in.is_zero() || reserve_out.is_zero() {
            bail!("Pair {:?} has empty reserves", self.address);
        }

        let amount_in_with_fee = amount_in * U256::from(997u64);
        let numerator = amount_in_with_fee * reserve_out;
        let denominator = reserve_in * U256::from(1000u64) + amount_in_with_fee;
        Ok(numerator / denominator)
    }

    fn amount_in(&self, token_in: Address, token_out: Address, amount_out: U256) -> Result<U256> {
        let (reserve_in, reserve_out) = self.reserves_for(token_in, token_out)?;
        if reserve_in.is_zero() || reserve_out.is_zero() {
            bail!("Pair {:?} has empty reserves", self.address);
        }
        if amount_out >= reserve_out {
            bail!(
                "Pair {:?} cannot supply {} of {:?} (reserve {})",
                self.address,
                amount_out,
                token_out,
                reserve_out
            );
        }

        let numerator = reserve_in * amount_out * U256::from(1000u64);
        let denominator = (reserve_out - amount_out) * U256::from(997u64);
        Ok(numerator / denominator + U256::one())
    }
}

#[async_trait]
impl Market for UniswapV2Pair {
    fn address(&self) -> Address {
        self.address
    }

    fn protocol(&self) -> &str {
        PROTOCOL
    }

    fn tokens(&self) -> (Address, Address) {
        (self.token0, self.token1)
    }

    fn receives_directly(&self) -> bool {
        true
    }

    async fn quote_out(&self, token_in: Address, token_out: Address, amount_in: U256) -> Result<U256> {
        self.amount_out(token_in, token_out, amount_in)
    }

    async fn quote_in(&self, token_in: Address, token_out: Address, amount_out: U256) -> Result<U256> {
        self.amount_in(token_in, token_out, amount_out)
    }

    async fn sell_call_data(&self, token_in: Address, amount_in: U256, recipient: Address) -> Result<Bytes> {
        let (amount0_out, amount1_out) = if token_in == self.token0 {
            (U256::zero(), self.amount_out(self.token0, self.token1, amount_in)?)
        } else if token_in == self.token1 {
            (self.amount_out(self.token1, self.token0, amount_in)?, U256::zero())
        } else {
            bail!("Pair {:?} cannot sell {:?}", self.address, token_in);
        };

        let data = self
            .pair_contract
            .encode("swap", (amount0_out, amount1_out, recipient, Bytes::new()))?;
        Ok(data)
    }

    async fn forward_calls(&self, token_in: Address, amount_in: U256, next: &dyn Market) -> Result<Vec<Call>> {
        if !next.receives_directly() {
            bail!(
                "{} market {:?} cannot receive tokens directly",
                next.protocol(),
                next.address()
            );
        }

        let data = self.sell_call_data(token_in, amount_in, next.address()).await?;
        Ok(vec![Call {
            target: self.address,
            data,
        }])
    }
}
