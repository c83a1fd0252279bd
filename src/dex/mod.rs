pub mod price_source;
pub mod traits;
pub mod uniswap_v2;

pub use price_source::PairPriceSource;
pub use traits::*;
pub use uniswap_v2::UniswapV2Pair;

use ethers::{
    providers::{Http, Provider},
    types::Address,
};
use futures::future::join_all;
use std::{collections::BTreeMap, sync::Arc, time::Duration};

use crate::blockchain::within;

/// Venues keyed by the token they trade against the reference asset.
pub type MarketsByToken = BTreeMap<Address, Vec<Arc<dyn Market>>>;

/// Fetches reserve snapshots for every pair. Pairs that fail or time out are
/// left out with a warning.
pub async fn load_uniswap_v2_markets(
    provider: Arc<Provider<Http>>,
    addresses: &[Address],
    timeout: Duration,
) -> Vec<Arc<dyn Market>> {
    let fetches = addresses.iter().map(|&address| {
        let provider = provider.clone();
        async move {
            let result = within(timeout, "reserve fetch", UniswapV2Pair::fetch(provider, address)).await;
            (address, result)
        }
    });

    let mut markets: Vec<Arc<dyn Market>> = Vec::new();
    for (address, result) in join_all(fetches).await {
        match result {
            Ok(pair) => markets.push(Arc::new(pair)),
            Err(e) => {
                tracing::warn!("Failed to load market {:?}: {}", address, e);
            }
        }
    }

    markets
}

/// Groups markets that trade against `reference` by their other token.
/// Markets that do not touch the reference asset are ignored.
pub fn group_by_token(markets: Vec<Arc<dyn Market>>, reference: Address) -> MarketsByToken {
    let mut by_token = MarketsByToken::new();

    for market in markets {
        let (token0, token1) = market.tokens();
        let token = if token0 == reference {
            token1
        } else if token1 == reference {
            token0
        } else {
            tracing::debug!("Ignoring market {:?} without reference asset", market.address());
            continue;
        };
        by_token.entry(token).or_default().push(market);
    }

    by_token
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::U256;

    fn pair(id: u64, token0: Address, token1: Address) -> Arc<dyn Market> {
        Arc::new(
            UniswapV2Pair::new(
                Address::from_low_u64_be(id),
                token0,
                token1,
                U256::from(1000),
                U256::from(1000),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_group_by_token() {
        let dai = Address::from_low_u64_be(0xda1);
        let weth = Address::from_low_u64_be(0xe7);
        let wbtc = Address::from_low_u64_be(0xb7c);

        let markets = vec![
            pair(1, dai, weth),
            pair(2, weth, dai),
            pair(3, wbtc, dai),
            pair(4, weth, wbtc),
        ];

        let grouped = group_by_token(markets, dai);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[&weth].len(), 2);
        assert_eq!(grouped[&wbtc].len(), 1);
        assert_eq!(grouped[&weth][1].address(), Address::from_low_u64_be(2));
    }
}
