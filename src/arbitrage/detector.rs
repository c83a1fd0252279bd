use anyhow::{anyhow, Result};
use ethers::types::{Address, U256};
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::{
    blockchain::within,
    dex::Market,
    types::{CrossedPair, PricedMarket},
};

/// Prices every venue of a token at a small reference volume and reports the
/// ordered venue pairs whose prices cross.
pub struct CrossingDetector {
    reference_token: Address,
    reference_volume: U256,
    timeout: Duration,
}

impl CrossingDetector {
    pub fn new(reference_token: Address, reference_volume: U256, timeout: Duration) -> Self {
        Self {
            reference_token,
            reference_volume,
            timeout,
        }
    }

    pub async fn detect(&self, token: Address, markets: &[Arc<dyn Market>]) -> Vec<CrossedPair> {
        let priced = self.price_markets(token, markets).await;
        let crossed = find_crossed_pairs(&priced);

        debug!(
            "Token {:?}: {} of {} venues priced, {} crossed pairs",
            token,
            priced.len(),
            markets.len(),
            crossed.len()
        );

        crossed
    }

    /// Quotes all venues concurrently. Venues whose quotes fail, time out or
    /// come back as zero are excluded.
    pub async fn price_markets(&self, token: Address, markets: &[Arc<dyn Market>]) -> Vec<PricedMarket> {
        let quotes = markets.iter().map(|market| self.price_market(token, market.clone()));

        join_all(quotes)
            .await
            .into_iter()
            .zip(markets)
            .filter_map(|(result, market)| match result {
                Ok(priced) => Some(priced),
                Err(e) => {
                    warn!(
                        "Excluding {} market {:?} for token {:?}: {}",
                        market.protocol(),
                        market.address(),
                        token,
                        e
                    );
                    None
                }
            })
            .collect()
    }

    async fn price_market(&self, token: Address, market: Arc<dyn Market>) -> Result<PricedMarket> {
        let buy_token_price = within(
            self.timeout,
            "buy-side quote",
            market.quote_in(token, self.reference_token, self.reference_volume),
        )
        .await?;

        let sell_token_price = within(
            self.timeout,
            "sell-side quote",
            market.quote_out(self.reference_token, token, self.reference_volume),
        )
        .await?;

        if buy_token_price.is_zero() || sell_token_price.is_zero() {
            return Err(anyhow!("zero quote at reference volume"));
        }

        debug!(
            "{:?}: buy_token_price={} sell_token_price={}",
            market.address(),
            buy_token_price,
            sell_token_price
        );

        Ok(PricedMarket {
            market,
            buy_token_price,
            sell_token_price,
        })
    }
}

/// For every ordered pair of distinct venues (V1, V2): if spending the
/// reference volume on V2 yields more token than V1 needs to pay out the
/// reference volume, buy from V2 and sell to V1. Reciprocal findings are kept.
pub fn find_crossed_pairs(priced: &[PricedMarket]) -> Vec<CrossedPair> {
    let mut crossed = Vec::new();

    for (i, sell_side) in priced.iter().enumerate() {
        for (j, buy_side) in priced.iter().enumerate() {
            if i == j {
                continue;
            }
            if buy_side.sell_token_price > sell_side.buy_token_price {
                crossed.push(CrossedPair {
                    buy_from: buy_side.market.clone(),
                    sell_to: sell_side.market.clone(),
                });
            }
        }
    }

    crossed
}
