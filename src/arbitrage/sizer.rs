use anyhow::Result;
use ethers::types::{Address, I256, U256};
use std::time::Duration;
use tracing::debug;

use crate::{
    blockchain::within,
    types::{CrossedPair, Opportunity},
};

/// Profit observed at one trial volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trial {
    pub volume: U256,
    pub profit: I256,
}

/// What the grid walk does after evaluating a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The trial becomes the best so far; keep walking.
    Adopt(Trial),
    /// Profit fell below the best: probe `midpoint` once, then stop.
    Refine { best: Trial, midpoint: U256 },
}

/// A trial only triggers refinement when it is strictly worse than the best.
/// Equal profit adopts the larger volume.
pub fn next_step(best: Option<Trial>, trial: Trial) -> Step {
    match best {
        Some(best) if trial.profit < best.profit => Step::Refine {
            best,
            midpoint: (trial.volume + best.volume) / U256::from(2u64),
        },
        _ => Step::Adopt(trial),
    }
}

/// Walks an ascending volume grid for a crossed pair. The first decrease
/// triggers a single midpoint probe and ends the walk, so a later, larger
/// peak past a dip is never found.
// TODO: replace the single midpoint probe with a bounded binary search.
pub struct VolumeSizer {
    reference_token: Address,
    trial_volumes: Vec<U256>,
    timeout: Duration,
}

impl VolumeSizer {
    pub fn new(reference_token: Address, trial_volumes: Vec<U256>, timeout: Duration) -> Self {
        Self {
            reference_token,
            trial_volumes,
            timeout,
        }
    }

    pub async fn size(&self, token: Address, pair: &CrossedPair) -> Result<Option<Opportunity>> {
        let best = self.best_trial(token, pair).await?;

        Ok(best.map(|trial| Opportunity {
            token,
            volume: trial.volume,
            profit: trial.profit,
            buy_from: pair.buy_from.clone(),
            sell_to: pair.sell_to.clone(),
        }))
    }

    pub async fn best_trial(&self, token: Address, pair: &CrossedPair) -> Result<Option<Trial>> {
        let mut best = None;

        for &volume in &self.trial_volumes {
            let trial = self.profit_at(token, pair, volume).await?;

            match next_step(best, trial) {
                Step::Adopt(trial) => best = Some(trial),
                Step::Refine { best, midpoint } => {
                    let probe = self.profit_at(token, pair, midpoint).await?;
                    let chosen = if probe.profit > best.profit { probe } else { best };
                    return Ok(Some(chosen));
                }
            }
        }

        Ok(best)
    }

    /// Proceeds from selling into `sell_to` what `volume` buys on `buy_from`,
    /// minus `volume`.
    pub async fn profit_at(&self, token: Address, pair: &CrossedPair, volume: U256) -> Result<Trial> {
        let tokens_out = within(
            self.timeout,
            "buy quote",
            pair.buy_from.quote_out(self.reference_token, token, volume),
        )
        .await?;

        let proceeds = within(
            self.timeout,
            "sell quote",
            pair.sell_to.quote_out(token, self.reference_token, tokens_out),
        )
        .await?;

        let profit = I256::from_raw(proceeds) - I256::from_raw(volume);
        debug!("Trial volume={} tokens={} profit={}", volume, tokens_out, profit);

        Ok(Trial { volume, profit })
    }
}
