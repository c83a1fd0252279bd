use ethers::types::I256;
use tracing::{debug, info};

use crate::types::{to_decimal, Opportunity};

/// Highest-profit opportunity among the sized pairs of one token. On equal
/// profit the earlier pair wins.
pub fn best_for_token(sized: Vec<Opportunity>) -> Option<Opportunity> {
    sized.into_iter().fold(None, |best, candidate| match best {
        Some(best) if best.profit >= candidate.profit => Some(best),
        _ => Some(candidate),
    })
}

/// Drops opportunities whose profit does not exceed `profit_floor` and sorts
/// the rest by descending profit. The sort is stable, so equal profits keep
/// their input order.
pub fn rank_opportunities(candidates: Vec<Opportunity>, profit_floor: I256) -> Vec<Opportunity> {
    let mut ranked: Vec<Opportunity> = candidates
        .into_iter()
        .filter(|opportunity| {
            let keep = opportunity.profit > profit_floor;
            if !keep {
                debug!(
                    "Below profit floor {} for token {:?}: {}",
                    to_decimal(profit_floor),
                    opportunity.token,
                    to_decimal(opportunity.profit)
                );
            }
            keep
        })
        .collect();

    ranked.sort_by(|a, b| b.profit.cmp(&a.profit));

    if !ranked.is_empty() {
        info!("Ranked {} opportunities above profit floor", ranked.len());
    }

    ranked
}
