use ethers::types::{Address, I256, U64};
use tracing::{debug, info, warn};

use crate::{
    arbitrage::{best_for_token, rank_opportunities, BundleBuilder, CrossingDetector, VolumeSizer},
    bot::{pipeline::SubmissionPipeline, report::RunReport},
    config::ArbitrageParams,
    dex::MarketsByToken,
    errors::{ArbitrageError, SkipReason},
    types::Opportunity,
};

/// One evaluation-and-execution pass over a fixed venue snapshot.
pub struct ArbitrageBot {
    profit_floor: I256,
    detector: CrossingDetector,
    sizer: VolumeSizer,
    builder: BundleBuilder,
    pipeline: SubmissionPipeline,
}

impl ArbitrageBot {
    pub fn new(
        params: &ArbitrageParams,
        reference_token: Address,
        builder: BundleBuilder,
        pipeline: SubmissionPipeline,
    ) -> Self {
        info!(
            "Initializing arbitrage bot: {} trial volumes, incentive {}%, fee {} bps",
            params.trial_volumes.len(),
            params.incentive_rate_pct,
            params.borrow_fee_bps
        );

        Self {
            profit_floor: params.profit_floor,
            detector: CrossingDetector::new(reference_token, params.reference_volume, params.network_timeout),
            sizer: VolumeSizer::new(reference_token, params.trial_volumes.clone(), params.network_timeout),
            builder,
            pipeline,
        }
    }

    pub async fn run_once(&self, markets: &MarketsByToken, block_number: U64) -> Result<RunReport, ArbitrageError> {
        let ranked = self.evaluate_markets(markets).await;
        self.take_crossed_markets(&ranked, block_number).await
    }

    /// Detects crossed pairs per token, sizes each independently, keeps the
    /// best per token and ranks the survivors above the profit floor.
    pub async fn evaluate_markets(&self, markets: &MarketsByToken) -> Vec<Opportunity> {
        let mut best_per_token = Vec::new();

        for (token, venues) in markets {
            let crossed = self.detector.detect(*token, venues).await;
            if crossed.is_empty() {
                continue;
            }

            let mut sized = Vec::with_capacity(crossed.len());
            for pair in &crossed {
                match self.sizer.size(*token, pair).await {
                    Ok(Some(opportunity)) => sized.push(opportunity),
                    Ok(None) => debug!("No trial volume for {:?}", pair),
                    Err(e) => warn!("Excluding {:?} for token {:?}: {}", pair, token, e),
                }
            }

            if let Some(best) = best_for_token(sized) {
                best_per_token.push(best);
            }
        }

        rank_opportunities(best_per_token, self.profit_floor)
    }

    /// Tries ranked opportunities in order until one reaches broadcast.
    pub async fn take_crossed_markets(
        &self,
        ranked: &[Opportunity],
        block_number: U64,
    ) -> Result<RunReport, ArbitrageError> {
        let mut report = RunReport::new(block_number);

        for opportunity in ranked {
            info!("{}", opportunity);

            let bundle = match self.builder.build(opportunity).await {
                Ok(bundle) => bundle,
                Err(reason) => {
                    warn!("Skipping opportunity for {:?}: {}", opportunity.token, reason);
                    let economics = match &reason {
                        SkipReason::Unprofitable(economics) => Some(economics.clone()),
                        _ => None,
                    };
                    report.record_skipped(opportunity, economics.as_ref(), &reason);
                    continue;
                }
            };

            let economics = bundle.economics.clone();
            match self.pipeline.submit(bundle, block_number).await {
                Ok(submission) => {
                    info!(
                        "Submitted arbitrage for {:?} targeting {} blocks",
                        opportunity.token,
                        submission.broadcasts.len()
                    );
                    report.record_submitted(opportunity, &economics, &submission);
                    return Ok(report);
                }
                Err(reason) => {
                    warn!("Skipping opportunity for {:?}: {}", opportunity.token, reason);
                    report.record_skipped(opportunity, Some(&economics), &reason);
                }
            }
        }

        Err(ArbitrageError::ExhaustedCandidates(report))
    }
}
