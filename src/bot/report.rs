use anyhow::Result;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use ethers::types::{Address, U64};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    bot::pipeline::Submission,
    errors::SkipReason,
    types::{to_decimal, BundleEconomics, Opportunity},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Submitted {
        target_blocks: Vec<U64>,
        accepted_blocks: Vec<U64>,
    },
    Skipped {
        reason: String,
    },
}

/// One attempted opportunity. Economics are present once the bundle was
/// priced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub token: Address,
    pub buy_from: Address,
    pub sell_to: Address,
    pub volume: BigDecimal,
    pub profit: BigDecimal,
    pub fee: Option<BigDecimal>,
    pub incentive: Option<BigDecimal>,
    pub take_home: Option<BigDecimal>,
    pub outcome: CandidateOutcome,
    pub recorded_at: DateTime<Utc>,
}

impl CandidateRecord {
    fn new(opportunity: &Opportunity, economics: Option<&BundleEconomics>, outcome: CandidateOutcome) -> Self {
        Self {
            token: opportunity.token,
            buy_from: opportunity.buy_from.address(),
            sell_to: opportunity.sell_to.address(),
            volume: to_decimal(opportunity.volume),
            profit: to_decimal(opportunity.profit),
            fee: economics.map(|e| to_decimal(e.fee)),
            incentive: economics.map(|e| to_decimal(e.incentive)),
            take_home: economics.map(|e| to_decimal(e.take_home)),
            outcome,
            recorded_at: Utc::now(),
        }
    }
}

/// Everything one invocation attempted, in ranked order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub block_number: U64,
    pub started_at: DateTime<Utc>,
    pub attempts: Vec<CandidateRecord>,
}

impl RunReport {
    pub fn new(block_number: U64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            block_number,
            started_at: Utc::now(),
            attempts: Vec::new(),
        }
    }

    pub fn record_submitted(&mut self, opportunity: &Opportunity, economics: &BundleEconomics, submission: &Submission) {
        let outcome = CandidateOutcome::Submitted {
            target_blocks: submission.broadcasts.iter().map(|b| b.target_block).collect(),
            accepted_blocks: submission.accepted_blocks(),
        };
        self.attempts
            .push(CandidateRecord::new(opportunity, Some(economics), outcome));
    }

    pub fn record_skipped(&mut self, opportunity: &Opportunity, economics: Option<&BundleEconomics>, reason: &SkipReason) {
        let outcome = CandidateOutcome::Skipped {
            reason: reason.to_string(),
        };
        self.attempts.push(CandidateRecord::new(opportunity, economics, outcome));
    }

    pub fn submitted(&self) -> Option<&CandidateRecord> {
        self.attempts
            .iter()
            .find(|record| matches!(record.outcome, CandidateOutcome::Submitted { .. }))
    }

    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize run report: {}", e))
    }
}
