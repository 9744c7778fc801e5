//! Consensus types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::analysis::{AgentType, AnalysisResult, RiskScore};

/// Four-band consensus verdict on the combined score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsensusVerdict {
    Reject,
    Delay,
    ApproveWithCaution,
    Approve,
}

impl ConsensusVerdict {
    /// `>=8 REJECT`, `>=6 DELAY`, `>=3 APPROVE WITH CAUTION`, else `APPROVE`.
    pub fn from_score(score: RiskScore) -> Self {
        match score.value() {
            8.. => ConsensusVerdict::Reject,
            6..=7 => ConsensusVerdict::Delay,
            3..=5 => ConsensusVerdict::ApproveWithCaution,
            _ => ConsensusVerdict::Approve,
        }
    }

    /// Recommendation sentence shown to voters.
    pub fn recommendation(&self) -> &'static str {
        match self {
            ConsensusVerdict::Reject => {
                "REJECT - Critical security or economic risks detected. Do not approve."
            }
            ConsensusVerdict::Delay => {
                "DELAY - Significant concerns. Address issues before approval."
            }
            ConsensusVerdict::ApproveWithCaution => {
                "APPROVE WITH CAUTION - Moderate risks. Monitor closely after implementation."
            }
            ConsensusVerdict::Approve => {
                "APPROVE - Low risk. Proposal appears safe to implement."
            }
        }
    }
}

impl fmt::Display for ConsensusVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConsensusVerdict::Reject => "REJECT",
            ConsensusVerdict::Delay => "DELAY",
            ConsensusVerdict::ApproveWithCaution => "APPROVE WITH CAUTION",
            ConsensusVerdict::Approve => "APPROVE",
        };
        write!(f, "{}", s)
    }
}

/// An analyzer that could not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentFailure {
    pub agent_type: AgentType,
    pub reason: String,
}

/// Combined verdict of both risk analyzers for one poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub id: Uuid,
    pub poll_id: String,
    pub combined_risk_score: RiskScore,
    pub verdict: ConsensusVerdict,
    pub consensus_recommendation: String,
    pub agent_deliberation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_risk: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub economic: Option<AnalysisResult>,
    /// Analyzers that failed; empty when both succeeded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<AgentFailure>,
    pub analyzed_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl ConsensusResult {
    /// Whether both analyzers contributed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
