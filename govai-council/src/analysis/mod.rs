//! Deterministic risk analysis of governance proposals.
//!
//! Two independent analyzers score a poll on a bounded 1-10 scale:
//!
//! - **Vote risk** ([`VoteRiskAnalyzer`]): sybil-like wallet patterns and whale
//!   concentration in the vote set
//! - **Economic risk** ([`EconomicRiskAnalyzer`]): keyword classification of the
//!   proposal text and a treasury runway simulation for reward changes
//!
//! Both are pure over their input snapshot and share the narrative policy in
//! [`narrative`].

pub mod economic;
pub mod narrative;
pub mod score;
pub mod types;
pub mod whale_watch;

pub use economic::{EconomicRiskAnalyzer, SimulationParams};
pub use narrative::{compose, Narrative, NarrativeTemplate};
pub use score::{Contribution, Recommendation, RiskScore, RiskTier, ScoreSheet};
pub use types::{
    AgentType, AnalysisDetail, AnalysisResult, AnalysisStatus, EconomicDetail,
    FinancialParameters, Flag, FlagKind, OptionBreakdown, Proposal, ProposalCategory, Severity,
    StakingProjections, Vote, VoteStatistics,
};
pub use whale_watch::VoteRiskAnalyzer;
