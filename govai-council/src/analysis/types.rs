//! Types shared by the risk analyzers.
//!
//! Proposals and votes are snapshots read from the store; analysis results are
//! immutable records created once per invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::score::{Contribution, RiskScore};

/// Wallet age assumed when the store has none recorded ("very old / low risk").
pub const UNKNOWN_WALLET_AGE_DAYS: u32 = 999;

// ============================================================================
// Input Types
// ============================================================================

/// Optional per-proposal overrides for the treasury simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialParameters {
    /// Treasury balance backing this proposal
    #[serde(default)]
    pub treasury_balance: Option<f64>,
    /// Monthly staked-token volume the reward rate applies to
    #[serde(default)]
    pub monthly_staked_tokens: Option<f64>,
}

/// A governance proposal (poll).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique poll identifier
    pub poll_id: String,
    /// Question text
    pub question: String,
    /// Optional free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered voting options
    pub options: Vec<String>,
    /// Financial parameters, if the proposer supplied them
    #[serde(default)]
    pub financials: Option<FinancialParameters>,
}

impl Proposal {
    /// Create a proposal without description or financial parameters.
    pub fn new(
        poll_id: impl Into<String>,
        question: impl Into<String>,
        options: Vec<String>,
    ) -> Self {
        Self {
            poll_id: poll_id.into(),
            question: question.into(),
            description: None,
            options,
            financials: None,
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach financial parameters.
    pub fn with_financials(mut self, financials: FinancialParameters) -> Self {
        self.financials = Some(financials);
        self
    }

    /// Question and description, lower-cased and joined for keyword matching.
    pub fn match_text(&self) -> String {
        format!(
            "{} {}",
            self.question.to_lowercase(),
            self.description.as_deref().unwrap_or_default().to_lowercase()
        )
    }
}

/// A single vote record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Poll this vote belongs to
    pub poll_id: String,
    /// Voter identity
    pub wallet_address: String,
    /// Chosen option
    pub vote_option: String,
    /// Wallet signature, stored verbatim and never verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Wallet age in days, when known
    #[serde(default)]
    pub wallet_age_days: Option<u32>,
    /// Voting-power balance, when known
    #[serde(default)]
    pub sol_balance: Option<f64>,
}

impl Vote {
    /// Create a vote with known age and balance.
    pub fn new(
        poll_id: impl Into<String>,
        wallet_address: impl Into<String>,
        vote_option: impl Into<String>,
        wallet_age_days: u32,
        sol_balance: f64,
    ) -> Self {
        Self {
            poll_id: poll_id.into(),
            wallet_address: wallet_address.into(),
            vote_option: vote_option.into(),
            signature: None,
            wallet_age_days: Some(wallet_age_days),
            sol_balance: Some(sol_balance),
        }
    }

    /// Wallet age, defaulting to the low-risk sentinel.
    pub fn age_days(&self) -> u32 {
        self.wallet_age_days.unwrap_or(UNKNOWN_WALLET_AGE_DAYS)
    }

    /// Voting power, defaulting to zero.
    pub fn balance(&self) -> f64 {
        self.sol_balance.unwrap_or(0.0)
    }
}

// ============================================================================
// Flags
// ============================================================================

/// Severity of a finding. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        write!(f, "{}", s)
    }
}

/// Category tag of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagKind {
    // Vote risk
    SybilSuspected,
    NewWalletActivity,
    WhaleDomination,
    WhaleConcentration,
    WhalePresence,
    OptionSybil,
    // Economic risk
    CriticalTreasuryRisk,
    TreasuryDepletionRisk,
    TreasuryConcern,
    TreasuryImpact,
    UserBenefit,
    TreasuryAllocation,
    FundingRequest,
    TokenomicsChange,
    GeneralProposal,
}

/// A structured, severity-tagged finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    #[serde(rename = "type")]
    pub kind: FlagKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_option: Option<String>,
}

impl Flag {
    pub fn new(kind: FlagKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            affected_option: None,
        }
    }

    /// Tag the flag with the option it concerns.
    pub fn for_option(mut self, option: impl Into<String>) -> Self {
        self.affected_option = Some(option.into());
        self
    }
}

// ============================================================================
// Analysis Output
// ============================================================================

/// Which agent produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    WhaleWatch,
    Economic,
    Explainer,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::WhaleWatch => "whale_watch",
            AgentType::Economic => "economic",
            AgentType::Explainer => "explainer",
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the analyzer had input to work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Full analysis ran
    Complete,
    /// No votes yet; baseline result
    NoVotes,
    /// Proposal could not be located; baseline result
    PollNotFound,
}

/// Per-option slice of the vote set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionBreakdown {
    pub option: String,
    pub total_votes: usize,
    /// Percentage of this option's votes from new wallets (1 decimal)
    pub new_wallet_pct: f64,
    /// Average voting power behind this option (2 decimals)
    pub avg_balance: f64,
}

/// Statistics returned by the vote risk analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteStatistics {
    pub total_votes: usize,
    pub vote_breakdown: BTreeMap<String, usize>,
    pub new_wallet_count: usize,
    /// Percentage of all votes from new wallets (1 decimal)
    pub new_wallet_percentage: f64,
    /// Options in order of first appearance
    pub option_analysis: Vec<OptionBreakdown>,
    /// Share of voting power held by the top wallets; absent below the sample minimum
    pub whale_concentration_pct: Option<f64>,
    pub whale_analysis: String,
}

/// Economic category a proposal was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalCategory {
    StakingRewardChange,
    TreasuryAllocation,
    FundingRequest,
    TokenomicsChange,
    GovernanceChange,
    General,
}

impl std::fmt::Display for ProposalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProposalCategory::StakingRewardChange => "staking reward change",
            ProposalCategory::TreasuryAllocation => "treasury allocation",
            ProposalCategory::FundingRequest => "funding request",
            ProposalCategory::TokenomicsChange => "tokenomics change",
            ProposalCategory::GovernanceChange => "governance change",
            ProposalCategory::General => "general proposal",
        };
        write!(f, "{}", s)
    }
}

/// Treasury projections for a staking reward change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingProjections {
    pub current_apy: f64,
    pub proposed_apy: f64,
    pub apy_increase: f64,
    pub monthly_cost_increase: f64,
    pub annual_cost_increase: f64,
    pub current_runway_months: f64,
    pub proposed_runway_months: f64,
    pub runway_reduction_months: f64,
    pub treasury_balance: f64,
}

/// Detail returned by the economic analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicDetail {
    pub category: ProposalCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projections: Option<StakingProjections>,
    pub impact_analysis: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_amounts: Vec<String>,
}

/// Analyzer-specific structured detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisDetail {
    VoteStatistics(VoteStatistics),
    Economic(EconomicDetail),
    None,
}

/// One analyzer's result for one poll, created fresh per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub poll_id: String,
    pub agent_type: AgentType,
    pub status: AnalysisStatus,
    pub risk_score: RiskScore,
    pub flags: Vec<Flag>,
    pub risk_factors: Vec<Contribution>,
    pub summary: String,
    pub explanation: String,
    pub recommendation: String,
    pub detail: AnalysisDetail,
    pub analyzed_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl AnalysisResult {
    /// Baseline result for a poll the analyzer could not evaluate.
    pub fn baseline(
        poll_id: &str,
        agent_type: AgentType,
        status: AnalysisStatus,
        summary: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            poll_id: poll_id.to_string(),
            agent_type,
            status,
            risk_score: RiskScore::BASELINE,
            flags: Vec::new(),
            risk_factors: Vec::new(),
            summary: summary.into(),
            explanation: explanation.into(),
            recommendation: String::new(),
            detail: AnalysisDetail::None,
            analyzed_at: Utc::now(),
            execution_time_ms: 0,
        }
    }

    /// Whether the result reflects a full analysis.
    pub fn is_complete(&self) -> bool {
        self.status == AnalysisStatus::Complete
    }

    /// Vote statistics, if this is a vote risk result.
    pub fn vote_statistics(&self) -> Option<&VoteStatistics> {
        match &self.detail {
            AnalysisDetail::VoteStatistics(stats) => Some(stats),
            _ => None,
        }
    }

    /// Economic detail, if this is an economic result.
    pub fn economic_detail(&self) -> Option<&EconomicDetail> {
        match &self.detail {
            AnalysisDetail::Economic(detail) => Some(detail),
            _ => None,
        }
    }

    /// Staking projections, if the economic analyzer produced any.
    pub fn projections(&self) -> Option<&StakingProjections> {
        self.economic_detail().and_then(|d| d.projections.as_ref())
    }

    /// Flags of the given kind.
    pub fn flags_of(&self, kind: FlagKind) -> impl Iterator<Item = &Flag> {
        self.flags.iter().filter(move |f| f.kind == kind)
    }
}

/// Round to a fixed number of decimal places.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_defaults() {
        let vote = Vote {
            poll_id: "p".into(),
            wallet_address: "w".into(),
            vote_option: "yes".into(),
            signature: None,
            wallet_age_days: None,
            sol_balance: None,
        };
        assert_eq!(vote.age_days(), UNKNOWN_WALLET_AGE_DAYS);
        assert_eq!(vote.balance(), 0.0);
    }

    #[test]
    fn test_match_text_lowercases_and_joins() {
        let proposal = Proposal::new("p", "Increase Staking Rewards", vec![])
            .with_description("Raise the REWARD rate");
        assert_eq!(
            proposal.match_text(),
            "increase staking rewards raise the reward rate"
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_flag_serialization() {
        let flag =
            Flag::new(FlagKind::OptionSybil, Severity::Critical, "targeted").for_option("yes");
        let json = serde_json::to_value(&flag).unwrap();
        assert_eq!(json["type"], "OPTION_SYBIL");
        assert_eq!(json["severity"], "CRITICAL");
        assert_eq!(json["affected_option"], "yes");

        let plain = Flag::new(FlagKind::UserBenefit, Severity::Info, "gain");
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("affected_option").is_none());
    }

    #[test]
    fn test_baseline_result() {
        let result = AnalysisResult::baseline(
            "p1",
            AgentType::WhaleWatch,
            AnalysisStatus::NoVotes,
            "No votes yet",
            "Nothing to analyze",
        );
        assert_eq!(result.risk_score.value(), 1);
        assert!(result.flags.is_empty());
        assert!(!result.is_complete());
        assert!(result.vote_statistics().is_none());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(166.666_666, 1), 166.7);
        assert_eq!(round_to(2.005_1, 2), 2.01);
    }
}
