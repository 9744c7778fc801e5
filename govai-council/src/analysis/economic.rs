//! Economic risk analyzer.
//!
//! Classifies a proposal by keyword into exactly one economic category
//! (first match wins) and, for staking reward changes, simulates the treasury
//! runway at the current and proposed reward rates.
//!
//! Cascade order: staking reward change, treasury allocation, funding request,
//! tokenomics change, governance change, general.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use govai_common::EconomicConfig;

use super::narrative::{compose, EconomicNarrative};
use super::score::ScoreSheet;
use super::types::{
    round_to, AgentType, AnalysisDetail, AnalysisResult, AnalysisStatus, EconomicDetail, Flag,
    FlagKind, Proposal, ProposalCategory, Severity, StakingProjections,
};

/// Runway reported when the reward rate costs nothing.
pub const UNBOUNDED_RUNWAY_MONTHS: f64 = 999.0;

static PERCENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap());

static AMOUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"[$€£]\d[\d,]*(?:\.\d+)?[kmb]?|\b\d{1,3}(?:,\d{3})+(?:\.\d+)?[kmb]?\b|\b\d+(?:\.\d+)?[kmb]\b|\b\d{4,}\b",
    )
    .unwrap()
});

const INFRASTRUCTURE_KEYWORDS: &[&str] = &["plasma", "deployment", "infrastructure"];
const SUPPLY_KEYWORDS: &[&str] = &["supply", "emission", "mint"];

/// Constants driving the treasury simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Monthly staked-token volume the reward rate applies to
    pub monthly_staked_tokens: f64,
    /// Treasury balance funding the rewards
    pub treasury_balance: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self::from(&EconomicConfig::default())
    }
}

impl From<&EconomicConfig> for SimulationParams {
    fn from(config: &EconomicConfig) -> Self {
        Self {
            monthly_staked_tokens: config.monthly_staked_tokens,
            treasury_balance: config.treasury_balance,
        }
    }
}

impl SimulationParams {
    /// Apply any per-proposal overrides.
    pub fn for_proposal(&self, proposal: &Proposal) -> Self {
        let Some(financials) = proposal.financials else {
            return *self;
        };
        Self {
            monthly_staked_tokens: financials
                .monthly_staked_tokens
                .unwrap_or(self.monthly_staked_tokens),
            treasury_balance: financials.treasury_balance.unwrap_or(self.treasury_balance),
        }
    }

    /// Monthly reward cost at a rate given in percent.
    pub fn monthly_cost(&self, rate_pct: f64) -> f64 {
        self.monthly_staked_tokens * rate_pct / 100.0
    }

    /// Months until the treasury is exhausted at a rate given in percent.
    pub fn runway_months(&self, rate_pct: f64) -> f64 {
        let cost = self.monthly_cost(rate_pct);
        if cost > 0.0 {
            self.treasury_balance / cost
        } else {
            UNBOUNDED_RUNWAY_MONTHS
        }
    }
}

/// Points awarded for the runway left at the proposed rate.
pub fn runway_points(proposed_runway_months: f64) -> (i32, Option<Severity>) {
    if proposed_runway_months < 6.0 {
        (7, Some(Severity::Critical))
    } else if proposed_runway_months < 12.0 {
        (5, Some(Severity::High))
    } else if proposed_runway_months < 18.0 {
        (3, Some(Severity::Medium))
    } else if proposed_runway_months < 24.0 {
        (1, Some(Severity::Low))
    } else {
        (0, None)
    }
}

/// First two percentages in the text, as (current, proposed).
pub fn extract_rate_pair(text: &str) -> Option<(f64, f64)> {
    let mut rates = PERCENT_PATTERN
        .captures_iter(text)
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<f64>().ok()));
    let current = rates.next()?;
    let proposed = rates.next()?;
    Some((current, proposed))
}

/// Monetary amounts mentioned in the text, in order of appearance.
pub fn extract_amounts(text: &str) -> Vec<String> {
    AMOUNT_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Economic risk analyzer.
#[derive(Debug, Clone, Default)]
pub struct EconomicRiskAnalyzer {
    params: SimulationParams,
}

struct Findings {
    sheet: ScoreSheet,
    flags: Vec<Flag>,
    impact: Vec<String>,
}

impl EconomicRiskAnalyzer {
    pub fn new(params: SimulationParams) -> Self {
        Self { params }
    }

    pub fn from_config(config: &EconomicConfig) -> Self {
        Self::new(SimulationParams::from(config))
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Analyze a proposal. `None` yields the not-found baseline.
    pub fn analyze(&self, poll_id: &str, proposal: Option<&Proposal>) -> AnalysisResult {
        let start = Instant::now();

        let Some(proposal) = proposal else {
            debug!(poll_id, "Poll not found, returning baseline economic risk");
            return AnalysisResult::baseline(
                poll_id,
                AgentType::Economic,
                AnalysisStatus::PollNotFound,
                "Poll not found - baseline risk",
                "Unable to analyze - the proposal could not be located.",
            );
        };

        let text = proposal.match_text();
        let params = self.params.for_proposal(proposal);
        let mut findings = Findings {
            sheet: ScoreSheet::new(),
            flags: Vec::new(),
            impact: Vec::new(),
        };
        let mut projections = None;
        let mut mentioned_amounts = Vec::new();

        let category = if text.contains("staking") && text.contains("reward") {
            match extract_rate_pair(&text) {
                Some((current, proposed)) => {
                    projections = Some(simulate_staking(&params, current, proposed, &mut findings));
                }
                None => {
                    findings.flags.push(Flag::new(
                        FlagKind::GeneralProposal,
                        Severity::Low,
                        "Staking reward change without recognizable rates - standard economic impact",
                    ));
                    findings.sheet.add(0, "Staking reward change with unspecified rates");
                    findings.impact.push(
                        "STAKING: The proposal changes staking rewards but no current and \
                         proposed rate could be extracted, so treasury impact was not simulated."
                            .to_string(),
                    );
                }
            }
            ProposalCategory::StakingRewardChange
        } else if text.contains("treasury") || text.contains("allocate") {
            mentioned_amounts = extract_amounts(&text);
            findings.flags.push(Flag::new(
                FlagKind::TreasuryAllocation,
                Severity::Medium,
                "Proposal involves direct treasury allocation - requires careful review",
            ));
            findings.sheet.add(4, "Treasury allocation proposal");
            findings.impact.push(
                "TREASURY SPENDING: This proposal allocates funds from the treasury. Verify \
                 the amount is justified and benefits the protocol."
                    .to_string(),
            );
            if contains_any(&text, INFRASTRUCTURE_KEYWORDS) {
                findings.sheet.add(-1, "Infrastructure investment reduces risk");
                findings.impact.push(
                    "INFRASTRUCTURE: Funds are earmarked for protocol infrastructure, which \
                     can enhance network capabilities."
                        .to_string(),
                );
            }
            ProposalCategory::TreasuryAllocation
        } else if text.contains("funding") || text.contains("grant") {
            findings.flags.push(Flag::new(
                FlagKind::FundingRequest,
                Severity::Medium,
                "Funding or grant request - evaluate ROI and accountability",
            ));
            findings.sheet.add(3, "Funding request proposal");
            findings.impact.push(
                "FUNDING REQUEST: Assess whether deliverables are clear and the team is \
                 accountable."
                    .to_string(),
            );
            ProposalCategory::FundingRequest
        } else if text.contains("token") && contains_any(&text, SUPPLY_KEYWORDS) {
            findings.flags.push(Flag::new(
                FlagKind::TokenomicsChange,
                Severity::High,
                "Changes to token supply or emissions - impacts all holders",
            ));
            findings.sheet.add(5, "Token supply/emission changes");
            findings.impact.push(
                "TOKENOMICS: Proposal modifies token supply mechanics, affecting dilution and \
                 value for every holder."
                    .to_string(),
            );
            ProposalCategory::TokenomicsChange
        } else if text.contains("governance") || text.contains("voting") {
            findings.sheet.add(2, "Governance structure changes");
            findings.impact.push(
                "GOVERNANCE: Proposal modifies governance structure. Consider long-term \
                 implications for decentralization."
                    .to_string(),
            );
            ProposalCategory::GovernanceChange
        } else {
            findings.flags.push(Flag::new(
                FlagKind::GeneralProposal,
                Severity::Low,
                "General proposal - standard economic impact",
            ));
            findings.sheet.add(0, "General proposal with baseline risk");
            findings.impact.push(
                "GENERAL PROPOSAL: No major economic red flags detected. Standard governance \
                 proposal with minimal financial impact."
                    .to_string(),
            );
            ProposalCategory::General
        };

        let Findings {
            sheet,
            flags,
            impact,
        } = findings;
        let detail = EconomicDetail {
            category,
            projections,
            impact_analysis: impact,
            mentioned_amounts,
        };

        let (risk_score, risk_factors) = sheet.finish();
        let narrative = compose::<EconomicNarrative>(risk_score, &flags, &risk_factors, &detail);
        let execution_time_ms = start.elapsed().as_millis() as u64;

        info!(
            poll_id,
            category = %category,
            risk_score = risk_score.value(),
            flags = flags.len(),
            duration_ms = execution_time_ms,
            "Economic risk analysis complete"
        );

        AnalysisResult {
            id: Uuid::new_v4(),
            poll_id: poll_id.to_string(),
            agent_type: AgentType::Economic,
            status: AnalysisStatus::Complete,
            risk_score,
            flags,
            risk_factors,
            summary: narrative.summary,
            explanation: narrative.explanation,
            recommendation: narrative.recommendation,
            detail: AnalysisDetail::Economic(detail),
            analyzed_at: chrono::Utc::now(),
            execution_time_ms,
        }
    }
}

/// Run the runway simulation for a reward rate change.
fn simulate_staking(
    params: &SimulationParams,
    current: f64,
    proposed: f64,
    findings: &mut Findings,
) -> StakingProjections {
    let current_cost = params.monthly_cost(current);
    let proposed_cost = params.monthly_cost(proposed);
    let additional_cost = proposed_cost - current_cost;
    let current_runway = params.runway_months(current);
    let proposed_runway = params.runway_months(proposed);
    let runway_reduction = current_runway - proposed_runway;
    let apy_change = proposed - current;

    let (points, severity) = runway_points(proposed_runway);
    match severity {
        Some(Severity::Critical) => {
            findings.flags.push(Flag::new(
                FlagKind::CriticalTreasuryRisk,
                Severity::Critical,
                format!("Treasury depletes in {:.1} months - UNSUSTAINABLE", proposed_runway),
            ));
            findings.sheet.add(
                points,
                format!(
                    "Critical runway depletion: only {:.1} months remaining",
                    proposed_runway
                ),
            );
            findings.impact.push(format!(
                "CRITICAL: At the proposed rate the treasury is exhausted in {:.1} months. \
                 This is dangerously short and threatens project survival.",
                proposed_runway
            ));
        }
        Some(Severity::High) => {
            findings.flags.push(Flag::new(
                FlagKind::TreasuryDepletionRisk,
                Severity::High,
                format!(
                    "Treasury runway drops to {:.1} months - below the 12-month safety threshold",
                    proposed_runway
                ),
            ));
            findings.sheet.add(
                points,
                format!("High treasury risk: {:.1} months runway", proposed_runway),
            );
            findings.impact.push(format!(
                "HIGH RISK: Treasury runway drops to {:.1} months, falling below the \
                 12-month safety threshold.",
                proposed_runway
            ));
        }
        Some(Severity::Medium) => {
            findings.flags.push(Flag::new(
                FlagKind::TreasuryConcern,
                Severity::Medium,
                format!(
                    "Treasury runway reduces to {:.1} months - reduced financial flexibility",
                    proposed_runway
                ),
            ));
            findings.sheet.add(
                points,
                format!("Moderate treasury impact: {:.1} months runway", proposed_runway),
            );
            findings.impact.push(format!(
                "MODERATE: Runway reduces to {:.1} months. While above critical levels, this \
                 reduces financial flexibility.",
                proposed_runway
            ));
        }
        Some(_) => {
            findings.flags.push(Flag::new(
                FlagKind::TreasuryImpact,
                Severity::Low,
                format!("Treasury runway of {:.1} months - minor impact", proposed_runway),
            ));
            findings.sheet.add(
                points,
                format!("Minor treasury impact: {:.1} months runway", proposed_runway),
            );
            findings.impact.push(format!(
                "LOW IMPACT: Runway of {:.1} months provides adequate cushion for the change.",
                proposed_runway
            ));
        }
        None => {
            findings.sheet.add(
                points,
                format!("Healthy treasury position: {:.1} months runway", proposed_runway),
            );
            findings.impact.push(format!(
                "HEALTHY: Strong runway of {:.1} months allows for this change without \
                 sustainability concerns.",
                proposed_runway
            ));
        }
    }

    let benefit = if apy_change >= 0.0 {
        format!(
            "Users gain +{}% APY (from {}% to {}%)",
            apy_change, current, proposed
        )
    } else {
        format!(
            "Users lose {}% APY (from {}% to {}%)",
            apy_change.abs(),
            current,
            proposed
        )
    };
    findings
        .flags
        .push(Flag::new(FlagKind::UserBenefit, Severity::Info, benefit));

    if current > 0.0 {
        findings.impact.push(format!(
            "STAKER BENEFIT: Stakers see a {:+}% APY change, from {}% to {}%. This makes \
             staking {:.0}% {} attractive.",
            apy_change,
            current,
            proposed,
            (apy_change / current * 100.0).abs(),
            if apy_change >= 0.0 { "more" } else { "less" }
        ));
    } else {
        findings.impact.push(format!(
            "STAKER BENEFIT: Stakers move from no rewards to {}% APY.",
            proposed
        ));
    }

    findings.impact.push(if runway_reduction > 12.0 {
        format!(
            "TRADEOFF: The {:+}% APY change costs {:.1} months of runway. This is a significant \
             tradeoff favoring short-term rewards over long-term sustainability.",
            apy_change, runway_reduction
        )
    } else if runway_reduction > 6.0 {
        format!(
            "BALANCED: The {:+}% APY change reduces runway by {:.1} months - a moderate \
             tradeoff between growth and sustainability.",
            apy_change, runway_reduction
        )
    } else {
        format!(
            "FAVORABLE: The {:+}% APY change costs only {:.1} months of runway - an excellent \
             value proposition for stakers.",
            apy_change, runway_reduction
        )
    });

    StakingProjections {
        current_apy: current,
        proposed_apy: proposed,
        apy_increase: round_to(apy_change, 2),
        monthly_cost_increase: round_to(additional_cost, 2),
        annual_cost_increase: round_to(additional_cost * 12.0, 2),
        current_runway_months: round_to(current_runway, 1),
        proposed_runway_months: round_to(proposed_runway, 1),
        runway_reduction_months: round_to(runway_reduction, 1),
        treasury_balance: params.treasury_balance,
    }
}
