//! Narrative policy shared by the risk analyzers.
//!
//! [`compose`] turns a final score, its flags, the score breakdown, and the
//! analyzer's structured detail into summary, explanation, and recommendation
//! text. It is a pure function: identical inputs give identical text.
//!
//! Both analyzers band scores identically through [`RiskTier`]; each supplies
//! its own wording and detail sections through a [`NarrativeTemplate`].

use super::score::{Contribution, RiskScore, RiskTier};
use super::types::{EconomicDetail, Flag, Severity, StakingProjections, VoteStatistics};

/// Rendered narrative for one analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrative {
    pub summary: String,
    pub explanation: String,
    pub recommendation: String,
}

/// A titled block of lines inside an explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub lines: Vec<String>,
}

impl Section {
    pub fn new(title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            title: title.into(),
            lines,
        }
    }

    fn render(&self, out: &mut String) {
        out.push_str(&format!("**{}:**\n", self.title));
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }
}

/// Analyzer-specific wording plugged into [`compose`].
pub trait NarrativeTemplate {
    /// Structured detail rendered into the explanation.
    type Detail: ?Sized;

    /// Heading label for the score line, e.g. "Risk Score".
    const SCORE_LABEL: &'static str;

    /// One-line summary for the tier.
    fn summary(tier: RiskTier) -> &'static str;

    /// Assessment heading and paragraph for the tier.
    fn assessment(tier: RiskTier) -> (&'static str, &'static str);

    /// Detail sections, in display order.
    fn sections(detail: &Self::Detail) -> Vec<Section>;

    /// Recommendation body (without the heading line).
    fn recommendation_body(tier: RiskTier, detail: &Self::Detail) -> String;
}

/// Compose the narrative for a finished analysis.
pub fn compose<T: NarrativeTemplate>(
    score: RiskScore,
    flags: &[Flag],
    contributions: &[Contribution],
    detail: &T::Detail,
) -> Narrative {
    let tier = score.tier();
    let recommendation = format!(
        "**RECOMMENDATION: {}**\n\n{}",
        tier.recommendation(),
        T::recommendation_body(tier, detail)
    );

    let mut explanation = format!("**{}: {}/10**\n\n", T::SCORE_LABEL, score);

    let (heading, body) = T::assessment(tier);
    explanation.push_str(&format!("**{}**\n\n{}\n\n", heading, body));

    for section in T::sections(detail) {
        section.render(&mut explanation);
    }

    if !flags.is_empty() {
        let lines = flags
            .iter()
            .map(|f| match &f.affected_option {
                Some(option) => format!("• [{}] {} (option: {})", f.severity, f.message, option),
                None => format!("• [{}] {}", f.severity, f.message),
            })
            .collect();
        Section::new("Findings", lines).render(&mut explanation);
    }

    let breakdown = contributions.iter().map(|c| format!("• {}", c)).collect();
    Section::new("Risk Score Breakdown", breakdown).render(&mut explanation);

    explanation.push_str(&format!("**Final Score: {}/10**\n\n", score));
    explanation.push_str(&recommendation);

    Narrative {
        summary: T::summary(tier).to_string(),
        explanation,
        recommendation,
    }
}

// ============================================================================
// Vote risk wording
// ============================================================================

/// Wording for the vote risk analyzer.
pub struct VoteRiskNarrative;

impl NarrativeTemplate for VoteRiskNarrative {
    type Detail = VoteStatistics;

    const SCORE_LABEL: &'static str = "Risk Score";

    fn summary(tier: RiskTier) -> &'static str {
        match tier {
            RiskTier::Critical => {
                "CRITICAL RISK - Strong evidence of manipulation or coordinated attack"
            }
            RiskTier::High => "HIGH RISK - Significant suspicious patterns detected",
            RiskTier::Moderate => "MODERATE RISK - Some concerning indicators present",
            RiskTier::Low => "LOW RISK - Minor concerns but generally healthy",
            RiskTier::Minimal => {
                "MINIMAL RISK - Voting pattern appears legitimate and decentralized"
            }
        }
    }

    fn assessment(tier: RiskTier) -> (&'static str, &'static str) {
        match tier {
            RiskTier::Critical => (
                "CRITICAL RISK DETECTED",
                "This voting pattern shows strong signs of manipulation. Multiple red flags \
                 point to either a coordinated sybil attack or whale manipulation attempting \
                 to control the outcome.",
            ),
            RiskTier::High => (
                "HIGH RISK WARNING",
                "Significant suspicious activity detected. This is not proof of manipulation, \
                 but the patterns warrant serious concern and additional scrutiny.",
            ),
            RiskTier::Moderate => (
                "MODERATE RISK",
                "Some concerning patterns merit attention. The vote may be legitimate but \
                 shows characteristics that could indicate manipulation attempts.",
            ),
            RiskTier::Low => (
                "LOW RISK",
                "Generally healthy voting pattern with minor concerns. The detected issues \
                 are not severe enough to question the vote's legitimacy.",
            ),
            RiskTier::Minimal => (
                "MINIMAL RISK",
                "Healthy voting pattern with decentralized, legitimate participation. \
                 No significant red flags detected.",
            ),
        }
    }

    fn sections(stats: &VoteStatistics) -> Vec<Section> {
        let mut sections = vec![
            Section::new(
                "Voting Statistics",
                vec![
                    format!("• Total votes cast: {}", stats.total_votes),
                    format!(
                        "• New wallet participation: {:.1}%",
                        stats.new_wallet_percentage
                    ),
                ],
            ),
            Section::new(
                "Whale Concentration Analysis",
                vec![stats.whale_analysis.clone()],
            ),
        ];

        if !stats.option_analysis.is_empty() {
            let lines = stats
                .option_analysis
                .iter()
                .map(|o| {
                    format!(
                        "• **{}**: {} votes ({:.1}% new wallets, avg {:.2} SOL)",
                        o.option.to_uppercase(),
                        o.total_votes,
                        o.new_wallet_pct,
                        o.avg_balance
                    )
                })
                .collect();
            sections.push(Section::new("Voting Option Breakdown", lines));
        }

        sections
    }

    fn recommendation_body(tier: RiskTier, stats: &VoteStatistics) -> String {
        match tier {
            RiskTier::Critical => format!(
                "The vote is very likely manipulated. {:.1}% of votes come from wallets under \
                 a week old. Do not act on this result without an independent audit of the \
                 participating wallets.",
                stats.new_wallet_percentage
            ),
            RiskTier::High => "Treat the outcome with caution. Review the flagged wallets and \
                 consider extending the voting period to broaden participation."
                .to_string(),
            RiskTier::Moderate => "The result can stand, but monitor participation for the \
                 remainder of the vote and re-run this analysis before execution."
                .to_string(),
            RiskTier::Low => "Voting looks legitimate. Minor signals do not call the outcome \
                 into question."
                .to_string(),
            RiskTier::Minimal => format!(
                "Participation across {} votes is healthy and decentralized. The outcome can \
                 be trusted.",
                stats.total_votes
            ),
        }
    }
}

// ============================================================================
// Economic risk wording
// ============================================================================

/// Wording for the economic risk analyzer.
pub struct EconomicNarrative;

impl NarrativeTemplate for EconomicNarrative {
    type Detail = EconomicDetail;

    const SCORE_LABEL: &'static str = "Economic Risk Score";

    fn summary(tier: RiskTier) -> &'static str {
        match tier {
            RiskTier::Critical => "CRITICAL ECONOMIC RISK - Threatens financial sustainability",
            RiskTier::High => "HIGH ECONOMIC RISK - Significant financial concerns",
            RiskTier::Moderate => "MODERATE RISK - Some economic tradeoffs present",
            RiskTier::Low => "LOW RISK - Minor economic impact",
            RiskTier::Minimal => "MINIMAL RISK - Economically sound proposal",
        }
    }

    fn assessment(tier: RiskTier) -> (&'static str, &'static str) {
        match tier {
            RiskTier::Critical => (
                "CRITICAL ECONOMIC RISK",
                "This proposal poses severe threats to the protocol's financial \
                 sustainability. The economic impact could jeopardize long-term viability.",
            ),
            RiskTier::High => (
                "HIGH ECONOMIC RISK",
                "Significant economic concerns identified. This proposal could strain \
                 treasury resources or create unsustainable obligations.",
            ),
            RiskTier::Moderate => (
                "MODERATE ECONOMIC RISK",
                "Notable economic tradeoffs present. The proposal is viable but requires \
                 careful monitoring of treasury impact.",
            ),
            RiskTier::Low => (
                "LOW ECONOMIC RISK",
                "Minor economic impact detected. The proposal is financially sound with \
                 manageable tradeoffs.",
            ),
            RiskTier::Minimal => (
                "MINIMAL ECONOMIC RISK",
                "Financially sustainable and well-balanced. No significant concerns \
                 identified.",
            ),
        }
    }

    fn sections(detail: &EconomicDetail) -> Vec<Section> {
        let mut sections = vec![Section::new(
            "Economic Impact Analysis",
            detail.impact_analysis.clone(),
        )];

        if let Some(p) = &detail.projections {
            sections.push(Section::new("Financial Projections", projection_lines(p)));
        }

        if !detail.mentioned_amounts.is_empty() {
            sections.push(Section::new(
                "Mentioned Amounts",
                detail
                    .mentioned_amounts
                    .iter()
                    .map(|a| format!("• {}", a))
                    .collect(),
            ));
        }

        sections
    }

    fn recommendation_body(tier: RiskTier, detail: &EconomicDetail) -> String {
        let projections = detail.projections.as_ref();
        match tier {
            RiskTier::Critical => {
                let mut rec = String::from(
                    "This proposal threatens the protocol's financial sustainability. \
                     The economic risks far outweigh potential benefits. ",
                );
                if let Some(p) = projections {
                    rec.push_str(&format!(
                        "Treasury would be exhausted in {:.1} months. ",
                        p.proposed_runway_months
                    ));
                }
                rec.push_str("Consider rejecting or fundamentally restructuring the proposal.");
                rec
            }
            RiskTier::High => {
                let mut rec = String::from(
                    "Significant economic concerns warrant serious consideration. ",
                );
                if let Some(p) = projections {
                    rec.push_str(&format!(
                        "Treasury runway drops to {:.1} months. ",
                        p.proposed_runway_months
                    ));
                }
                rec.push_str(
                    "Revise to reduce financial impact or add safeguards and monitoring.",
                );
                rec
            }
            RiskTier::Moderate => {
                let mut rec = String::from(
                    "Proposal is economically viable but presents notable tradeoffs. ",
                );
                if let Some(p) = projections {
                    rec.push_str(&format!(
                        "Reduces runway by {:.1} months. ",
                        p.runway_reduction_months
                    ));
                }
                rec.push_str("Approve with close monitoring of treasury metrics.");
                rec
            }
            RiskTier::Low => "Proposal is financially sound with minimal risk. Economic impact \
                 is manageable and sustainable."
                .to_string(),
            RiskTier::Minimal => "Financially sustainable and well-structured with minimal \
                 downside."
                .to_string(),
        }
    }
}

fn projection_lines(p: &StakingProjections) -> Vec<String> {
    vec![
        format!("• Current APY: {}%", p.current_apy),
        format!("• Proposed APY: {}%", p.proposed_apy),
        format!("• APY change: {:+}%", p.apy_increase),
        format!("• Monthly cost increase: {:.2} tokens", p.monthly_cost_increase),
        format!("• Annual cost increase: {:.2} tokens", p.annual_cost_increase),
        format!("• Current runway: {} months", p.current_runway_months),
        format!("• Proposed runway: {} months", p.proposed_runway_months),
        format!("• Runway reduction: {} months", p.runway_reduction_months),
        format!("• Treasury balance: {:.0} tokens", p.treasury_balance),
    ]
}

/// Lines describing flags at or above a severity, used by the deliberation.
pub fn flag_lines(flags: &[Flag], min_severity: Severity) -> Vec<String> {
    flags
        .iter()
        .filter(|f| f.severity >= min_severity)
        .map(|f| format!("• {}: {}", f.severity, f.message))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::{FlagKind, OptionBreakdown, ProposalCategory};
    use std::collections::BTreeMap;

    fn stats() -> VoteStatistics {
        VoteStatistics {
            total_votes: 12,
            vote_breakdown: BTreeMap::from([("yes".to_string(), 8), ("no".to_string(), 4)]),
            new_wallet_count: 1,
            new_wallet_percentage: 8.3,
            option_analysis: vec![OptionBreakdown {
                option: "yes".into(),
                total_votes: 8,
                new_wallet_pct: 12.5,
                avg_balance: 4.25,
            }],
            whale_concentration_pct: Some(22.0),
            whale_analysis: "HEALTHY: Top 5 wallets control only 22.0% of voting power.".into(),
        }
    }

    fn score(v: u8) -> RiskScore {
        RiskScore::new(v).unwrap()
    }

    #[test]
    fn test_vote_narrative_layout() {
        let contributions = vec![Contribution {
            points: 0,
            reason: "Baseline risk assessment - healthy voting pattern detected".into(),
        }];
        let n = compose::<VoteRiskNarrative>(score(1), &[], &contributions, &stats());

        assert!(n.summary.starts_with("MINIMAL RISK"));
        assert!(n.explanation.starts_with("**Risk Score: 1/10**"));
        assert!(n.explanation.contains("**Voting Statistics:**"));
        assert!(n.explanation.contains("• Total votes cast: 12"));
        assert!(n.explanation.contains("HEALTHY: Top 5 wallets"));
        assert!(n.explanation.contains("• **YES**: 8 votes (12.5% new wallets, avg 4.25 SOL)"));
        assert!(n
            .explanation
            .contains("• Baseline risk assessment - healthy voting pattern detected (+0 points)"));
        assert!(n.explanation.contains("**Final Score: 1/10**"));
        assert!(!n.explanation.contains("**Findings:**"));
        assert!(n.recommendation.starts_with("**RECOMMENDATION: STRONGLY APPROVE**"));
        assert!(n.explanation.ends_with(&n.recommendation));
    }

    #[test]
    fn test_findings_section_lists_flags_in_order() {
        let flags = vec![
            Flag::new(FlagKind::SybilSuspected, Severity::Critical, "first"),
            Flag::new(FlagKind::OptionSybil, Severity::High, "second").for_option("no"),
        ];
        let n = compose::<VoteRiskNarrative>(score(9), &flags, &[], &stats());

        let first = n.explanation.find("• [CRITICAL] first").unwrap();
        let second = n.explanation.find("• [HIGH] second (option: no)").unwrap();
        assert!(first < second);
        assert!(n.recommendation.starts_with("**RECOMMENDATION: REJECT**"));
        assert!(n.recommendation.contains("8.3% of votes"));
    }

    #[test]
    fn test_compose_is_deterministic() {
        let flags = vec![Flag::new(FlagKind::WhalePresence, Severity::Medium, "whales")];
        let a = compose::<VoteRiskNarrative>(score(5), &flags, &[], &stats());
        let b = compose::<VoteRiskNarrative>(score(5), &flags, &[], &stats());
        assert_eq!(a, b);
    }

    #[test]
    fn test_economic_narrative_with_projections() {
        let detail = EconomicDetail {
            category: ProposalCategory::StakingRewardChange,
            projections: Some(StakingProjections {
                current_apy: 6.0,
                proposed_apy: 8.0,
                apy_increase: 2.0,
                monthly_cost_increase: 2000.0,
                annual_cost_increase: 24000.0,
                current_runway_months: 166.7,
                proposed_runway_months: 125.0,
                runway_reduction_months: 41.7,
                treasury_balance: 1_000_000.0,
            }),
            impact_analysis: vec!["HEALTHY: Strong runway".into()],
            mentioned_amounts: vec![],
        };
        let n = compose::<EconomicNarrative>(score(9), &[], &[], &detail);

        assert!(n.explanation.starts_with("**Economic Risk Score: 9/10**"));
        assert!(n.explanation.contains("**Financial Projections:**"));
        assert!(n.explanation.contains("• Proposed runway: 125 months"));
        assert!(n.explanation.contains("• APY change: +2%"));
        assert!(!n.explanation.contains("**Mentioned Amounts:**"));
        assert!(n.recommendation.contains("exhausted in 125.0 months"));
    }

    #[test]
    fn test_economic_narrative_without_projections() {
        let detail = EconomicDetail {
            category: ProposalCategory::TreasuryAllocation,
            projections: None,
            impact_analysis: vec!["TREASURY SPENDING".into()],
            mentioned_amounts: vec!["$250k".into()],
        };
        let n = compose::<EconomicNarrative>(score(4), &[], &[], &detail);
        assert!(!n.explanation.contains("**Financial Projections:**"));
        assert!(n.explanation.contains("• $250k"));
        assert!(n.recommendation.starts_with("**RECOMMENDATION: APPROVE**"));
    }

    #[test]
    fn test_flag_lines_filters_by_severity() {
        let flags = vec![
            Flag::new(FlagKind::UserBenefit, Severity::Info, "gain"),
            Flag::new(FlagKind::TreasuryConcern, Severity::Medium, "runway"),
        ];
        assert_eq!(flag_lines(&flags, Severity::Low), vec!["• MEDIUM: runway"]);
        assert_eq!(flag_lines(&flags, Severity::Info).len(), 2);
    }
}
