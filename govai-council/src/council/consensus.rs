//! Consensus synthesis over the two risk analyzers.
//!
//! Vote risk is weighted 60% and economic risk 40%, truncated to an integer.
//! When one analyzer failed, the survivor's score stands alone and the
//! failure is recorded on the result.

use chrono::Utc;
use uuid::Uuid;

use govai_common::{Error, Result};

use super::types::{AgentFailure, ConsensusResult, ConsensusVerdict};
use crate::analysis::narrative::flag_lines;
use crate::analysis::{AgentType, AnalysisResult, RiskScore, Severity};

/// Vote risk weight, in tenths.
pub const VOTE_WEIGHT: i32 = 6;
/// Economic risk weight, in tenths.
pub const ECONOMIC_WEIGHT: i32 = 4;

/// Vote-risk score at or above which the transcript calls a security threat.
const SECURITY_THREAT_SCORE: u8 = 7;

/// `floor(0.6 * vote + 0.4 * economic)`, computed in integers.
pub fn combined_score(vote: RiskScore, economic: RiskScore) -> RiskScore {
    let weighted = VOTE_WEIGHT * i32::from(vote.value())
        + ECONOMIC_WEIGHT * i32::from(economic.value());
    RiskScore::clamp_raw(weighted / (VOTE_WEIGHT + ECONOMIC_WEIGHT))
}

/// Fixed-format transcript: vote-risk section, then economic section.
pub fn deliberation(
    vote: Option<&AnalysisResult>,
    economic: Option<&AnalysisResult>,
    failures: &[AgentFailure],
) -> String {
    let mut lines = vec!["WHALE WATCH AGENT:".to_string()];
    match vote {
        Some(result) => {
            let score = result.risk_score.value();
            if score >= SECURITY_THREAT_SCORE {
                lines.push(format!("   CRITICAL SECURITY THREAT DETECTED (Risk: {}/10)", score));
            } else {
                lines.push(format!("   Security Status: Risk {}/10", score));
            }
            lines.extend(indent(flag_lines(&result.flags, Severity::Info)));
        }
        None => lines.push(unavailable(AgentType::WhaleWatch, failures)),
    }

    lines.push(String::new());
    lines.push("ECONOMIC AGENT:".to_string());
    match economic {
        Some(result) => {
            lines.push(format!("   Financial Impact: Risk {}/10", result.risk_score));
            if let Some(p) = result.projections() {
                lines.push(format!(
                    "   • Treasury runway: {:.1} → {:.1} months",
                    p.current_runway_months, p.proposed_runway_months
                ));
                lines.push(format!("   • User APY gain: {:+.1}%", p.apy_increase));
            }
            lines.extend(indent(flag_lines(&result.flags, Severity::Low)));
        }
        None => lines.push(unavailable(AgentType::Economic, failures)),
    }

    lines.join("\n")
}

fn indent(lines: Vec<String>) -> impl Iterator<Item = String> {
    lines.into_iter().map(|l| format!("   {}", l))
}

fn unavailable(agent: AgentType, failures: &[AgentFailure]) -> String {
    let reason = failures
        .iter()
        .find(|f| f.agent_type == agent)
        .map(|f| f.reason.as_str())
        .unwrap_or("no result");
    format!("   Analysis unavailable: {}", reason)
}

/// Combine per-analyzer outcomes into a consensus result.
///
/// Fails only when neither analyzer produced a result.
pub fn synthesize(
    poll_id: &str,
    vote: Result<AnalysisResult>,
    economic: Result<AnalysisResult>,
    execution_time_ms: u64,
) -> Result<ConsensusResult> {
    let mut failures = Vec::new();

    let vote = match vote {
        Ok(result) => Some(result),
        Err(e) => {
            failures.push(AgentFailure {
                agent_type: AgentType::WhaleWatch,
                reason: e.to_string(),
            });
            None
        }
    };
    let economic = match economic {
        Ok(result) => Some(result),
        Err(e) => {
            failures.push(AgentFailure {
                agent_type: AgentType::Economic,
                reason: e.to_string(),
            });
            None
        }
    };

    let combined = match (&vote, &economic) {
        (Some(v), Some(e)) => combined_score(v.risk_score, e.risk_score),
        (Some(v), None) => v.risk_score,
        (None, Some(e)) => e.risk_score,
        (None, None) => {
            let reasons: Vec<_> = failures.iter().map(|f| f.reason.as_str()).collect();
            return Err(Error::Store(format!(
                "All analyzers failed for poll {}: {}",
                poll_id,
                reasons.join("; ")
            )));
        }
    };

    let verdict = ConsensusVerdict::from_score(combined);
    let agent_deliberation = deliberation(vote.as_ref(), economic.as_ref(), &failures);

    Ok(ConsensusResult {
        id: Uuid::new_v4(),
        poll_id: poll_id.to_string(),
        combined_risk_score: combined,
        verdict,
        consensus_recommendation: verdict.recommendation().to_string(),
        agent_deliberation,
        vote_risk: vote,
        economic,
        failures,
        analyzed_at: Utc::now(),
        execution_time_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{EconomicRiskAnalyzer, Proposal, Vote, VoteRiskAnalyzer};
    use proptest::prelude::*;
    use test_case::test_case;

    fn score(v: u8) -> RiskScore {
        RiskScore::new(v).unwrap()
    }

    #[test_case(9, 2, 6, ConsensusVerdict::Delay; "whale heavy")]
    #[test_case(1, 1, 1, ConsensusVerdict::Approve; "both baseline")]
    #[test_case(10, 10, 10, ConsensusVerdict::Reject; "both max")]
    #[test_case(5, 1, 3, ConsensusVerdict::ApproveWithCaution; "truncates")]
    #[test_case(8, 8, 8, ConsensusVerdict::Reject; "reject boundary")]
    #[test_case(2, 10, 5, ConsensusVerdict::ApproveWithCaution; "economic heavy")]
    fn test_combined_score(v: u8, e: u8, expected: u8, verdict: ConsensusVerdict) {
        let combined = combined_score(score(v), score(e));
        assert_eq!(combined.value(), expected);
        assert_eq!(ConsensusVerdict::from_score(combined), verdict);
    }

    #[test_case(8, ConsensusVerdict::Reject)]
    #[test_case(7, ConsensusVerdict::Delay)]
    #[test_case(6, ConsensusVerdict::Delay)]
    #[test_case(5, ConsensusVerdict::ApproveWithCaution)]
    #[test_case(3, ConsensusVerdict::ApproveWithCaution)]
    #[test_case(2, ConsensusVerdict::Approve)]
    fn test_verdict_bands(value: u8, expected: ConsensusVerdict) {
        assert_eq!(ConsensusVerdict::from_score(score(value)), expected);
    }

    fn sybil_votes() -> Vec<Vote> {
        (0..10)
            .map(|i| Vote::new("p1", format!("w{}", i), "yes", 1, 10.0))
            .collect()
    }

    fn staking_proposal() -> Proposal {
        Proposal::new("p1", "Increase staking rewards from 6% to 8%", vec!["yes".into()])
    }

    #[test]
    fn test_deliberation_format() {
        let vote = VoteRiskAnalyzer::new().analyze("p1", &sybil_votes());
        let economic = EconomicRiskAnalyzer::default().analyze("p1", Some(&staking_proposal()));
        let result = synthesize("p1", Ok(vote), Ok(economic), 3).unwrap();

        let text = &result.agent_deliberation;
        assert!(text.starts_with(
            "WHALE WATCH AGENT:\n   CRITICAL SECURITY THREAT DETECTED (Risk: 10/10)"
        ));
        assert!(text.contains("   • CRITICAL: 10 votes (100.0%) from wallets <7 days old"));
        assert!(text.contains("\n\nECONOMIC AGENT:\n   Financial Impact: Risk 1/10"));
        assert!(text.contains("   • Treasury runway: 166.7 → 125.0 months"));
        assert!(text.contains("   • User APY gain: +2.0%"));
        // INFO flags are left out of the economic section
        assert!(!text.contains("INFO"));

        // 0.6 * 10 + 0.4 * 1 = 6.4
        assert_eq!(result.combined_risk_score.value(), 6);
        assert_eq!(result.verdict, ConsensusVerdict::Delay);
        assert!(result.consensus_recommendation.starts_with("DELAY"));
        assert!(result.is_complete());
    }

    #[test]
    fn test_security_status_below_threat() {
        let votes = vec![Vote::new("p1", "w", "yes", 400, 1.0)];
        let vote = VoteRiskAnalyzer::new().analyze("p1", &votes);
        let text = deliberation(Some(&vote), None, &[]);
        assert!(text.contains("   Security Status: Risk 1/10"));
        assert!(text.contains("   Analysis unavailable: no result"));
    }

    #[test]
    fn test_one_failure_keeps_survivor() {
        let vote = VoteRiskAnalyzer::new().analyze("p1", &sybil_votes());
        let result = synthesize(
            "p1",
            Ok(vote),
            Err(Error::Timeout("fetch_proposal".into())),
            1,
        )
        .unwrap();

        assert_eq!(result.combined_risk_score.value(), 10);
        assert!(result.economic.is_none());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].agent_type, AgentType::Economic);
        assert!(result.agent_deliberation.contains("Analysis unavailable: Operation timed out"));
    }

    #[test]
    fn test_both_failures_is_an_error() {
        let err = synthesize(
            "p1",
            Err(Error::Store("down".into())),
            Err(Error::Store("down".into())),
            1,
        )
        .unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("All analyzers failed for poll p1"));
    }

    proptest! {
        #[test]
        fn prop_combined_matches_weighted_floor(v in 1u8..=10, e in 1u8..=10) {
            let combined = combined_score(score(v), score(e)).value();
            let expected = (0.6 * f64::from(v) + 0.4 * f64::from(e) + 1e-9).floor() as u8;
            prop_assert_eq!(combined, expected);
        }
    }
}
