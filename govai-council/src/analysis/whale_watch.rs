//! Vote risk analyzer.
//!
//! Detects sybil-like wallet patterns and whale concentration in a poll's
//! vote set. Rules are applied in a fixed order, each adding to a shared
//! [`ScoreSheet`]:
//!
//! | Rule | Signal | Bands |
//! |------|--------|-------|
//! | New wallets | share of votes from wallets < 7 days old | >50% +5, >30% +3, >15% +1 |
//! | Whales | share of voting power held by the top 5 votes (>= 5 votes only) | >70% +4, >50% +2, >30% +1 |
//! | Targeted sybil | new-wallet share within each option | >70% +4, >50% +2 |

use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::narrative::{compose, VoteRiskNarrative};
use super::score::ScoreSheet;
use super::types::{
    round_to, AgentType, AnalysisDetail, AnalysisResult, AnalysisStatus, Flag, FlagKind,
    OptionBreakdown, Severity, Vote, VoteStatistics,
};

/// Wallets younger than this many days count as new.
pub const NEW_WALLET_AGE_DAYS: u32 = 7;

/// Number of largest balances summed for whale concentration.
pub const WHALE_TOP_N: usize = 5;

/// Minimum vote count before whale concentration is evaluated.
pub const WHALE_MIN_VOTES: usize = 5;

/// Vote risk analyzer ("whale watch").
#[derive(Debug, Clone, Copy, Default)]
pub struct VoteRiskAnalyzer;

impl VoteRiskAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze a snapshot of votes for a poll.
    ///
    /// Every vote record counts; repeat votes from one wallet are not merged.
    pub fn analyze(&self, poll_id: &str, votes: &[Vote]) -> AnalysisResult {
        let start = Instant::now();

        if votes.is_empty() {
            debug!(poll_id, "No votes cast, returning baseline vote risk");
            return AnalysisResult::baseline(
                poll_id,
                AgentType::WhaleWatch,
                AnalysisStatus::NoVotes,
                "No votes yet - baseline risk",
                "No votes have been cast yet on this proposal. Risk assessment will be \
                 available once voting begins.",
            );
        }

        let mut sheet = ScoreSheet::new();
        let mut flags = Vec::new();

        let total = votes.len();
        let new_wallet_count = votes.iter().filter(|v| is_new(v)).count();
        let new_pct = percentage(new_wallet_count, total);

        evaluate_new_wallets(new_wallet_count, new_pct, &mut sheet, &mut flags);
        let (whale_pct, whale_analysis) = evaluate_whales(votes, &mut sheet, &mut flags);
        let option_analysis = evaluate_options(votes, &mut sheet, &mut flags);

        if sheet.is_empty() {
            sheet.add(0, "Baseline risk assessment - healthy voting pattern detected");
        }

        let mut vote_breakdown = BTreeMap::new();
        for vote in votes {
            *vote_breakdown.entry(vote.vote_option.clone()).or_insert(0) += 1;
        }

        let stats = VoteStatistics {
            total_votes: total,
            vote_breakdown,
            new_wallet_count,
            new_wallet_percentage: round_to(new_pct, 1),
            option_analysis,
            whale_concentration_pct: whale_pct.map(|p| round_to(p, 1)),
            whale_analysis,
        };

        let (risk_score, risk_factors) = sheet.finish();
        let narrative = compose::<VoteRiskNarrative>(risk_score, &flags, &risk_factors, &stats);
        let execution_time_ms = start.elapsed().as_millis() as u64;

        info!(
            poll_id,
            risk_score = risk_score.value(),
            flags = flags.len(),
            total_votes = total,
            duration_ms = execution_time_ms,
            "Vote risk analysis complete"
        );

        AnalysisResult {
            id: Uuid::new_v4(),
            poll_id: poll_id.to_string(),
            agent_type: AgentType::WhaleWatch,
            status: AnalysisStatus::Complete,
            risk_score,
            flags,
            risk_factors,
            summary: narrative.summary,
            explanation: narrative.explanation,
            recommendation: narrative.recommendation,
            detail: AnalysisDetail::VoteStatistics(stats),
            analyzed_at: chrono::Utc::now(),
            execution_time_ms,
        }
    }
}

fn is_new(vote: &Vote) -> bool {
    vote.age_days() < NEW_WALLET_AGE_DAYS
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Points awarded for an overall new-wallet share.
pub fn new_wallet_points(new_pct: f64) -> (i32, Option<Severity>) {
    if new_pct > 50.0 {
        (5, Some(Severity::Critical))
    } else if new_pct > 30.0 {
        (3, Some(Severity::High))
    } else if new_pct > 15.0 {
        (1, Some(Severity::Medium))
    } else {
        (0, None)
    }
}

/// Points awarded for a top-wallet share of voting power.
pub fn whale_points(whale_pct: f64) -> (i32, Option<Severity>) {
    if whale_pct > 70.0 {
        (4, Some(Severity::Critical))
    } else if whale_pct > 50.0 {
        (2, Some(Severity::High))
    } else if whale_pct > 30.0 {
        (1, Some(Severity::Medium))
    } else {
        (0, None)
    }
}

/// Points awarded for a single option's new-wallet share.
pub fn option_sybil_points(option_new_pct: f64) -> (i32, Option<Severity>) {
    if option_new_pct > 70.0 {
        (4, Some(Severity::Critical))
    } else if option_new_pct > 50.0 {
        (2, Some(Severity::High))
    } else {
        (0, None)
    }
}

fn evaluate_new_wallets(
    new_count: usize,
    new_pct: f64,
    sheet: &mut ScoreSheet,
    flags: &mut Vec<Flag>,
) {
    let (points, severity) = new_wallet_points(new_pct);
    let Some(severity) = severity else {
        return;
    };

    let (kind, verdict, reason) = match severity {
        Severity::Critical => (
            FlagKind::SybilSuspected,
            "likely coordinated attack",
            format!("Extreme sybil risk: {:.1}% new wallets", new_pct),
        ),
        Severity::High => (
            FlagKind::SybilSuspected,
            "suspicious pattern",
            format!("High new wallet concentration: {:.1}%", new_pct),
        ),
        _ => (
            FlagKind::NewWalletActivity,
            "monitor closely",
            format!("Moderate new wallet activity: {:.1}%", new_pct),
        ),
    };

    flags.push(Flag::new(
        kind,
        severity,
        format!(
            "{} votes ({:.1}%) from wallets <{} days old - {}",
            new_count, new_pct, NEW_WALLET_AGE_DAYS, verdict
        ),
    ));
    sheet.add(points, reason);
}

/// Returns the raw top-wallet share (if evaluated) and its narrative.
fn evaluate_whales(
    votes: &[Vote],
    sheet: &mut ScoreSheet,
    flags: &mut Vec<Flag>,
) -> (Option<f64>, String) {
    if votes.len() < WHALE_MIN_VOTES {
        return (
            None,
            format!(
                "Too few votes ({}) to assess whale concentration. Need at least {} votes.",
                votes.len(),
                WHALE_MIN_VOTES
            ),
        );
    }

    let mut balances: Vec<f64> = votes.iter().map(Vote::balance).collect();
    balances.sort_by(|a, b| b.total_cmp(a));
    let total: f64 = balances.iter().sum();
    let top: f64 = balances.iter().take(WHALE_TOP_N).sum();
    let whale_pct = if total > 0.0 { top / total * 100.0 } else { 0.0 };

    let (points, severity) = whale_points(whale_pct);
    let analysis = match severity {
        Some(Severity::Critical) => {
            flags.push(Flag::new(
                FlagKind::WhaleDomination,
                Severity::Critical,
                format!(
                    "Top {} wallets control {:.1}% of voting power - extreme centralization",
                    WHALE_TOP_N, whale_pct
                ),
            ));
            sheet.add(
                points,
                format!("Extreme whale dominance: top {} control {:.1}%", WHALE_TOP_N, whale_pct),
            );
            format!(
                "CRITICAL: Top {} wallets hold {:.1}% of voting power. A small group can \
                 determine the outcome.",
                WHALE_TOP_N, whale_pct
            )
        }
        Some(Severity::High) => {
            flags.push(Flag::new(
                FlagKind::WhaleConcentration,
                Severity::High,
                format!(
                    "Top {} wallets control {:.1}% of voting power - high centralization",
                    WHALE_TOP_N, whale_pct
                ),
            ));
            sheet.add(
                points,
                format!("High whale concentration: top {} control {:.1}%", WHALE_TOP_N, whale_pct),
            );
            format!(
                "HIGH: Top {} wallets control {:.1}% of voting power. This concentration \
                 could influence the outcome.",
                WHALE_TOP_N, whale_pct
            )
        }
        Some(_) => {
            flags.push(Flag::new(
                FlagKind::WhalePresence,
                Severity::Medium,
                format!(
                    "Top {} wallets control {:.1}% of voting power - moderate concentration",
                    WHALE_TOP_N, whale_pct
                ),
            ));
            sheet.add(
                points,
                format!("Moderate whale presence: top {} control {:.1}%", WHALE_TOP_N, whale_pct),
            );
            format!(
                "MODERATE: Top {} wallets control {:.1}% of voting power. Distribution is \
                 somewhat centralized but not alarming.",
                WHALE_TOP_N, whale_pct
            )
        }
        None => format!(
            "HEALTHY: Top {} wallets control only {:.1}% of voting power. This indicates \
             good decentralization.",
            WHALE_TOP_N, whale_pct
        ),
    };

    (Some(whale_pct), analysis)
}

/// Per-option breakdown in order of first appearance, flagging targeted sybil activity.
fn evaluate_options(
    votes: &[Vote],
    sheet: &mut ScoreSheet,
    flags: &mut Vec<Flag>,
) -> Vec<OptionBreakdown> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: BTreeMap<&str, Vec<&Vote>> = BTreeMap::new();
    for vote in votes {
        let option = vote.vote_option.as_str();
        groups
            .entry(option)
            .or_insert_with(|| {
                order.push(option);
                Vec::new()
            })
            .push(vote);
    }

    let mut breakdown = Vec::with_capacity(order.len());
    for option in order {
        let Some(group) = groups.get(option) else {
            continue;
        };
        let count = group.len();
        let new_count = group.iter().filter(|v| is_new(v)).count();
        let option_new_pct = percentage(new_count, count);
        let avg_balance = group.iter().map(|v| v.balance()).sum::<f64>() / count as f64;

        let (points, severity) = option_sybil_points(option_new_pct);
        if let Some(severity) = severity {
            let (verdict, reason) = if severity == Severity::Critical {
                (
                    "targeted attack suspected",
                    format!("Targeted sybil on '{}': {:.1}% new wallets", option, option_new_pct),
                )
            } else {
                (
                    "suspicious concentration",
                    format!(
                        "High new wallet concentration on '{}': {:.1}%",
                        option, option_new_pct
                    ),
                )
            };
            flags.push(
                Flag::new(
                    FlagKind::OptionSybil,
                    severity,
                    format!(
                        "'{}' votes: {:.1}% from new wallets - {}",
                        option, option_new_pct, verdict
                    ),
                )
                .for_option(option),
            );
            sheet.add(points, reason);
        }

        breakdown.push(OptionBreakdown {
            option: option.to_string(),
            total_votes: count,
            new_wallet_pct: round_to(option_new_pct, 1),
            avg_balance: round_to(avg_balance, 2),
        });
    }

    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn vote(option: &str, age: u32, balance: f64) -> Vote {
        Vote::new("poll-1", format!("wallet-{}-{}", option, age), option, age, balance)
    }

    fn votes(rows: &[(&str, u32, f64, usize)]) -> Vec<Vote> {
        rows.iter()
            .flat_map(|(option, age, balance, count)| {
                (0..*count).map(move |_| vote(option, *age, *balance))
            })
            .collect()
    }

    #[test_case(60.0, 5, Some(Severity::Critical); "above fifty")]
    #[test_case(50.0, 3, Some(Severity::High); "exactly fifty is high")]
    #[test_case(31.0, 3, Some(Severity::High); "above thirty")]
    #[test_case(30.0, 1, Some(Severity::Medium); "exactly thirty is medium")]
    #[test_case(15.1, 1, Some(Severity::Medium); "just above fifteen")]
    #[test_case(15.0, 0, None; "exactly fifteen is healthy")]
    fn test_new_wallet_bands(pct: f64, points: i32, severity: Option<Severity>) {
        assert_eq!(new_wallet_points(pct), (points, severity));
    }

    #[test_case(70.1, 4, Some(Severity::Critical))]
    #[test_case(70.0, 2, Some(Severity::High))]
    #[test_case(50.0, 1, Some(Severity::Medium))]
    #[test_case(30.0, 0, None)]
    fn test_whale_bands(pct: f64, points: i32, severity: Option<Severity>) {
        assert_eq!(whale_points(pct), (points, severity));
    }

    #[test_case(100.0, 4, Some(Severity::Critical))]
    #[test_case(70.0, 2, Some(Severity::High))]
    #[test_case(50.0, 0, None)]
    fn test_option_bands(pct: f64, points: i32, severity: Option<Severity>) {
        assert_eq!(option_sybil_points(pct), (points, severity));
    }

    #[test]
    fn test_no_votes_returns_baseline() {
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &[]);
        assert_eq!(result.risk_score.value(), 1);
        assert_eq!(result.status, AnalysisStatus::NoVotes);
        assert!(result.flags.is_empty());
        assert!(result.explanation.contains("No votes have been cast yet"));
    }

    #[test]
    fn test_sixty_percent_new_wallets_is_critical() {
        // 6 of 10 new, balanced balances, options split so no option exceeds 70% new
        let votes = votes(&[
            ("yes", 1, 10.0, 3),
            ("no", 1, 10.0, 3),
            ("yes", 365, 10.0, 2),
            ("no", 365, 10.0, 2),
        ]);
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &votes);

        let sybil: Vec<_> = result.flags_of(FlagKind::SybilSuspected).collect();
        assert_eq!(sybil.len(), 1);
        assert_eq!(sybil[0].severity, Severity::Critical);
        assert_eq!(result.risk_factors[0].points, 5);
        assert!(result.risk_factors[0].reason.contains("60.0%"));
    }

    #[test]
    fn test_whale_rule_skipped_below_minimum_votes() {
        let votes = votes(&[("yes", 400, 1_000_000.0, 1), ("no", 400, 1.0, 3)]);
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &votes);

        assert!(result.flags.is_empty());
        assert_eq!(result.risk_score.value(), 1);
        let stats = result.vote_statistics().unwrap();
        assert_eq!(stats.whale_concentration_pct, None);
        assert!(stats.whale_analysis.contains("Too few votes (4)"));
    }

    #[test]
    fn test_whale_domination() {
        let mut votes = votes(&[("yes", 400, 1000.0, 5)]);
        votes.extend(self::votes(&[("no", 400, 1.0, 10)]));
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &votes);

        let whale: Vec<_> = result.flags_of(FlagKind::WhaleDomination).collect();
        assert_eq!(whale.len(), 1);
        assert_eq!(result.risk_score.value(), 5);
        assert!(result
            .vote_statistics()
            .unwrap()
            .whale_analysis
            .starts_with("CRITICAL"));
    }

    #[test]
    fn test_zero_total_balance_is_not_concentrated() {
        let votes = votes(&[("yes", 400, 0.0, 6)]);
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &votes);
        let stats = result.vote_statistics().unwrap();
        assert_eq!(stats.whale_concentration_pct, Some(0.0));
        assert!(stats.whale_analysis.starts_with("HEALTHY"));
    }

    #[test]
    fn test_targeted_option_sybil_below_global_threshold() {
        // 2 of 20 votes are new (10%), both on "abstain"
        let votes = votes(&[
            ("yes", 200, 5.0, 9),
            ("no", 200, 5.0, 9),
            ("abstain", 2, 5.0, 2),
        ]);
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &votes);

        assert_eq!(result.flags_of(FlagKind::SybilSuspected).count(), 0);
        assert_eq!(result.flags_of(FlagKind::NewWalletActivity).count(), 0);
        let targeted: Vec<_> = result.flags_of(FlagKind::OptionSybil).collect();
        assert_eq!(targeted.len(), 1);
        assert_eq!(targeted[0].severity, Severity::Critical);
        assert_eq!(targeted[0].affected_option.as_deref(), Some("abstain"));
        assert_eq!(result.risk_score.value(), 5);
    }

    #[test]
    fn test_each_option_evaluated_independently() {
        let votes = votes(&[
            ("yes", 1, 5.0, 3),
            ("yes", 100, 5.0, 1),
            ("no", 1, 5.0, 2),
            ("no", 100, 5.0, 1),
            ("abstain", 100, 5.0, 13),
        ]);
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &votes);
        let targeted: Vec<_> = result.flags_of(FlagKind::OptionSybil).collect();
        assert_eq!(targeted.len(), 2);
        assert_eq!(targeted[0].affected_option.as_deref(), Some("yes"));
        assert_eq!(targeted[0].severity, Severity::Critical);
        assert_eq!(targeted[1].affected_option.as_deref(), Some("no"));
        assert_eq!(targeted[1].severity, Severity::High);
    }

    #[test]
    fn test_option_analysis_in_first_appearance_order() {
        let votes = vec![
            vote("zeta", 100, 2.0),
            vote("alpha", 100, 4.0),
            vote("zeta", 100, 3.0),
        ];
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &votes);
        let stats = result.vote_statistics().unwrap();
        let names: Vec<_> = stats.option_analysis.iter().map(|o| o.option.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert_eq!(stats.option_analysis[0].avg_balance, 2.5);
        assert_eq!(stats.vote_breakdown["zeta"], 2);
    }

    #[test]
    fn test_missing_age_counts_as_established() {
        let votes: Vec<Vote> = (0..6)
            .map(|i| Vote {
                poll_id: "poll-1".into(),
                wallet_address: format!("w{}", i),
                vote_option: "yes".into(),
                signature: None,
                wallet_age_days: None,
                sol_balance: None,
            })
            .collect();
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &votes);
        assert_eq!(result.vote_statistics().unwrap().new_wallet_count, 0);
        assert_eq!(result.risk_score.value(), 1);
    }

    #[test]
    fn test_healthy_vote_has_baseline_line() {
        let votes = votes(&[("yes", 300, 10.0, 10), ("no", 300, 10.0, 10)]);
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &votes);
        assert_eq!(result.risk_factors.len(), 1);
        assert_eq!(result.risk_factors[0].points, 0);
        assert!(result.risk_factors[0].reason.starts_with("Baseline risk assessment"));
    }

    #[test]
    fn test_fifty_established_wallets_across_three_options() {
        let votes = votes(&[
            ("yes", 180, 10.0, 20),
            ("no", 365, 10.0, 20),
            ("abstain", 720, 10.0, 10),
        ]);
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &votes);

        assert_eq!(result.status, AnalysisStatus::Complete);
        assert_eq!(result.risk_score.value(), 1);
        assert!(result.flags.is_empty());
        let stats = result.vote_statistics().unwrap();
        assert_eq!(stats.total_votes, 50);
        assert_eq!(stats.new_wallet_count, 0);
        assert_eq!(stats.option_analysis.len(), 3);
        assert_eq!(stats.whale_concentration_pct, Some(10.0));
    }

    #[test]
    fn test_all_rules_saturate_at_ten() {
        // All new wallets with one dominant option and heavy whales
        let mut votes = votes(&[("yes", 0, 1000.0, 5)]);
        votes.extend(self::votes(&[("yes", 0, 0.1, 20)]));
        let result = VoteRiskAnalyzer::new().analyze("poll-1", &votes);
        // 1 + 5 + 4 + 4 = 14 before clamping
        assert_eq!(result.risk_score.value(), 10);
        assert_eq!(result.flags.len(), 3);
    }

    proptest! {
        #[test]
        fn prop_score_in_range(
            raw in proptest::collection::vec((0u32..30, 0.0f64..1000.0, 0usize..3), 0..60)
        ) {
            let options = ["yes", "no", "abstain"];
            let votes: Vec<Vote> = raw
                .iter()
                .enumerate()
                .map(|(i, (age, balance, opt))| {
                    Vote::new("p", format!("w{}", i), options[*opt], *age, *balance)
                })
                .collect();
            let result = VoteRiskAnalyzer::new().analyze("p", &votes);
            let score = result.risk_score.value();
            prop_assert!((1..=10).contains(&score));
            if votes.is_empty() {
                prop_assert_eq!(score, 1);
            }
            prop_assert!(!result.risk_factors.is_empty() || votes.is_empty());
        }
    }
}
