//! Bounded risk scores and the tiers derived from them.
//!
//! Each analyzer accumulates signed point contributions on a [`ScoreSheet`]
//! starting from the baseline, and converts the raw sum into a [`RiskScore`]
//! exactly once via [`ScoreSheet::finish`].

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// Integer risk score in `[1, 10]`. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RiskScore(u8);

impl RiskScore {
    /// Lowest score: no votes yet, or no signal detected.
    pub const BASELINE: RiskScore = RiskScore(1);
    /// Highest score.
    pub const MAX: RiskScore = RiskScore(10);

    /// Create a score, rejecting values outside `[1, 10]`.
    pub fn new(value: u8) -> Option<Self> {
        (Self::BASELINE.0..=Self::MAX.0)
            .contains(&value)
            .then_some(Self(value))
    }

    /// Clamp a raw contribution sum into `[1, 10]`.
    ///
    /// Sums above the ceiling are an expected outcome when several rules
    /// fire together. A sum below the floor means negative credits outweighed
    /// every penalty, which is logged as an anomaly.
    pub fn clamp_raw(raw: i32) -> Self {
        let min = i32::from(Self::BASELINE.0);
        let max = i32::from(Self::MAX.0);
        if raw > max {
            debug!(raw, "Risk score above ceiling, clamping to {}", max);
        } else if raw < min {
            warn!(raw, "Risk score below floor, clamping to {}", min);
        }
        // Bounded to [1, 10] so the narrowing cannot truncate
        Self(raw.clamp(min, max) as u8)
    }

    /// The numeric value.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Five-tier banding shared by both analyzers' narratives.
    pub fn tier(&self) -> RiskTier {
        RiskTier::from_score(*self)
    }
}

impl Default for RiskScore {
    fn default() -> Self {
        Self::BASELINE
    }
}

impl TryFrom<u8> for RiskScore {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("risk score {} outside [1, 10]", value))
    }
}

impl From<RiskScore> for u8 {
    fn from(score: RiskScore) -> Self {
        score.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One rule's signed contribution to the running score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub points: i32,
    pub reason: String,
}

impl fmt::Display for Contribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:+} points)", self.reason, self.points)
    }
}

/// Running tally of rule contributions, starting at the baseline.
#[derive(Debug, Clone)]
pub struct ScoreSheet {
    raw: i32,
    contributions: Vec<Contribution>,
}

impl Default for ScoreSheet {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreSheet {
    pub fn new() -> Self {
        Self {
            raw: i32::from(RiskScore::BASELINE.value()),
            contributions: Vec::new(),
        }
    }

    /// Record a contribution. Zero-point lines are kept for the narrative.
    pub fn add(&mut self, points: i32, reason: impl Into<String>) {
        self.raw += points;
        self.contributions.push(Contribution {
            points,
            reason: reason.into(),
        });
    }

    /// Raw unclamped total.
    pub fn raw(&self) -> i32 {
        self.raw
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    /// Clamp once and hand back the score with its breakdown.
    pub fn finish(self) -> (RiskScore, Vec<Contribution>) {
        (RiskScore::clamp_raw(self.raw), self.contributions)
    }
}

/// Five-tier score banding: `>=9 / >=7 / >=5 / >=3 / else`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Minimal,
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskTier {
    pub fn from_score(score: RiskScore) -> Self {
        match score.value() {
            9.. => RiskTier::Critical,
            7..=8 => RiskTier::High,
            5..=6 => RiskTier::Moderate,
            3..=4 => RiskTier::Low,
            _ => RiskTier::Minimal,
        }
    }

    /// Recommendation tier for this band.
    pub fn recommendation(&self) -> Recommendation {
        match self {
            RiskTier::Critical => Recommendation::Reject,
            RiskTier::High => Recommendation::ProceedWithCaution,
            RiskTier::Moderate => Recommendation::AcceptWithMonitoring,
            RiskTier::Low => Recommendation::Approve,
            RiskTier::Minimal => Recommendation::StronglyApprove,
        }
    }
}

/// Per-analyzer recommendation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Reject,
    ProceedWithCaution,
    AcceptWithMonitoring,
    Approve,
    StronglyApprove,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Recommendation::Reject => "REJECT",
            Recommendation::ProceedWithCaution => "CAUTION",
            Recommendation::AcceptWithMonitoring => "MONITOR",
            Recommendation::Approve => "APPROVE",
            Recommendation::StronglyApprove => "STRONGLY APPROVE",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(RiskScore::new(0).is_none());
        assert!(RiskScore::new(11).is_none());
        assert_eq!(RiskScore::new(7).map(|s| s.value()), Some(7));
    }

    #[test_case(-5, 1; "negative floors to one")]
    #[test_case(0, 1; "zero floors to one")]
    #[test_case(1, 1; "baseline")]
    #[test_case(6, 6; "in range")]
    #[test_case(10, 10; "ceiling")]
    #[test_case(50, 10; "far above ceiling")]
    fn test_clamp_raw(raw: i32, expected: u8) {
        assert_eq!(RiskScore::clamp_raw(raw).value(), expected);
    }

    #[test_case(10, RiskTier::Critical)]
    #[test_case(9, RiskTier::Critical)]
    #[test_case(8, RiskTier::High)]
    #[test_case(7, RiskTier::High)]
    #[test_case(6, RiskTier::Moderate)]
    #[test_case(5, RiskTier::Moderate)]
    #[test_case(4, RiskTier::Low)]
    #[test_case(3, RiskTier::Low)]
    #[test_case(2, RiskTier::Minimal)]
    #[test_case(1, RiskTier::Minimal)]
    fn test_tier_bands(score: u8, expected: RiskTier) {
        let score = RiskScore::new(score).unwrap();
        assert_eq!(score.tier(), expected);
    }

    #[test]
    fn test_recommendation_labels() {
        assert_eq!(RiskTier::Critical.recommendation().to_string(), "REJECT");
        assert_eq!(RiskTier::High.recommendation().to_string(), "CAUTION");
        assert_eq!(RiskTier::Moderate.recommendation().to_string(), "MONITOR");
        assert_eq!(RiskTier::Low.recommendation().to_string(), "APPROVE");
        assert_eq!(
            RiskTier::Minimal.recommendation().to_string(),
            "STRONGLY APPROVE"
        );
    }

    #[test]
    fn test_score_sheet_starts_at_baseline() {
        let sheet = ScoreSheet::new();
        assert_eq!(sheet.raw(), 1);
        assert!(sheet.is_empty());
        let (score, contributions) = sheet.finish();
        assert_eq!(score, RiskScore::BASELINE);
        assert!(contributions.is_empty());
    }

    #[test]
    fn test_score_sheet_accumulates_and_clamps_once() {
        let mut sheet = ScoreSheet::new();
        sheet.add(5, "new wallets");
        sheet.add(4, "whales");
        sheet.add(4, "option sybil");
        assert_eq!(sheet.raw(), 14);

        let (score, contributions) = sheet.finish();
        assert_eq!(score.value(), 10);
        assert_eq!(contributions.len(), 3);
    }

    #[test]
    fn test_negative_credit_cannot_drop_below_baseline() {
        let mut sheet = ScoreSheet::new();
        sheet.add(-1, "infrastructure credit");
        let (score, _) = sheet.finish();
        assert_eq!(score.value(), 1);
    }

    #[test]
    fn test_contribution_display() {
        let c = Contribution {
            points: 3,
            reason: "Elevated new wallets".into(),
        };
        assert_eq!(c.to_string(), "Elevated new wallets (+3 points)");
        let credit = Contribution {
            points: -1,
            reason: "Infrastructure".into(),
        };
        assert_eq!(credit.to_string(), "Infrastructure (-1 points)");
    }

    #[test]
    fn test_serde_rejects_zero() {
        assert!(serde_json::from_str::<RiskScore>("0").is_err());
        assert_eq!(serde_json::from_str::<RiskScore>("4").unwrap().value(), 4);
        assert_eq!(serde_json::to_string(&RiskScore::MAX).unwrap(), "10");
    }

    proptest! {
        #[test]
        fn prop_clamped_score_in_range(raw in any::<i32>()) {
            let score = RiskScore::clamp_raw(raw).value();
            prop_assert!((1..=10).contains(&score));
        }

        #[test]
        fn prop_sheet_total_always_valid(points in proptest::collection::vec(-10i32..=10, 0..20)) {
            let mut sheet = ScoreSheet::new();
            for p in &points {
                sheet.add(*p, "rule");
            }
            let (score, contributions) = sheet.finish();
            prop_assert!((1..=10).contains(&score.value()));
            prop_assert_eq!(contributions.len(), points.len());
        }
    }
}
