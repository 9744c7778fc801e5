//! Proposal and vote storage.
//!
//! The council reads proposals and votes through [`GovernanceStore`] and
//! appends every analysis it produces. History is append-only: records are
//! never updated or read back by the analyzers.

pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use govai_common::Result;

use crate::analysis::{AnalysisResult, Proposal, Vote};
use crate::council::ConsensusResult;
use crate::explainer::Explanation;

pub use sqlite::SqliteStore;

/// Storage collaborator used by the council.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GovernanceStore: Send + Sync {
    /// Fetch a proposal, `None` if it does not exist.
    async fn fetch_proposal(&self, poll_id: &str) -> Result<Option<Proposal>>;

    /// All votes for a poll in insertion order. Empty when none were cast.
    async fn fetch_votes(&self, poll_id: &str) -> Result<Vec<Vote>>;

    /// Append an analyzer result to the history.
    async fn append_analysis(&self, record: &AnalysisResult) -> Result<()>;

    /// Append a consensus result to the history.
    async fn append_consensus(&self, record: &ConsensusResult) -> Result<()>;

    /// Append an explainer result to the history.
    async fn append_explanation(&self, record: &Explanation) -> Result<()>;
}

/// Outcome of recording a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum VoteAction {
    /// First vote from this wallet on the poll
    Recorded,
    /// Wallet had voted before; its choice was replaced
    Changed { previous_option: String },
}

/// Aggregate vote figures for a poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoteStats {
    pub total_votes: usize,
    pub unique_voters: usize,
    pub total_voting_power: f64,
    pub distribution: BTreeMap<String, usize>,
}

/// A stored analyzer result as it appears in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub poll_id: String,
    pub agent_type: String,
    pub risk_score: u8,
    pub analysis: serde_json::Value,
    pub created_at: String,
}
