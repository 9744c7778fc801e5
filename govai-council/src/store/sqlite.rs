//! SQLite-backed governance store.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use govai_common::{Error, Result, StoreConfig};

use super::{AnalysisRecord, GovernanceStore, VoteAction, VoteStats};
use crate::analysis::{AnalysisResult, FinancialParameters, Proposal, Vote};
use crate::council::ConsensusResult;
use crate::explainer::Explanation;

// ============================================================================
// Database Schema
// ============================================================================

const CREATE_TABLES_SQL: &str = r#"
-- Proposals
CREATE TABLE IF NOT EXISTS polls (
    poll_id TEXT PRIMARY KEY,
    question TEXT NOT NULL,
    description TEXT,
    options_json TEXT NOT NULL,
    financials_json TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

-- Votes, one row per (poll, wallet) when written through record_vote
CREATE TABLE IF NOT EXISTS votes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    poll_id TEXT NOT NULL,
    wallet_address TEXT NOT NULL,
    vote_option TEXT NOT NULL,
    signature TEXT,
    wallet_age_days INTEGER,
    sol_balance REAL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_votes_poll_wallet
ON votes(poll_id, wallet_address);

-- Analyzer history (append-only)
CREATE TABLE IF NOT EXISTS agent_analyses (
    id TEXT PRIMARY KEY,
    poll_id TEXT NOT NULL,
    agent_type TEXT NOT NULL,
    risk_score INTEGER NOT NULL,
    flags_json TEXT NOT NULL,
    analysis_json TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_agent_analyses_poll
ON agent_analyses(poll_id, agent_type);

-- Consensus history (append-only)
CREATE TABLE IF NOT EXISTS consensus_results (
    id TEXT PRIMARY KEY,
    poll_id TEXT NOT NULL,
    combined_risk_score INTEGER NOT NULL,
    verdict TEXT NOT NULL,
    result_json TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_consensus_poll
ON consensus_results(poll_id);

-- Explainer history (append-only)
CREATE TABLE IF NOT EXISTS explanations (
    id TEXT PRIMARY KEY,
    poll_id TEXT NOT NULL,
    outcome TEXT NOT NULL,
    explanation_json TEXT NOT NULL,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_explanations_poll
ON explanations(poll_id);
"#;

/// Governance store over a single SQLite connection.
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

type PollRow = (String, String, Option<String>, String, Option<String>);

impl SqliteStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::Store(format!("Failed to open {}: {}", path.display(), e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::init(conn)?;
        info!(db_path = %path.display(), "Initialized governance store");
        Ok(store)
    }

    /// Open the database configured in `config`.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::open(&config.db_path)
    }

    /// Throwaway in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| Error::Store(format!("Failed to create tables: {}", e)))?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    // ========================================================================
    // Proposals
    // ========================================================================

    /// Register a proposal. Fails if the poll id is taken.
    pub async fn save_proposal(&self, proposal: &Proposal) -> Result<()> {
        let db = self.db.lock().await;

        let exists: bool = db
            .query_row(
                "SELECT 1 FROM polls WHERE poll_id = ?1",
                params![proposal.poll_id],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        if exists {
            return Err(Error::InvalidInput(format!(
                "Poll {} already exists",
                proposal.poll_id
            )));
        }

        let options_json = serde_json::to_string(&proposal.options)?;
        let financials_json = proposal
            .financials
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        db.execute(
            "INSERT INTO polls (poll_id, question, description, options_json, financials_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                proposal.poll_id,
                proposal.question,
                proposal.description,
                options_json,
                financials_json
            ],
        )?;

        debug!(poll_id = %proposal.poll_id, "Saved proposal");
        Ok(())
    }

    /// All proposals in registration order.
    pub async fn list_proposals(&self) -> Result<Vec<Proposal>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT poll_id, question, description, options_json, financials_json
             FROM polls ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], Self::row_to_poll)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(Self::poll_from_row).collect()
    }

    fn row_to_poll(row: &rusqlite::Row) -> rusqlite::Result<PollRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
        ))
    }

    fn poll_from_row(row: PollRow) -> Result<Proposal> {
        let (poll_id, question, description, options_json, financials_json) = row;
        let options: Vec<String> = serde_json::from_str(&options_json)?;
        let financials: Option<FinancialParameters> = financials_json
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        Ok(Proposal {
            poll_id,
            question,
            description,
            options,
            financials,
        })
    }

    // ========================================================================
    // Votes
    // ========================================================================

    /// Record a wallet's vote, replacing its earlier choice on the same poll.
    pub async fn record_vote(&self, vote: &Vote) -> Result<VoteAction> {
        let db = self.db.lock().await;

        let existing: Option<(i64, String)> = db
            .query_row(
                "SELECT id, vote_option FROM votes
                 WHERE poll_id = ?1 AND wallet_address = ?2
                 ORDER BY id LIMIT 1",
                params![vote.poll_id, vote.wallet_address],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match existing {
            Some((id, previous_option)) => {
                db.execute(
                    "UPDATE votes
                     SET vote_option = ?1, signature = ?2, wallet_age_days = ?3, sol_balance = ?4
                     WHERE id = ?5",
                    params![
                        vote.vote_option,
                        vote.signature,
                        vote.wallet_age_days,
                        vote.sol_balance,
                        id
                    ],
                )?;
                debug!(
                    poll_id = %vote.poll_id,
                    wallet = %vote.wallet_address,
                    previous = %previous_option,
                    "Vote changed"
                );
                Ok(VoteAction::Changed { previous_option })
            }
            None => {
                Self::insert_vote_row(&db, vote)?;
                debug!(poll_id = %vote.poll_id, wallet = %vote.wallet_address, "Vote recorded");
                Ok(VoteAction::Recorded)
            }
        }
    }

    /// Append a vote row without the one-per-wallet check.
    pub async fn insert_vote(&self, vote: &Vote) -> Result<()> {
        let db = self.db.lock().await;
        Self::insert_vote_row(&db, vote)
    }

    fn insert_vote_row(db: &Connection, vote: &Vote) -> Result<()> {
        db.execute(
            "INSERT INTO votes (poll_id, wallet_address, vote_option, signature, wallet_age_days, sol_balance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                vote.poll_id,
                vote.wallet_address,
                vote.vote_option,
                vote.signature,
                vote.wallet_age_days,
                vote.sol_balance
            ],
        )?;
        Ok(())
    }

    /// Aggregate vote figures for a poll.
    pub async fn vote_stats(&self, poll_id: &str) -> Result<VoteStats> {
        let votes = self.fetch_votes(poll_id).await?;

        let mut distribution = BTreeMap::new();
        let mut voters = HashSet::new();
        let mut total_voting_power = 0.0;
        for vote in &votes {
            *distribution.entry(vote.vote_option.clone()).or_insert(0) += 1;
            voters.insert(vote.wallet_address.as_str());
            total_voting_power += vote.balance();
        }

        Ok(VoteStats {
            total_votes: votes.len(),
            unique_voters: voters.len(),
            total_voting_power,
            distribution,
        })
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Analyzer history for a poll, oldest first.
    pub async fn list_analyses(&self, poll_id: &str) -> Result<Vec<AnalysisRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, poll_id, agent_type, risk_score, analysis_json, created_at
             FROM agent_analyses WHERE poll_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![poll_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u8>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, poll_id, agent_type, risk_score, json, created_at)| {
                Ok(AnalysisRecord {
                    id,
                    poll_id,
                    agent_type,
                    risk_score,
                    analysis: serde_json::from_str(&json)?,
                    created_at,
                })
            })
            .collect()
    }

    /// Number of consensus records stored for a poll.
    pub async fn consensus_count(&self, poll_id: &str) -> Result<usize> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM consensus_results WHERE poll_id = ?1",
            params![poll_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Number of explainer records stored for a poll.
    pub async fn explanation_count(&self, poll_id: &str) -> Result<usize> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM explanations WHERE poll_id = ?1",
            params![poll_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl GovernanceStore for SqliteStore {
    async fn fetch_proposal(&self, poll_id: &str) -> Result<Option<Proposal>> {
        let row = {
            let db = self.db.lock().await;
            db.query_row(
                "SELECT poll_id, question, description, options_json, financials_json
                 FROM polls WHERE poll_id = ?1",
                params![poll_id],
                Self::row_to_poll,
            )
            .optional()?
        };
        row.map(Self::poll_from_row).transpose()
    }

    async fn fetch_votes(&self, poll_id: &str) -> Result<Vec<Vote>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT poll_id, wallet_address, vote_option, signature, wallet_age_days, sol_balance
             FROM votes WHERE poll_id = ?1 ORDER BY id",
        )?;
        let votes = stmt
            .query_map(params![poll_id], |row| {
                Ok(Vote {
                    poll_id: row.get(0)?,
                    wallet_address: row.get(1)?,
                    vote_option: row.get(2)?,
                    signature: row.get(3)?,
                    wallet_age_days: row.get(4)?,
                    sol_balance: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(votes)
    }

    async fn append_analysis(&self, record: &AnalysisResult) -> Result<()> {
        let flags_json = serde_json::to_string(&record.flags)?;
        let analysis_json = serde_json::to_string(record)?;

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO agent_analyses (id, poll_id, agent_type, risk_score, flags_json, analysis_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id.to_string(),
                record.poll_id,
                record.agent_type.as_str(),
                record.risk_score.value(),
                flags_json,
                analysis_json
            ],
        )?;
        Ok(())
    }

    async fn append_consensus(&self, record: &ConsensusResult) -> Result<()> {
        let result_json = serde_json::to_string(record)?;

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO consensus_results (id, poll_id, combined_risk_score, verdict, result_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id.to_string(),
                record.poll_id,
                record.combined_risk_score.value(),
                record.verdict.to_string(),
                result_json
            ],
        )?;
        Ok(())
    }

    async fn append_explanation(&self, record: &Explanation) -> Result<()> {
        let explanation_json = serde_json::to_string(record)?;

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO explanations (id, poll_id, outcome, explanation_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id.to_string(),
                record.poll_id,
                record.outcome.kind(),
                explanation_json
            ],
        )?;
        Ok(())
    }
}
