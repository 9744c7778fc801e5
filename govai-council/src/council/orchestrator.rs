//! Council orchestrator.
//!
//! Fetches input snapshots from the store, runs the analyzers over them, and
//! appends each result to the history. Store calls are bounded by the
//! configured timeout. Appends are best-effort: a failed append is logged
//! and the result is still returned.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use govai_common::{Config, Error, Result, ResultExt};

use super::consensus;
use super::types::ConsensusResult;
use crate::analysis::{AnalysisResult, EconomicRiskAnalyzer, VoteRiskAnalyzer};
use crate::explainer::{ExplainerAgent, Explanation, TextGenerator};
use crate::store::GovernanceStore;

/// The agent council.
pub struct Council {
    store: Arc<dyn GovernanceStore>,
    vote_analyzer: VoteRiskAnalyzer,
    economic_analyzer: EconomicRiskAnalyzer,
    explainer: ExplainerAgent,
    store_timeout: Duration,
}

impl Council {
    /// Create a council from configuration.
    pub fn new(
        store: Arc<dyn GovernanceStore>,
        generator: Arc<dyn TextGenerator>,
        config: &Config,
    ) -> Self {
        Self::with_parts(
            store,
            EconomicRiskAnalyzer::from_config(&config.economic),
            ExplainerAgent::new(generator),
            config.store.timeout(),
        )
    }

    /// Create a council from explicit parts.
    pub fn with_parts(
        store: Arc<dyn GovernanceStore>,
        economic_analyzer: EconomicRiskAnalyzer,
        explainer: ExplainerAgent,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            vote_analyzer: VoteRiskAnalyzer::new(),
            economic_analyzer,
            explainer,
            store_timeout,
        }
    }

    /// Run a store call under the request-level timeout.
    async fn bounded<T, F>(&self, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.context(format!("store {}", operation)),
            Err(_) => Err(Error::Timeout(format!(
                "store {} exceeded {:?}",
                operation, self.store_timeout
            ))),
        }
    }

    async fn record_analysis(&self, result: &AnalysisResult) {
        // Baseline results carry no signal and are not kept
        if !result.is_complete() {
            return;
        }
        if let Err(e) = self
            .bounded("append_analysis", self.store.append_analysis(result))
            .await
        {
            warn!(
                poll_id = %result.poll_id,
                agent = %result.agent_type,
                error = %e,
                "Failed to persist analysis"
            );
        }
    }

    /// Vote risk analysis for a poll.
    pub async fn analyze_votes(&self, poll_id: &str) -> Result<AnalysisResult> {
        let votes = self
            .bounded("fetch_votes", self.store.fetch_votes(poll_id))
            .await?;
        let result = self.vote_analyzer.analyze(poll_id, &votes);
        self.record_analysis(&result).await;
        Ok(result)
    }

    /// Economic risk analysis for a poll.
    pub async fn analyze_economics(&self, poll_id: &str) -> Result<AnalysisResult> {
        let proposal = self
            .bounded("fetch_proposal", self.store.fetch_proposal(poll_id))
            .await?;
        let result = self.economic_analyzer.analyze(poll_id, proposal.as_ref());
        self.record_analysis(&result).await;
        Ok(result)
    }

    /// Plain-language explanation of a poll.
    pub async fn explain(&self, poll_id: &str) -> Result<Explanation> {
        let proposal = self
            .bounded("fetch_proposal", self.store.fetch_proposal(poll_id))
            .await?;
        let explanation = self.explainer.explain(poll_id, proposal.as_ref()).await;

        if proposal.is_some() {
            if let Err(e) = self
                .bounded("append_explanation", self.store.append_explanation(&explanation))
                .await
            {
                warn!(poll_id, error = %e, "Failed to persist explanation");
            }
        }
        Ok(explanation)
    }

    /// Run both risk analyzers and combine their scores.
    ///
    /// A failing analyzer is recorded on the result; the call fails only
    /// when neither analyzer could run.
    pub async fn synthesize(&self, poll_id: &str) -> Result<ConsensusResult> {
        let start = Instant::now();

        let vote = self.analyze_votes(poll_id).await;
        let economic = self.analyze_economics(poll_id).await;

        let result = consensus::synthesize(
            poll_id,
            vote,
            economic,
            start.elapsed().as_millis() as u64,
        )?;

        info!(
            poll_id,
            combined_risk_score = result.combined_risk_score.value(),
            verdict = %result.verdict,
            failures = result.failures.len(),
            duration_ms = result.execution_time_ms,
            "Consensus reached"
        );

        if let Err(e) = self
            .bounded("append_consensus", self.store.append_consensus(&result))
            .await
        {
            warn!(poll_id, error = %e, "Failed to persist consensus");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisStatus, Proposal, Vote};
    use crate::council::ConsensusVerdict;
    use crate::explainer::GenerationOutcome;
    use crate::store::MockGovernanceStore;
    use async_trait::async_trait;

    struct EchoGenerator;

    #[async_trait]
    impl TextGenerator for EchoGenerator {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok("explained".into())
        }
    }

    fn council(store: MockGovernanceStore) -> Council {
        Council::with_parts(
            Arc::new(store),
            EconomicRiskAnalyzer::default(),
            ExplainerAgent::new(Arc::new(EchoGenerator)),
            Duration::from_secs(5),
        )
    }

    fn proposal() -> Proposal {
        Proposal::new(
            "p1",
            "Increase staking rewards from 6% to 8%",
            vec!["yes".into(), "no".into()],
        )
    }

    fn old_votes(n: usize) -> Vec<Vote> {
        (0..n)
            .map(|i| Vote::new("p1", format!("w{}", i), "yes", 365, 1.0))
            .collect()
    }

    #[tokio::test]
    async fn test_analyze_votes_persists_complete_result() {
        let mut store = MockGovernanceStore::new();
        store
            .expect_fetch_votes()
            .returning(|_| Ok(old_votes(20)));
        store
            .expect_append_analysis()
            .times(1)
            .returning(|_| Ok(()));

        // 20 equal balances keep the top five at 25% of voting power
        let result = council(store).analyze_votes("p1").await.unwrap();
        assert_eq!(result.status, AnalysisStatus::Complete);
        assert_eq!(result.risk_score.value(), 1);
        assert!(result.flags.is_empty());
    }

    #[tokio::test]
    async fn test_whale_heavy_votes_score_above_baseline() {
        let mut store = MockGovernanceStore::new();
        store
            .expect_fetch_votes()
            .returning(|_| Ok(old_votes(6)));
        store.expect_append_analysis().returning(|_| Ok(()));

        // Top five of six equal wallets hold 83.3%
        let result = council(store).analyze_votes("p1").await.unwrap();
        assert_eq!(result.risk_score.value(), 5);
    }

    #[tokio::test]
    async fn test_no_votes_not_persisted() {
        let mut store = MockGovernanceStore::new();
        store.expect_fetch_votes().returning(|_| Ok(Vec::new()));
        store.expect_append_analysis().times(0);

        let result = council(store).analyze_votes("p1").await.unwrap();
        assert_eq!(result.status, AnalysisStatus::NoVotes);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut store = MockGovernanceStore::new();
        store
            .expect_fetch_votes()
            .returning(|_| Err(Error::Store("connection refused".into())));

        let err = council(store).analyze_votes("p1").await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("store fetch_votes"));
    }

    #[tokio::test]
    async fn test_append_failure_is_not_fatal() {
        let mut store = MockGovernanceStore::new();
        store
            .expect_fetch_proposal()
            .returning(|_| Ok(Some(proposal())));
        store
            .expect_append_analysis()
            .returning(|_| Err(Error::Store("disk full".into())));

        let result = council(store).analyze_economics("p1").await.unwrap();
        assert_eq!(result.risk_score.value(), 1);
    }

    #[tokio::test]
    async fn test_synthesize_survives_vote_store_failure() {
        let mut store = MockGovernanceStore::new();
        store
            .expect_fetch_votes()
            .returning(|_| Err(Error::Store("votes table locked".into())));
        store
            .expect_fetch_proposal()
            .returning(|_| Ok(Some(proposal())));
        store.expect_append_analysis().returning(|_| Ok(()));
        store
            .expect_append_consensus()
            .times(1)
            .returning(|_| Ok(()));

        let result = council(store).synthesize("p1").await.unwrap();
        assert!(result.vote_risk.is_none());
        assert!(result.economic.is_some());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.combined_risk_score.value(), 1);
        assert_eq!(result.verdict, ConsensusVerdict::Approve);
    }

    #[tokio::test]
    async fn test_synthesize_fails_when_store_is_down() {
        let mut store = MockGovernanceStore::new();
        store
            .expect_fetch_votes()
            .returning(|_| Err(Error::Store("down".into())));
        store
            .expect_fetch_proposal()
            .returning(|_| Err(Error::Store("down".into())));
        store.expect_append_consensus().times(0);

        let err = council(store).synthesize("p1").await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_explain_persists_generated_text() {
        let mut store = MockGovernanceStore::new();
        store
            .expect_fetch_proposal()
            .returning(|_| Ok(Some(proposal())));
        store
            .expect_append_explanation()
            .times(1)
            .returning(|_| Ok(()));

        let explanation = council(store).explain("p1").await.unwrap();
        assert_eq!(explanation.outcome.text(), Some("explained"));
    }

    #[tokio::test]
    async fn test_explain_missing_poll() {
        let mut store = MockGovernanceStore::new();
        store.expect_fetch_proposal().returning(|_| Ok(None));
        store.expect_append_explanation().times(0);

        let explanation = council(store).explain("gone").await.unwrap();
        assert_eq!(explanation.outcome, GenerationOutcome::PollNotFound);
    }

    struct SlowStore;

    #[async_trait]
    impl GovernanceStore for SlowStore {
        async fn fetch_proposal(&self, _poll_id: &str) -> Result<Option<Proposal>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
        async fn fetch_votes(&self, _poll_id: &str) -> Result<Vec<Vote>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
        async fn append_analysis(&self, _record: &AnalysisResult) -> Result<()> {
            Ok(())
        }
        async fn append_consensus(&self, _record: &ConsensusResult) -> Result<()> {
            Ok(())
        }
        async fn append_explanation(&self, _record: &Explanation) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let council = Council::with_parts(
            Arc::new(SlowStore),
            EconomicRiskAnalyzer::default(),
            ExplainerAgent::new(Arc::new(EchoGenerator)),
            Duration::from_millis(20),
        );
        let err = council.analyze_votes("p1").await.unwrap_err();
        assert_eq!(err.status_code(), 408);
    }
}
