//! Explainer agent: plain-language summaries of proposals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::bridge::TextGenerator;
use crate::analysis::{AgentType, Proposal};

/// Result of asking the text generator for an explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// Generator returned text
    Generated { text: String },
    /// Generator was unreachable or returned an error
    Failed { reason: String },
    /// The proposal could not be located
    PollNotFound,
}

impl GenerationOutcome {
    /// Short tag stored alongside the record.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationOutcome::Generated { .. } => "generated",
            GenerationOutcome::Failed { .. } => "failed",
            GenerationOutcome::PollNotFound => "poll_not_found",
        }
    }

    /// Generated text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Generated { text } => Some(text),
            _ => None,
        }
    }
}

/// One explainer run for one poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub id: Uuid,
    pub poll_id: String,
    pub agent_type: AgentType,
    pub outcome: GenerationOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_question: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

/// Build the explanation prompt for a proposal.
pub fn build_prompt(proposal: &Proposal) -> String {
    format!(
        "Explain this blockchain governance vote in simple language:

Question: {}
Description: {}
Options: {}

Write 3 sections:
1. What this vote is about (2 sentences)
2. What each option means for voters
3. Why this matters

Keep it under 150 words total.",
        proposal.question,
        proposal.description.as_deref().unwrap_or_default(),
        proposal.options.join(", ")
    )
}

/// Explainer agent over any text generator.
pub struct ExplainerAgent {
    generator: Arc<dyn TextGenerator>,
}

impl ExplainerAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Explain a proposal. Generation failures are captured, never raised.
    pub async fn explain(&self, poll_id: &str, proposal: Option<&Proposal>) -> Explanation {
        let start = Instant::now();

        let Some(proposal) = proposal else {
            debug!(poll_id, "Poll not found, skipping explanation");
            return Explanation {
                id: Uuid::new_v4(),
                poll_id: poll_id.to_string(),
                agent_type: AgentType::Explainer,
                outcome: GenerationOutcome::PollNotFound,
                poll_question: None,
                options: Vec::new(),
                analyzed_at: Utc::now(),
                execution_time_ms: start.elapsed().as_millis() as u64,
            };
        };

        let prompt = build_prompt(proposal);
        let outcome = match self.generator.generate(&prompt).await {
            Ok(text) => GenerationOutcome::Generated { text },
            Err(e) => {
                warn!(poll_id, error = %e, "Explanation generation failed");
                GenerationOutcome::Failed {
                    reason: format!("{:#}", e),
                }
            }
        };

        let execution_time_ms = start.elapsed().as_millis() as u64;
        info!(
            poll_id,
            outcome = outcome.kind(),
            duration_ms = execution_time_ms,
            "Explanation complete"
        );

        Explanation {
            id: Uuid::new_v4(),
            poll_id: poll_id.to_string(),
            agent_type: AgentType::Explainer,
            outcome,
            poll_question: Some(proposal.question.clone()),
            options: proposal.options.clone(),
            analyzed_at: Utc::now(),
            execution_time_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedGenerator(Option<&'static str>);

    #[async_trait]
    impl TextGenerator for FixedGenerator {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            assert!(prompt.contains("Keep it under 150 words total."));
            match self.0 {
                Some(text) => Ok(text.to_string()),
                None => Err(anyhow::anyhow!("connection refused")),
            }
        }
    }

    fn proposal() -> Proposal {
        Proposal::new("p1", "Fund the grants program?", vec!["yes".into(), "no".into()])
            .with_description("Allocates 50k to community grants")
    }

    #[test]
    fn test_prompt_sections() {
        let prompt = build_prompt(&proposal());
        assert!(prompt.contains("Question: Fund the grants program?"));
        assert!(prompt.contains("Description: Allocates 50k to community grants"));
        assert!(prompt.contains("Options: yes, no"));
        assert!(prompt.contains("1. What this vote is about"));
        assert!(prompt.contains("2. What each option means for voters"));
        assert!(prompt.contains("3. Why this matters"));
    }

    #[tokio::test]
    async fn test_generated_outcome() {
        let agent = ExplainerAgent::new(Arc::new(FixedGenerator(Some("Plain words."))));
        let explanation = agent.explain("p1", Some(&proposal())).await;
        assert_eq!(explanation.outcome.text(), Some("Plain words."));
        assert_eq!(explanation.options, vec!["yes", "no"]);
        assert_eq!(explanation.agent_type, AgentType::Explainer);
    }

    #[tokio::test]
    async fn test_failure_is_tagged_not_raised() {
        let agent = ExplainerAgent::new(Arc::new(FixedGenerator(None)));
        let explanation = agent.explain("p1", Some(&proposal())).await;
        assert_eq!(
            explanation.outcome,
            GenerationOutcome::Failed {
                reason: "connection refused".into()
            }
        );
        assert_eq!(explanation.outcome.kind(), "failed");
    }

    #[tokio::test]
    async fn test_missing_poll() {
        let agent = ExplainerAgent::new(Arc::new(FixedGenerator(Some("unused"))));
        let explanation = agent.explain("gone", None).await;
        assert_eq!(explanation.outcome, GenerationOutcome::PollNotFound);
        assert!(explanation.poll_question.is_none());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(GenerationOutcome::Failed {
            reason: "timeout".into(),
        })
        .unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "timeout");
    }
}
