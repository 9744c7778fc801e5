//! HTTP routes for the council service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use govai_common::Error;

use crate::analysis::{AgentType, AnalysisResult, FinancialParameters, Proposal, Vote};
use crate::council::{AgentFailure, ConsensusResult};
use crate::explainer::Explanation;
use crate::store::{AnalysisRecord, GovernanceStore, VoteAction, VoteStats};
use crate::CouncilState;

// ============================================================================
// Errors
// ============================================================================

/// Error rendered as `{"success": false, "error": message}`.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = serde_json::json!({
            "success": false,
            "error": self.0.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

/// Which agents an analyze request should run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzeTarget {
    Explainer,
    #[serde(alias = "whale-watch")]
    WhaleWatch,
    Economic,
    #[default]
    All,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub poll_id: String,
    #[serde(default)]
    pub agent_type: AnalyzeTarget,
}

#[derive(Debug, Default, Serialize)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub poll_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explainer: Option<Explanation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whale_watch: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub economic: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus: Option<ConsensusResult>,
    /// Agents that could not run; their sections are omitted
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<AgentFailure>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub poll_id: String,
    pub wallet_address: String,
    pub vote_option: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub wallet_age_days: Option<u32>,
    #[serde(default)]
    pub sol_balance: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub success: bool,
    #[serde(flatten)]
    pub action: VoteAction,
    pub analysis: AnalysisResult,
}

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    #[serde(default)]
    pub poll_id: Option<String>,
    pub question: String,
    #[serde(default)]
    pub description: Option<String>,
    pub options: Vec<String>,
    #[serde(default)]
    pub financials: Option<FinancialParameters>,
}

#[derive(Debug, Serialize)]
pub struct PollsResponse {
    pub polls: Vec<Proposal>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct PollDetailResponse {
    pub poll: Proposal,
    pub vote_stats: VoteStats,
    pub analyses: Vec<AnalysisRecord>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "govai-council".to_string(),
    })
}

/// Run one agent, or every agent plus consensus.
pub async fn analyze(
    State(state): State<Arc<CouncilState>>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<AnalyzeResponse> {
    let poll_id = request.poll_id.trim();
    if poll_id.is_empty() {
        return Err(Error::InvalidInput("poll_id is required".into()).into());
    }

    let mut response = AnalyzeResponse {
        success: true,
        poll_id: poll_id.to_string(),
        ..Default::default()
    };

    match request.agent_type {
        AnalyzeTarget::Explainer => {
            response.explainer = Some(state.council.explain(poll_id).await?);
        }
        AnalyzeTarget::WhaleWatch => {
            response.whale_watch = Some(state.council.analyze_votes(poll_id).await?);
        }
        AnalyzeTarget::Economic => {
            response.economic = Some(state.council.analyze_economics(poll_id).await?);
        }
        AnalyzeTarget::All => {
            let consensus = state.council.synthesize(poll_id).await?;
            response.whale_watch = consensus.vote_risk.clone();
            response.economic = consensus.economic.clone();
            response.failures = consensus.failures.clone();

            match state.council.explain(poll_id).await {
                Ok(explanation) => response.explainer = Some(explanation),
                Err(e) => {
                    tracing::warn!(poll_id, error = %e, "Explainer unavailable");
                    response.failures.push(AgentFailure {
                        agent_type: AgentType::Explainer,
                        reason: e.to_string(),
                    });
                }
            }
            response.consensus = Some(consensus);
        }
    }

    Ok(Json(response))
}

/// Record or change a vote, then re-run vote risk analysis.
pub async fn submit_vote(
    State(state): State<Arc<CouncilState>>,
    Json(request): Json<VoteRequest>,
) -> ApiResult<VoteResponse> {
    if request.wallet_address.trim().is_empty() {
        return Err(Error::InvalidInput("wallet_address is required".into()).into());
    }

    let poll = state
        .store
        .fetch_proposal(&request.poll_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Poll {}", request.poll_id)))?;

    if !poll.options.contains(&request.vote_option) {
        return Err(Error::InvalidInput(format!(
            "'{}' is not an option of poll {}",
            request.vote_option, request.poll_id
        ))
        .into());
    }

    let vote = Vote {
        poll_id: request.poll_id,
        wallet_address: request.wallet_address,
        vote_option: request.vote_option,
        signature: request.signature,
        wallet_age_days: request.wallet_age_days,
        sol_balance: request.sol_balance,
    };
    let action = state.store.record_vote(&vote).await?;
    tracing::info!(poll_id = %vote.poll_id, action = ?action, "Vote accepted");

    let analysis = state.council.analyze_votes(&vote.poll_id).await?;

    Ok(Json(VoteResponse {
        success: true,
        action,
        analysis,
    }))
}

/// List all polls.
pub async fn list_polls(State(state): State<Arc<CouncilState>>) -> ApiResult<PollsResponse> {
    let polls = state.store.list_proposals().await?;
    let count = polls.len();
    Ok(Json(PollsResponse { polls, count }))
}

/// Register a new poll.
pub async fn create_poll(
    State(state): State<Arc<CouncilState>>,
    Json(request): Json<CreatePollRequest>,
) -> Result<(StatusCode, Json<Proposal>), ApiError> {
    if request.question.trim().is_empty() {
        return Err(Error::InvalidInput("question is required".into()).into());
    }
    let options: Vec<String> = request
        .options
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if options.len() < 2 {
        return Err(Error::InvalidInput("at least two options are required".into()).into());
    }

    let poll_id = request
        .poll_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let proposal = Proposal {
        poll_id,
        question: request.question,
        description: request.description,
        options,
        financials: request.financials,
    };
    state.store.save_proposal(&proposal).await?;
    tracing::info!(poll_id = %proposal.poll_id, "Poll created");

    Ok((StatusCode::CREATED, Json(proposal)))
}

/// Poll with vote stats and analysis history.
pub async fn get_poll(
    State(state): State<Arc<CouncilState>>,
    Path(poll_id): Path<String>,
) -> ApiResult<PollDetailResponse> {
    let poll = state
        .store
        .fetch_proposal(&poll_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Poll {}", poll_id)))?;
    let vote_stats = state.store.vote_stats(&poll_id).await?;
    let analyses = state.store.list_analyses(&poll_id).await?;

    Ok(Json(PollDetailResponse {
        poll,
        vote_stats,
        analyses,
    }))
}
