//! GovAI Council Library
//!
//! A council of agents that assesses governance proposals before voters act
//! on them. Each agent scores one concern and the council combines them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    govai-council (Rust Service)                     │
//! │                               :4480                                  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐     │
//! │  │  HTTP API       │  │  Council        │  │  SQLite Store   │     │
//! │  │  (axum)         │─▶│  (analyzers)    │─▶│  (history)      │     │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Agents
//!
//! - **Whale watch**: sybil and whale-concentration risk in the vote set
//! - **Economic**: treasury and tokenomics risk from the proposal text
//! - **Explainer**: plain-language summary from an external text generator
//!
//! Risk scores are integers in `[1, 10]`; 1 means "no signal", never "no risk".

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analysis;
pub mod council;
pub mod explainer;
pub mod routes;
pub mod store;

use anyhow::Result;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use govai_common::Config;

use crate::council::Council;
use crate::explainer::{LlmBridge, LlmBridgeConfig, TextGenerator};
use crate::store::SqliteStore;

/// Council service state
pub struct CouncilState {
    /// Configuration
    pub config: Config,
    /// Proposal and vote store
    pub store: Arc<SqliteStore>,
    /// Agent council
    pub council: Arc<Council>,
}

impl CouncilState {
    /// Assemble state around an opened store and a text generator.
    pub fn new(config: Config, store: Arc<SqliteStore>, generator: Arc<dyn TextGenerator>) -> Self {
        let council = Arc::new(Council::new(store.clone(), generator, &config));
        Self {
            config,
            store,
            council,
        }
    }
}

/// Open the configured store and wire up the council.
pub fn create_state(config: Config) -> Result<Arc<CouncilState>> {
    let store = Arc::new(SqliteStore::from_config(&config.store)?);
    let generator: Arc<dyn TextGenerator> =
        Arc::new(LlmBridge::new(LlmBridgeConfig::from(&config.llm)));
    Ok(Arc::new(CouncilState::new(config, store, generator)))
}

/// Build the HTTP router.
pub fn build_router(state: Arc<CouncilState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/analyze", post(routes::analyze))
        .route("/api/vote", post(routes::submit_vote))
        .route("/api/polls", get(routes::list_polls).post(routes::create_poll))
        .route("/api/polls/:poll_id", get(routes::get_poll))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .server
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    if config.server.allowed_origins.iter().any(|o| o == "*") || origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Main council service
pub struct CouncilService {
    state: Arc<CouncilState>,
}

impl CouncilService {
    /// Create a new council service
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            state: create_state(config)?,
        })
    }

    pub fn state(&self) -> &Arc<CouncilState> {
        &self.state
    }

    /// Start the HTTP server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self.state.config.server_address().parse()?;
        let app = build_router(self.state.clone()).layer(cors_layer(&self.state.config));

        tracing::info!(address = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}
