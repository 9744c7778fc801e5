//! Explainer agent and its text-generation bridge.
//!
//! Unlike the risk analyzers, the explainer depends on an external service.
//! Generation failures never fail the request: they come back as a tagged
//! [`GenerationOutcome::Failed`] so callers can branch on them.

pub mod agent;
pub mod bridge;

pub use agent::{build_prompt, ExplainerAgent, Explanation, GenerationOutcome};
pub use bridge::{LlmBridge, LlmBridgeConfig, TextGenerator};
