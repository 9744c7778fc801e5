//! The agent council.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Council                              │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                               │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌──────────────┐  │
//! │  │  Vote Risk      │  │  Economic Risk  │  │  Explainer   │  │
//! │  │  (whale watch)  │  │  (treasury sim) │  │  (LLM bridge)│  │
//! │  └────────┬────────┘  └────────┬────────┘  └──────────────┘  │
//! │           │                    │                              │
//! │           └─────────┬──────────┘                              │
//! │                     ▼                                         │
//! │            ┌─────────────────┐                                │
//! │            │ ConsensusResult │  60% vote / 40% economic       │
//! │            └─────────────────┘                                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Consensus Bands
//!
//! | Combined score | Verdict |
//! |----------------|---------|
//! | >= 8 | REJECT |
//! | >= 6 | DELAY |
//! | >= 3 | APPROVE WITH CAUTION |
//! | < 3 | APPROVE |

pub mod consensus;
pub mod orchestrator;
pub mod types;

pub use orchestrator::Council;
pub use types::{AgentFailure, ConsensusResult, ConsensusVerdict};
