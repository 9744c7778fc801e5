//! GovAI Council - risk assessment service for governance proposals.
//!
//! Runs the HTTP API by default, or a one-shot analysis from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use govai_common::logging::init_logging;
use govai_common::Config;
use govai_council::{create_state, CouncilService};

#[derive(Parser, Debug)]
#[command(name = "govai-council")]
#[command(version)]
#[command(about = "Agent council for governance proposal risk.", long_about = None)]
struct Cli {
    /// Path to a config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API
    Serve,
    /// Analyze one poll and print the result as JSON
    Analyze {
        /// Poll identifier
        poll_id: String,
        /// Agent to run
        #[arg(long, value_enum, default_value_t = AgentChoice::All)]
        agent: AgentChoice,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum AgentChoice {
    WhaleWatch,
    Economic,
    Explainer,
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();
    let cli = Cli::parse();

    let config = Config::load_and_validate(cli.config.as_deref())?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!("GovAI Council v{}", env!("CARGO_PKG_VERSION"));

            let service = CouncilService::new(config)?;

            let startup_duration = startup_start.elapsed();
            tracing::info!(
                duration_ms = startup_duration.as_millis() as u64,
                "Service initialized in {:?}",
                startup_duration
            );

            service.start().await
        }
        Commands::Analyze { poll_id, agent } => run_analysis(config, &poll_id, agent).await,
    }
}

async fn run_analysis(config: Config, poll_id: &str, agent: AgentChoice) -> Result<()> {
    let state = create_state(config)?;
    let council = &state.council;

    match agent {
        AgentChoice::WhaleWatch => {
            let result = council.analyze_votes(poll_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        AgentChoice::Economic => {
            let result = council.analyze_economics(poll_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        AgentChoice::Explainer => {
            let explanation = council.explain(poll_id).await?;
            println!("{}", serde_json::to_string_pretty(&explanation)?);
        }
        AgentChoice::All => {
            let consensus = council.synthesize(poll_id).await?;
            println!("{}", serde_json::to_string_pretty(&consensus)?);
            eprintln!("\n{}", consensus.agent_deliberation);
            eprintln!("\n{}", consensus.consensus_recommendation);
        }
    }

    Ok(())
}
