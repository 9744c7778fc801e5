//! Configuration management for GovAI services.
//!
//! The council reads a single configuration file at `~/.govai/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (GOVAI_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `GOVAI_HOST` → server.host
//! - `GOVAI_PORT` → server.port
//! - `GOVAI_LOG_LEVEL` → observability.log_level
//! - `GOVAI_LOG_FORMAT` → observability.log_format
//! - `GOVAI_DB_PATH` → store.db_path
//! - `GOVAI_LLM_ENDPOINT` → llm.endpoint
//! - `GOVAI_TREASURY_BALANCE` → economic.treasury_balance
//! - `GOVAI_MONTHLY_STAKED_TOKENS` → economic.monthly_staked_tokens

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".govai"),
        |dirs| dirs.home_dir().join(".govai"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default "127.0.0.1" (local only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS (front-end deployments)
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4480
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to filter down to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Store
// ============================================================================

/// Proposal/vote store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Per-call timeout for store operations (seconds)
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

impl StoreConfig {
    /// Store call timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            timeout_secs: default_store_timeout(),
        }
    }
}

fn default_db_path() -> PathBuf {
    config_dir().join("govai.db")
}

fn default_store_timeout() -> u64 {
    10
}

// ============================================================================
// Text generation (explainer)
// ============================================================================

/// Text-generation service configuration used by the explainer agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the chat endpoint
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Agent name sent with each request
    #[serde(default = "default_llm_agent")]
    pub agent: String,

    /// Request timeout (seconds)
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first failed attempt
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,

    /// Backoff between retries (milliseconds)
    #[serde(default = "default_llm_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            agent: default_llm_agent(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_llm_retries(),
            retry_backoff_ms: default_llm_backoff_ms(),
        }
    }
}

fn default_llm_endpoint() -> String {
    "http://127.0.0.1:4400".into()
}

fn default_llm_agent() -> String {
    "explainer".into()
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_llm_retries() -> u32 {
    2
}

fn default_llm_backoff_ms() -> u64 {
    1000
}

// ============================================================================
// Economic simulation
// ============================================================================

/// Constants used by the treasury-impact simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicConfig {
    /// Monthly staked-token volume the reward rate applies to
    #[serde(default = "default_monthly_staked_tokens")]
    pub monthly_staked_tokens: f64,

    /// Treasury balance available to fund rewards
    #[serde(default = "default_treasury_balance")]
    pub treasury_balance: f64,
}

impl Default for EconomicConfig {
    fn default() -> Self {
        Self {
            monthly_staked_tokens: default_monthly_staked_tokens(),
            treasury_balance: default_treasury_balance(),
        }
    }
}

fn default_monthly_staked_tokens() -> f64 {
    100_000.0
}

fn default_treasury_balance() -> f64 {
    1_000_000.0
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure for GovAI services.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Proposal/vote store
    #[serde(default)]
    pub store: StoreConfig,

    /// Text generation for the explainer agent
    #[serde(default)]
    pub llm: LlmConfig,

    /// Treasury simulation constants
    #[serde(default)]
    pub economic: EconomicConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable numeric values are ignored and the file value is kept.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("GOVAI_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("GOVAI_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(level) = lookup("GOVAI_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("GOVAI_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(path) = lookup("GOVAI_DB_PATH") {
            self.store.db_path = PathBuf::from(path);
        }
        if let Some(endpoint) = lookup("GOVAI_LLM_ENDPOINT") {
            self.llm.endpoint = endpoint;
        }
        if let Some(balance) = lookup("GOVAI_TREASURY_BALANCE").and_then(|v| v.parse().ok()) {
            self.economic.treasury_balance = balance;
        }
        if let Some(volume) = lookup("GOVAI_MONTHLY_STAKED_TOKENS").and_then(|v| v.parse().ok())
        {
            self.economic.monthly_staked_tokens = volume;
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        let dir = config_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create config directory {}", dir.display()))?;
        }

        let path = config_path();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Get the HTTP listen address, e.g. "127.0.0.1:4480".
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
