//! Configuration validation for GovAI services.
//!
//! Ensures required values are present and within valid ranges before the
//! council starts serving requests.

use thiserror::Error;

use crate::config::{
    Config, EconomicConfig, LlmConfig, ObservabilityConfig, ServerConfig, StoreConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port}: must be between 1 and 65535")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["json", "pretty"];

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let results = [
            self.server.validate(),
            self.observability.validate(),
            self.store.validate(),
            self.llm.validate(),
            self.economic.validate(),
        ];

        let mut errors: Vec<ValidationError> =
            results.into_iter().filter_map(Result::err).collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }

    /// Load, apply env overrides, and validate configuration.
    pub fn load_and_validate(path: Option<&std::path::Path>) -> anyhow::Result<Self> {
        let config = Self::load_with_env(path)?;
        config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(config)
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".into(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "server.host".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        // RUST_LOG-style directives ("info,govai_council=debug") start with the base level
        let base = self.log_level.split(',').next().unwrap_or_default();
        if !LOG_LEVELS.contains(&base.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of {:?}", LOG_LEVELS),
            });
        }
        if !LOG_FORMATS.contains(&self.log_format.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of {:?}", LOG_FORMATS),
            });
        }
        Ok(())
    }
}

impl Validate for StoreConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ValidationError::MissingField {
                field: "store.db_path".into(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "store.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Validate for LlmConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.endpoint.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "llm.endpoint".into(),
            });
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ValidationError::InvalidValue {
                field: "llm.endpoint".into(),
                reason: "must be an http(s) URL".into(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidValue {
                field: "llm.timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

impl Validate for EconomicConfig {
    fn validate(&self) -> ValidationResult<()> {
        if !self.treasury_balance.is_finite() || self.treasury_balance < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "economic.treasury_balance".into(),
                reason: "must be a non-negative number".into(),
            });
        }
        if !self.monthly_staked_tokens.is_finite() || self.monthly_staked_tokens < 0.0 {
            return Err(ValidationError::InvalidValue {
                field: "economic.monthly_staked_tokens".into(),
                reason: "must be a non-negative number".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidPort { port: 0, .. })
        ));
    }

    #[test]
    fn test_negative_treasury_rejected() {
        let economic = EconomicConfig {
            treasury_balance: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            economic.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_log_level_with_directives_accepted() {
        let observability = ObservabilityConfig {
            log_level: "info,govai_council=debug".into(),
            ..Default::default()
        };
        assert!(observability.validate().is_ok());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let observability = ObservabilityConfig {
            log_format: "xml".into(),
            ..Default::default()
        };
        assert!(observability.validate().is_err());
    }

    #[test]
    fn test_llm_endpoint_must_be_http() {
        let llm = LlmConfig {
            endpoint: "ftp://llm".into(),
            ..Default::default()
        };
        assert!(llm.validate().is_err());
    }

    #[test]
    fn test_multiple_errors_aggregated() {
        let mut config = Config::default();
        config.server.port = 0;
        config.store.timeout_secs = 0;
        config.economic.monthly_staked_tokens = f64::NAN;

        match config.validate() {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected multiple errors, got {:?}", other),
        }
    }
}
