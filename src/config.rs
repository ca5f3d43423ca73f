//! Engine configuration.

use std::env;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value}")]
    Parse { field: String, value: String },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Engine configuration with validation.
#[derive(Clone, Debug, Validate, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Labels the standard read policy treats as terminal: their outgoing
    /// relations are never followed when compiling composite queries.
    #[validate(length(min = 1, message = "At least one terminal label is required"))]
    pub default_terminal_labels: Vec<String>,

    /// Whether patch/delete trees may only connect or create through the
    /// registry's permitted-relation set.
    pub enforce_permitted_relations: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_terminal_labels: vec!["Clinician".to_string(), "Location".to_string()],
            enforce_permitted_relations: true,
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables with validation.
    ///
    /// `CAREGRAPH_TERMINAL_LABELS` is a comma-separated label list.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = EngineConfig::default();
        let terminal_labels = match env::var("CAREGRAPH_TERMINAL_LABELS") {
            Ok(raw) => raw
                .split(',')
                .map(|label| label.trim().to_string())
                .filter(|label| !label.is_empty())
                .collect(),
            Err(_) => defaults.default_terminal_labels,
        };
        let config = Self {
            default_terminal_labels: terminal_labels,
            enforce_permitted_relations: parse_env_var(
                "CAREGRAPH_ENFORCE_PERMITTED_RELATIONS",
                "true",
            )?,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|_| ConfigError::Parse {
        field: key.to_string(),
        value,
    })
}

lazy_static! {
    static ref PROCESS_CONFIG: EngineConfig = EngineConfig::from_env().unwrap_or_else(|e| {
        log::warn!("Invalid caregraph environment configuration, using defaults: {e}");
        EngineConfig::default()
    });
}

/// The process-wide default terminal labels (environment-driven, falling back
/// to Clinician and Location).
pub fn default_terminal_labels() -> &'static [String] {
    &PROCESS_CONFIG.default_terminal_labels
}

/// Whether patch/delete trees may only connect or create through the
/// registry's permitted-relation set.
pub fn enforce_permitted_relations() -> bool {
    PROCESS_CONFIG.enforce_permitted_relations
}
