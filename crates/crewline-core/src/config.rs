//! Runtime configuration: backend connection settings, generation defaults
//! and `${ENV_VAR}` expansion for definition files.

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{CrewError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

static ENV_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env reference pattern is valid"));

/// Connection settings for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// API base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Model ID
    pub model: String,
    /// Per-request timeout; the only cancellation point of a workflow run
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    /// Build a config from `OPENAI_API_KEY`, `OPENAI_BASE_URL`,
    /// `CREWLINE_MODEL` and `CREWLINE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let timeout_secs = match std::env::var("CREWLINE_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|e| {
                CrewError::invalid_config(format!("CREWLINE_TIMEOUT_SECS='{}': {}", raw, e))
            })?,
            Err(_) => defaults.timeout_secs,
        };

        Ok(Self {
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            model: std::env::var("CREWLINE_MODEL").unwrap_or(defaults.model),
            timeout_secs,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(CrewError::invalid_config(
                "No API key found. Set OPENAI_API_KEY or pass --api-key.",
            ));
        }
        if self.model.trim().is_empty() {
            return Err(CrewError::invalid_config("model must not be empty"));
        }
        if self.timeout_secs == 0 {
            return Err(CrewError::invalid_config("timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// Values used when a task leaves a generation parameter unset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    pub temperature: f64,
    pub max_output_tokens: Option<u32>,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: None,
        }
    }
}

/// Per-task generation overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default, rename = "max_tokens")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationParameters {
    /// Fill unset values from `defaults`.
    pub fn resolve(&self, defaults: &GenerationDefaults) -> (f64, Option<u32>) {
        (
            self.temperature.unwrap_or(defaults.temperature),
            self.max_output_tokens.or(defaults.max_output_tokens),
        )
    }
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}`; unresolved references
/// are left as written.
pub fn resolve_env_vars(input: &str) -> String {
    ENV_REF_RE
        .replace_all(input, |caps: &Captures| {
            let expr = &caps[1];
            match expr.split_once(":-") {
                Some((name, default)) => {
                    std::env::var(name).unwrap_or_else(|_| default.to_string())
                }
                None => std::env::var(expr).unwrap_or_else(|_| caps[0].to_string()),
            }
        })
        .into_owned()
}
