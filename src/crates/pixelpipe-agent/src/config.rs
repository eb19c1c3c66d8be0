//! Pipeline configuration.
//!
//! Defaults target a local Ollama server running `qwen3-vl:8b` with
//! temperature 0, which keeps structured output stable. Every value can be
//! overridden through `PIXELPIPE_*` environment variables:
//!
//! | Variable | Field | Default |
//! |----------|-------|---------|
//! | `PIXELPIPE_OLLAMA_URL` | `ollama_url` | `http://localhost:11434` |
//! | `PIXELPIPE_MODEL` | `model` | `qwen3-vl:8b` |
//! | `PIXELPIPE_TEMPERATURE` | `temperature` | `0.0` |
//! | `PIXELPIPE_REQUEST_TIMEOUT_SECS` | `request_timeout` | `120` |
//! | `PIXELPIPE_STEP_TIMEOUT_SECS` | `step_timeout` | none |

use crate::error::{AgentError, Result};
use pixelpipe_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen3-vl:8b";

const ENV_OLLAMA_URL: &str = "PIXELPIPE_OLLAMA_URL";
const ENV_MODEL: &str = "PIXELPIPE_MODEL";
const ENV_TEMPERATURE: &str = "PIXELPIPE_TEMPERATURE";
const ENV_REQUEST_TIMEOUT: &str = "PIXELPIPE_REQUEST_TIMEOUT_SECS";
const ENV_STEP_TIMEOUT: &str = "PIXELPIPE_STEP_TIMEOUT_SECS";

/// Settings for the vision model and the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the Ollama server.
    pub ollama_url: String,

    /// Vision model used for classification and extraction.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// HTTP timeout per model request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Upper bound on one step, including collaborator calls.
    #[serde(default)]
    pub step_timeout: Option<Duration>,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            request_timeout: default_request_timeout(),
            step_timeout: None,
        }
    }
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `PIXELPIPE_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = get_env(ENV_OLLAMA_URL)? {
            config.ollama_url = url;
        }
        if let Some(model) = get_env(ENV_MODEL)? {
            config.model = model;
        }
        if let Some(temperature) = get_env_parse(ENV_TEMPERATURE)? {
            config.temperature = temperature;
        }
        if let Some(secs) = get_env_parse(ENV_REQUEST_TIMEOUT)? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = get_env_parse(ENV_STEP_TIMEOUT)? {
            config.step_timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn with_ollama_url(mut self, url: impl Into<String>) -> Self {
        self.ollama_url = url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ollama_url.trim().is_empty() {
            return Err(AgentError::Config("ollama_url must not be empty".to_string()));
        }
        if !self.ollama_url.starts_with("http://") && !self.ollama_url.starts_with("https://") {
            return Err(AgentError::Config(format!(
                "ollama_url must be an http(s) URL, got '{}'",
                self.ollama_url
            )));
        }
        if self.model.trim().is_empty() {
            return Err(AgentError::Config("model must not be empty".to_string()));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(AgentError::Config(format!(
                "temperature must be a non-negative number, got {}",
                self.temperature
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(AgentError::Config("request_timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        match self.step_timeout {
            Some(timeout) => EngineConfig::new().with_step_timeout(timeout),
            None => EngineConfig::new(),
        }
    }
}

fn get_env(key: &str) -> Result<Option<String>> {
    match env::var(key) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(AgentError::Config(format!(
            "Environment variable {key} contains invalid UTF-8"
        ))),
    }
}

fn get_env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get_env(key)? {
        Some(value) => value.trim().parse::<T>().map(Some).map_err(|e| {
            AgentError::Config(format!("Failed to parse environment variable {key}: {e}"))
        }),
        None => Ok(None),
    }
}
