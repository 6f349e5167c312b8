//! Startup configuration for the travel assistant.

use std::fmt::{self, Display};
use std::str::FromStr;
use std::time::Duration;

use itinera_core::DEFAULT_MAX_TURNS;
use itinera_openai_model::{OpenAIConfig, OpenAIConfigBuilder};
use serde::Serialize;
use thiserror::Error;

/// Which backend answers planner requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// The hosted OpenAI API.
    #[default]
    OpenAI,
    /// A local Ollama server.
    Ollama,
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAI),
            "ollama" => Ok(ProviderKind::Ollama),
            _ => Err(ConfigError::UnknownProvider(s.to_owned())),
        }
    }
}

impl Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::OpenAI => "openai",
            ProviderKind::Ollama => "ollama",
        })
    }
}

/// Errors found while validating a [`Config`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The provider name is not recognised.
    #[error("unknown provider `{0}`, expected `openai` or `ollama`")]
    UnknownProvider(String),
    /// The hosted provider needs a credential.
    #[error("an API key is required for the {0} provider")]
    MissingApiKey(ProviderKind),
    /// Temperature outside `[0, 1]`.
    #[error("temperature must be between 0 and 1, got {0}")]
    InvalidTemperature(f32),
    /// A turn limit of zero.
    #[error("max turns must be at least 1")]
    ZeroTurnLimit,
    /// A zero or unparsable duration.
    #[error("invalid duration `{0}`")]
    InvalidDuration(String),
}

/// Everything needed to start a session, built once at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Backend answering planner requests.
    pub provider: ProviderKind,
    /// Model name; the provider's default when `None`.
    pub model: Option<String>,
    /// Endpoint override.
    pub base_url: Option<String>,
    /// Credential; ignored by Ollama unless set.
    pub api_key: Option<String>,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Maximum planner turns per conversation.
    pub max_turns: usize,
    /// Limit for a single planner reply.
    pub planner_timeout: Option<Duration>,
    /// Limit for a single tool call.
    pub tool_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            base_url: None,
            api_key: None,
            temperature: 0.0,
            max_turns: DEFAULT_MAX_TURNS,
            planner_timeout: None,
            tool_timeout: None,
        }
    }
}

impl Config {
    /// Checks the values that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if self.max_turns == 0 {
            return Err(ConfigError::ZeroTurnLimit);
        }
        let has_api_key = self
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if self.provider == ProviderKind::OpenAI && !has_api_key {
            return Err(ConfigError::MissingApiKey(self.provider));
        }
        let timeouts = [self.planner_timeout, self.tool_timeout];
        for timeout in timeouts.into_iter().flatten() {
            if timeout.is_zero() {
                return Err(ConfigError::InvalidDuration(format!(
                    "{}",
                    humantime::format_duration(timeout)
                )));
            }
        }
        Ok(())
    }

    /// Builds the provider configuration.
    pub fn to_openai_config(&self) -> OpenAIConfig {
        let mut builder = match self.provider {
            ProviderKind::OpenAI => OpenAIConfigBuilder::with_api_key(
                self.api_key.clone().unwrap_or_default(),
            ),
            ProviderKind::Ollama => OpenAIConfigBuilder::ollama(),
        };
        if let (ProviderKind::Ollama, Some(api_key)) =
            (self.provider, &self.api_key)
        {
            builder = builder.api_key(api_key.clone());
        }
        if let Some(model) = &self.model {
            builder = builder.with_model(model.clone());
        }
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url.clone());
        }
        builder.with_temperature(self.temperature).build()
    }
}

/// Parses a human-readable, non-zero duration such as `30s` or `2m`.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    match humantime::parse_duration(input.trim()) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(ConfigError::InvalidDuration(input.to_owned())),
    }
}
