use std::fmt::{self, Debug};

/// Default endpoint of the hosted OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default model for the hosted OpenAI API.
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Default endpoint of a local Ollama server.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
/// Default model for a local Ollama server.
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3.2";

/// Builder for [`OpenAIConfig`].
#[derive(Clone, PartialEq)]
pub struct OpenAIConfigBuilder {
    api_key: String,
    model: Option<String>,
    base_url: Option<String>,
    default_model: &'static str,
    default_base_url: &'static str,
    temperature: Option<f32>,
}

impl OpenAIConfigBuilder {
    /// Creates a builder for the hosted OpenAI API with the given API key.
    #[inline]
    pub fn with_api_key<S: Into<String>>(api_key: S) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
            default_model: OPENAI_DEFAULT_MODEL,
            default_base_url: OPENAI_BASE_URL,
            temperature: None,
        }
    }

    /// Creates a builder for a local Ollama server.
    ///
    /// Ollama ignores the credential, but the endpoint still expects the
    /// header to be present.
    #[inline]
    pub fn ollama() -> Self {
        Self {
            api_key: "ollama".to_owned(),
            model: None,
            base_url: None,
            default_model: OLLAMA_DEFAULT_MODEL,
            default_base_url: OLLAMA_BASE_URL,
            temperature: None,
        }
    }

    /// Overrides the API key.
    #[inline]
    pub fn api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Sets the model to use.
    #[inline]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets a custom base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the sampling temperature. Values are clamped to `[0, 1]`.
    #[inline]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> OpenAIConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| self.default_base_url.to_owned());
        OpenAIConfig {
            api_key: self.api_key,
            model: self.model.unwrap_or_else(|| self.default_model.to_owned()),
            base_url: base_url.trim_end_matches('/').to_owned(),
            temperature: self.temperature,
        }
    }
}

impl Debug for OpenAIConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfigBuilder")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Configuration for the OpenAI-compatible provider.
#[derive(Clone, PartialEq)]
pub struct OpenAIConfig {
    pub(crate) api_key: String,
    pub(crate) model: String,
    pub(crate) base_url: String,
    pub(crate) temperature: Option<f32>,
}

impl OpenAIConfig {
    /// Returns the model name sent with every request.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Returns the endpoint, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the sampling temperature, if one is set.
    #[inline]
    pub fn temperature(&self) -> Option<f32> {
        self.temperature
    }
}

impl Debug for OpenAIConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OpenAIConfigBuilder::with_api_key("sk-test").build();
        assert_eq!(config.model(), OPENAI_DEFAULT_MODEL);
        assert_eq!(config.base_url(), OPENAI_BASE_URL);
        assert_eq!(config.temperature(), None);

        let config = OpenAIConfigBuilder::ollama()
            .with_base_url("http://127.0.0.1:11434/v1/")
            .with_temperature(1.5)
            .build();
        assert_eq!(config.model(), OLLAMA_DEFAULT_MODEL);
        assert_eq!(config.base_url(), "http://127.0.0.1:11434/v1");
        assert_eq!(config.temperature(), Some(1.0));
        assert_eq!(config.api_key, "ollama");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = OpenAIConfigBuilder::with_api_key("sk-secret").build();
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
