//! A model provider for OpenAI-compatible chat-completions APIs.
//!
//! The same provider talks to the hosted OpenAI API and to local servers
//! exposing the compatible endpoint, such as Ollama. Pick the preset with
//! [`OpenAIConfigBuilder::with_api_key`] or [`OpenAIConfigBuilder::ollama`].

#[macro_use]
extern crate tracing;

mod config;
mod io;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use itinera_model::{
    ErrorKind, ModelProvider, ModelProviderError, ModelRequest,
};
use mime::Mime;
use reqwest::{Client, Response, StatusCode, header};

pub use config::*;
use io::{Chunks, Sse};
use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = match err.status() {
            Some(status) => error_kind_for_status(status),
            None if err.is_connect() || err.is_timeout() => {
                ErrorKind::Unavailable
            }
            None => ErrorKind::Other,
        };
        Error::new(format!("{err}"), kind)
    }
}

fn error_kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimitExceeded,
        StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => ErrorKind::Unavailable,
        status if status.is_server_error() => ErrorKind::Unavailable,
        _ => ErrorKind::Other,
    }
}

/// OpenAI-compatible model provider.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Returns the configuration of this provider.
    #[inline]
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let openai_req = proto::create_request(req, &self.config);
        let url = format!("{}/chat/completions", self.config.base_url);
        debug!(model = %self.config.model, %url, "sending chat completion");
        let resp_fut = self
            .client
            .post(url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
            .json(&openai_req)
            .send();

        async move {
            let resp = resp_fut.await.and_then(Response::error_for_status)?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_valid_content_type = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| m.subtype().as_str() == "event-stream")
                .unwrap_or(false);
            if !is_valid_content_type {
                return Err(Error::new(
                    format!("Unexpected content type: {content_type:?}"),
                    ErrorKind::Other,
                ));
            }

            // Here we got a successful response.
            let chunks = Chunks::from_response(resp);
            let sse = Sse::new(chunks);
            Ok(OpenAIResponse::from_sse(sse))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_for_status() {
        assert_eq!(
            error_kind_for_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorKind::RateLimitExceeded
        );
        assert_eq!(
            error_kind_for_status(StatusCode::SERVICE_UNAVAILABLE),
            ErrorKind::Unavailable
        );
        assert_eq!(
            error_kind_for_status(StatusCode::INTERNAL_SERVER_ERROR),
            ErrorKind::Unavailable
        );
        assert_eq!(
            error_kind_for_status(StatusCode::UNAUTHORIZED),
            ErrorKind::Other
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Nothing listens on the discard port, so the connection is refused.
        let config = OpenAIConfigBuilder::ollama()
            .with_base_url("http://127.0.0.1:9/v1")
            .build();
        let provider = OpenAIProvider::new(config);
        let req = ModelRequest {
            messages: vec![],
            tools: vec![],
        };
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
}
