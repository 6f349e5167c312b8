//! The boundary between the conversation loop and whatever decides the next
//! action.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use itinera_model::{
    ErrorKind, ModelMessage, ModelProvider, ModelRequest, ModelTool,
    OpaqueMessage, ToolCallRequest,
};
use thiserror::Error;

use crate::conversation::Transcript;
use crate::model_client::{DeltaFn, ModelClient};

/// The next action chosen by a planner.
#[derive(Clone, Debug, Default)]
pub struct PlannerReply {
    /// Text addressed to the user.
    pub text: String,
    /// Tools to call, in order.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The provider's own form of the reply, replayed verbatim on later
    /// turns when present.
    pub opaque_msg: Option<OpaqueMessage>,
}

impl PlannerReply {
    /// A reply that only contains text.
    #[inline]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Appends a tool call request.
    #[inline]
    pub fn with_tool_call(mut self, request: ToolCallRequest) -> Self {
        self.tool_calls.push(request);
        self
    }

    /// Returns `true` if the planner asked for at least one tool.
    #[inline]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Errors that end a planner turn.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlannerError {
    /// The planner could not produce a reply.
    #[error("planner unavailable ({kind}): {message}")]
    Unavailable {
        /// What kind of provider failure happened.
        kind: ErrorKind,
        /// The provider's message.
        message: String,
    },
    /// The planner did not reply in time.
    #[error("planner did not reply within {0:?}")]
    Timeout(Duration),
}

/// Produces the next action from the conversation so far.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Plans the next step given the transcript and the callable tools.
    async fn plan(
        &self,
        transcript: &Transcript,
        tools: &[ModelTool],
    ) -> Result<PlannerReply, PlannerError>;
}

/// A planner backed by a language model.
#[derive(Clone)]
pub struct ModelPlanner {
    client: ModelClient,
    system_prompt: Option<String>,
    on_delta: Option<DeltaFn>,
}

impl ModelPlanner {
    /// Creates a planner talking to `provider`.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        Self {
            client: ModelClient::new(provider),
            system_prompt: None,
            on_delta: None,
        }
    }

    /// Sends `prompt` ahead of every transcript.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Receives the reply text while it streams in.
    #[inline]
    pub fn on_delta<F>(mut self, f: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.on_delta = Some(Arc::new(f));
        self
    }

    fn build_request(
        &self,
        transcript: &Transcript,
        tools: &[ModelTool],
    ) -> ModelRequest {
        let system = self
            .system_prompt
            .iter()
            .map(|prompt| ModelMessage::System(prompt.clone()));
        let messages = system
            .chain(transcript.iter().map(|msg| msg.model_msg.clone()))
            .collect();
        ModelRequest {
            messages,
            tools: tools.to_vec(),
        }
    }
}

#[async_trait]
impl Planner for ModelPlanner {
    async fn plan(
        &self,
        transcript: &Transcript,
        tools: &[ModelTool],
    ) -> Result<PlannerReply, PlannerError> {
        let req = self.build_request(transcript, tools);
        self.client.complete(req, self.on_delta.clone()).await
    }
}
