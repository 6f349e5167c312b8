//! A local fake model for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use itinera_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    OpaqueMessage,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    step_idx: usize,
    events: Vec<ModelResponseEvent>,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl TestModelResponse {
    fn new(step_idx: usize, preset: &PresetResponse, delay: Duration) -> Self {
        let mut events: Vec<_> = preset
            .events
            .iter()
            .map(|event| match event {
                PresetEvent::MessageDelta(msg) => {
                    ModelResponseEvent::MessageDelta(msg.clone())
                }
                PresetEvent::ToolCall(req) => {
                    ModelResponseEvent::ToolCall(req.clone())
                }
            })
            .collect();
        events.push(ModelResponseEvent::Completed(if preset.has_tool_call() {
            ModelFinishReason::ToolCalls
        } else {
            ModelFinishReason::Stop
        }));
        Self {
            step_idx,
            events,
            event_idx: 0,
            delay,
            sleep: None,
        }
    }
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if this.event_idx >= this.events.len() {
            // In case this method is called after completion.
            return Poll::Ready(Ok(None));
        }

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            let event = this.events[this.event_idx].clone();
            this.event_idx += 1;
            return Poll::Ready(Ok(Some(event)));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        let id = format!("msg:{}", self.step_idx);
        Some(OpaqueMessage::new(id.clone(), id))
    }
}

#[derive(Clone)]
enum ConversationStep {
    UserInput,
    AssistantResponse(PresetResponse),
    ToolOutput,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The step is selected by
/// the number of non-system messages in the request: the first step matches
/// the user's opening message, and every planner reply and tool result
/// occupies one more step. If the script runs out, the fallback response is
/// used when one is set, otherwise an error is returned.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    conversation_script: Vec<ConversationStep>,
    fallback: Option<PresetResponse>,
    delay: Option<Duration>,
    attempts: Arc<Mutex<HashMap<usize, u64>>>,
    requests_sent: Arc<AtomicUsize>,
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.conversation_script
            .push(ConversationStep::AssistantResponse(preset));
    }

    #[inline]
    pub fn add_user_input_step(&mut self) {
        self.conversation_script.push(ConversationStep::UserInput);
    }

    /// Adds a step for each tool result the loop appends.
    #[inline]
    pub fn add_tool_output_step(&mut self) {
        self.conversation_script.push(ConversationStep::ToolOutput);
    }

    /// Sets the response used once the script has been exhausted.
    #[inline]
    pub fn set_fallback_response(&mut self, preset: PresetResponse) {
        self.fallback = Some(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns how many requests have been sent to this provider and all of
    /// its clones.
    #[inline]
    pub fn requests_sent(&self) -> usize {
        self.requests_sent.load(Ordering::SeqCst)
    }

    fn select_response(
        &self,
        step_idx: usize,
    ) -> Result<&PresetResponse, Error> {
        match self.conversation_script.get(step_idx) {
            Some(ConversationStep::AssistantResponse(preset)) => Ok(preset),
            Some(ConversationStep::UserInput | ConversationStep::ToolOutput) => {
                Err(Error {
                    message: "not an assistant response step",
                    kind: ErrorKind::Other,
                })
            }
            None => self.fallback.as_ref().ok_or(Error {
                message: "no enough steps",
                kind: ErrorKind::Other,
            }),
        }
    }

    fn check_failures(
        &self,
        step_idx: usize,
        preset: &PresetResponse,
    ) -> Result<(), Error> {
        let Some(failures) = preset.failures else {
            return Ok(());
        };
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let attempt = attempts.entry(step_idx).or_default();
        *attempt += 1;
        if failures == 0 || *attempt <= failures {
            return Err(Error {
                message: "preset failure",
                kind: ErrorKind::Unavailable,
            });
        }
        Ok(())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        self.requests_sent.fetch_add(1, Ordering::SeqCst);

        let step_idx = req
            .messages
            .iter()
            .filter(|msg| !matches!(msg, ModelMessage::System(_)))
            .count();
        let result = self.select_response(step_idx).and_then(|preset| {
            self.check_failures(step_idx, preset)?;
            Ok(TestModelResponse::new(
                step_idx,
                preset,
                self.delay.unwrap_or(Duration::from_millis(1)),
            ))
        });
        ready(result)
    }
}
