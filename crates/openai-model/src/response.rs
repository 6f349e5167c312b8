use std::collections::VecDeque;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use itinera_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
    OpaqueMessage, ToolCallRequest,
};
use pin_project_lite::pin_project;
use serde_json::Value;

use crate::Error;
use crate::io::{ChunksError, Sse, SseError};
use crate::proto::{ChatCompletionChunk, Choice, Message, ToolCall};

/// Everything received so far on one completion stream.
///
/// Text deltas are delivered as soon as they arrive. Tool calls come in
/// fragments keyed by `index`, so they are only delivered once the server
/// reports a finish reason (or the stream ends), followed by `Completed`.
struct StreamState {
    sse: Sse,
    id: Option<String>,
    content: String,
    reasoning_content: Option<String>,
    tool_calls: Vec<ToolCall>,
    tool_calls_flushed: bool,
    ready: VecDeque<ModelResponseEvent>,
    ended: bool,
}

impl StreamState {
    fn new(sse: Sse) -> Self {
        Self {
            sse,
            id: None,
            content: String::new(),
            reasoning_content: None,
            tool_calls: Vec::new(),
            tool_calls_flushed: false,
            ready: VecDeque::new(),
            ended: false,
        }
    }

    fn apply_chunk(&mut self, chunk: ChatCompletionChunk) -> Result<(), Error> {
        if self.id.get_or_insert_with(|| chunk.id.clone()) != &chunk.id {
            return Err(Error::new("chunk id mismatch", ErrorKind::Other));
        }
        if let Some(usage) = chunk.usage {
            debug!(
                "token usage: {} prompt + {} completion = {}",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
            );
        }
        // Only one choice is ever requested.
        if let Some(choice) = chunk.choices.into_iter().next() {
            self.apply_choice(choice);
        }
        Ok(())
    }

    fn apply_choice(&mut self, choice: Choice) {
        let delta = choice.delta;
        if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
            self.content.push_str(&content);
            self.ready.push_back(ModelResponseEvent::MessageDelta(content));
        }
        if let Some(reasoning) = delta.reasoning_content {
            self.reasoning_content
                .get_or_insert_default()
                .push_str(&reasoning);
        }
        for fragment in delta.tool_calls.into_iter().flatten() {
            match self
                .tool_calls
                .iter_mut()
                .find(|call| call.index == fragment.index)
            {
                Some(call) => merge_fragment(call, fragment),
                None => self.tool_calls.push(fragment),
            }
        }
        if let Some(reason) = choice.finish_reason {
            self.flush_tool_calls();
            self.ready.push_back(ModelResponseEvent::Completed(
                finish_reason(&reason),
            ));
        }
    }

    fn flush_tool_calls(&mut self) {
        if mem::replace(&mut self.tool_calls_flushed, true) {
            return;
        }
        let requests = self.tool_calls.iter().map(|call| {
            let function = call.function.as_ref();
            ToolCallRequest {
                id: call.id.clone().unwrap_or_default(),
                name: function.and_then(|f| f.name.clone()).unwrap_or_default(),
                arguments: function
                    .and_then(|f| f.arguments.as_deref())
                    .map(parse_arguments)
                    .unwrap_or_default(),
            }
        });
        self.ready.extend(requests.map(ModelResponseEvent::ToolCall));
    }

    /// The assistant message to replay on later requests.
    fn into_message(self) -> Option<(String, Message)> {
        let has_tool_calls = !self.tool_calls.is_empty();
        // A reply made only of tool calls carries no content at all.
        let content = if has_tool_calls && self.content.is_empty() {
            None
        } else {
            Some(self.content)
        };
        let message = Message::Assistant {
            content,
            tool_calls: has_tool_calls.then_some(self.tool_calls),
            reasoning_content: self.reasoning_content,
        };
        Some((self.id?, message))
    }
}

fn merge_fragment(call: &mut ToolCall, fragment: ToolCall) {
    let append = |into: &mut Option<String>, part: Option<String>| {
        if let Some(part) = part {
            into.get_or_insert_default().push_str(&part);
        }
    };
    append(&mut call.id, fragment.id);
    append(&mut call.r#type, fragment.r#type);
    let Some(function) = fragment.function else {
        return;
    };
    match call.function {
        Some(ref mut existing) => {
            append(&mut existing.name, function.name);
            append(&mut existing.arguments, function.arguments);
        }
        None => call.function = Some(function),
    }
}

fn finish_reason(reason: &str) -> ModelFinishReason {
    match reason {
        "tool_calls" => ModelFinishReason::ToolCalls,
        "length" => ModelFinishReason::Length,
        _ => ModelFinishReason::Stop,
    }
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, StreamState), Error>;

pin_project! {
    pub struct OpenAIResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
        full_msg: Option<(String, Message)>,
    }
}

impl OpenAIResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let state = StreamState::new(sse);
        Self {
            next_event_fut: Some(Box::pin(next_event(state))),
            full_msg: None,
        }
    }
}

impl ModelResponse for OpenAIResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let result = ready!(next_event_fut.as_mut().poll(cx));
        *this.next_event_fut = None;
        match result {
            Ok((Some(event), state)) => {
                *this.next_event_fut = Some(Box::pin(next_event(state)));
                Poll::Ready(Ok(Some(event)))
            }
            Ok((None, state)) => {
                *this.full_msg = state.into_message();
                Poll::Ready(Ok(None))
            }
            Err(err) => Poll::Ready(Err(err)),
        }
    }

    fn make_opaque_message(&self) -> Option<OpaqueMessage> {
        self.full_msg
            .as_ref()
            .map(|(id, msg)| OpaqueMessage::new(id, msg.clone()))
    }
}

async fn next_event(mut state: StreamState) -> NextEvent {
    loop {
        if let Some(event) = state.ready.pop_front() {
            return Ok((Some(event), state));
        }
        if state.ended {
            return Ok((None, state));
        }

        let data = match state.sse.next_event().await {
            Ok(Some(data)) if data != "[DONE]" => data,
            Ok(_) => {
                // Servers that close without a finish reason still owe us
                // the tool calls they streamed.
                state.flush_tool_calls();
                state.ended = true;
                continue;
            }
            Err(SseError::ChunksError(ChunksError(message))) => {
                return Err(Error::new(message, ErrorKind::Unavailable));
            }
            Err(SseError::InvalidPayload) => {
                let message = "invalid event stream";
                return Err(Error::new(message, ErrorKind::Other));
            }
        };
        trace!("got sse event: {data}");
        let chunk = serde_json::from_str::<ChatCompletionChunk>(&data)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;
        state.apply_chunk(chunk)?;
    }
}

/// Models occasionally emit malformed argument JSON. The raw text is kept so
/// the invoker can report it back instead of silently calling with nothing.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!("unparsable tool call arguments: {err}");
        Value::String(raw.to_owned())
    })
}
