use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use itinera_model::{
    ModelFinishReason, ModelProvider, ModelProviderError, ModelRequest,
    ModelResponse, ModelResponseEvent,
};
use tracing::Instrument;

use crate::planner::{PlannerError, PlannerReply};

/// Receives reply text while it streams in.
pub(crate) type DeltaFn = Arc<dyn Fn(String) + Send + Sync>;

type CompletionFuture =
    Pin<Box<dyn Future<Output = Result<PlannerReply, PlannerError>> + Send>>;
#[rustfmt::skip]
type CompleteFn = Arc<
    dyn Fn(ModelRequest, Option<DeltaFn>) -> CompletionFuture + Send + Sync
>;

/// Drives a model provider to completion behind a type-erased interface.
///
/// Each request is streamed until the provider reports the end of the
/// response, and the collected events are turned into a [`PlannerReply`].
#[derive(Clone)]
pub(crate) struct ModelClient {
    complete_fn: CompleteFn,
}

impl ModelClient {
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let complete_fn: CompleteFn = Arc::new(move |req, on_delta| {
            let fut = provider.send_request(&req);
            let span =
                debug_span!("model request", messages = req.messages.len());
            Box::pin(
                async move {
                    match fut.await {
                        Ok(resp) => collect_reply(resp, on_delta).await,
                        Err(err) => {
                            Err(unavailable("model request failed", &err))
                        }
                    }
                }
                .instrument(span),
            )
        });
        Self { complete_fn }
    }

    /// Sends `req` and waits for the whole reply.
    ///
    /// Dropping the returned future stops the response from streaming.
    pub async fn complete(
        &self,
        req: ModelRequest,
        on_delta: Option<DeltaFn>,
    ) -> Result<PlannerReply, PlannerError> {
        (self.complete_fn)(req, on_delta).await
    }
}

fn unavailable<E>(context: &str, err: &E) -> PlannerError
where
    E: ModelProviderError,
{
    error!("{context}: {err}");
    PlannerError::Unavailable {
        kind: err.kind(),
        message: err.to_string(),
    }
}

async fn collect_reply<R: ModelResponse>(
    resp: R,
    on_delta: Option<DeltaFn>,
) -> Result<PlannerReply, PlannerError> {
    let mut reply = PlannerReply::default();
    let mut finish_reason = None;

    let mut resp = pin!(resp);
    while let Some(event) = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
        .await
        .map_err(|err| unavailable("model response broke off", &err))?
    {
        trace!("model event: {event:?}");
        match event {
            ModelResponseEvent::MessageDelta(delta) => {
                reply.text.push_str(&delta);
                if let Some(on_delta) = &on_delta {
                    on_delta(delta);
                }
            }
            ModelResponseEvent::ToolCall(call) => reply.tool_calls.push(call),
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }
    reply.opaque_msg = resp.make_opaque_message();

    match finish_reason {
        Some(ModelFinishReason::Length) => {
            warn!("model reply was cut short by the output token limit");
        }
        None => debug!("model reply ended without a finish reason"),
        Some(reason) => debug!(
            "model reply finished ({reason:?}) with {} tool call(s)",
            reply.tool_calls.len()
        ),
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use itinera_model::{ErrorKind, ModelMessage, ToolCallRequest};
    use itinera_test_model::{PresetEvent, PresetResponse, TestModelProvider};
    use serde_json::json;

    use super::*;

    fn request(text: &str) -> ModelRequest {
        ModelRequest {
            messages: vec![ModelMessage::User(text.to_owned())],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn test_complete() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_user_input_step();
        let response = PresetResponse::with_events([
            PresetEvent::MessageDelta("Where ".to_owned()),
            PresetEvent::MessageDelta("are you ".to_owned()),
            PresetEvent::MessageDelta("flying to?".to_owned()),
        ]);
        model_provider.add_assistant_response_step(response);
        let model_client = ModelClient::new(model_provider);

        // Replaying the same request yields the same reply.
        for _ in 0..3 {
            let deltas = Arc::new(Mutex::new(vec![]));
            let on_delta: DeltaFn = {
                let deltas = Arc::clone(&deltas);
                Arc::new(move |delta: String| {
                    deltas.lock().unwrap().push(delta);
                })
            };
            let reply = model_client
                .complete(request("Book me a trip"), Some(on_delta))
                .await
                .unwrap();
            assert_eq!(reply.text, "Where are you flying to?");
            assert!(!reply.has_tool_calls());
            assert!(reply.opaque_msg.is_some());
            assert_eq!(deltas.lock().unwrap().len(), 3);
        }
    }

    #[tokio::test]
    async fn test_tool_calls_are_collected() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_user_input_step();
        let response = PresetResponse::with_events([
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call_1".to_owned(),
                name: "get_hotel_details".to_owned(),
                arguments: json!({ "location": "Paris" }),
            }),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "call_2".to_owned(),
                name: "get_location_info".to_owned(),
                arguments: json!({ "location": "Paris" }),
            }),
        ]);
        model_provider.add_assistant_response_step(response);
        let model_client = ModelClient::new(model_provider);

        let reply = model_client
            .complete(request("Hotels and weather in Paris"), None)
            .await
            .unwrap();
        assert!(reply.text.is_empty());
        let names: Vec<_> =
            reply.tool_calls.iter().map(|call| call.name.as_str()).collect();
        assert_eq!(names, ["get_hotel_details", "get_location_info"]);
    }

    #[tokio::test]
    async fn test_unscripted_request_is_unavailable() {
        let model_client = ModelClient::new(TestModelProvider::default());
        let err = model_client
            .complete(request("Book me a trip"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_failure_kind_is_kept() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_user_input_step();
        model_provider.add_assistant_response_step(
            PresetResponse::text("unused").with_failures(0),
        );
        let model_client = ModelClient::new(model_provider);

        let err = model_client.complete(request("Hi"), None).await.unwrap_err();
        assert!(matches!(
            err,
            PlannerError::Unavailable {
                kind: ErrorKind::Unavailable,
                ..
            }
        ));
    }
}
