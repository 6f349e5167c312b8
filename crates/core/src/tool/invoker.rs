use std::any::Any;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinError;
use tokio::time::timeout;

use super::{Error, Registry, ToolResult};

/// Calls registered tools by name.
///
/// Invocation never fails: unknown tools, invalid arguments, errors raised
/// by the tool body, panics and timeouts all come back as a failed
/// [`ToolResult`].
pub struct Invoker {
    registry: Registry,
    timeout: Option<Duration>,
}

impl Invoker {
    /// Creates an invoker without a timeout.
    #[inline]
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Limits how long a single tool body may run.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the underlying registry.
    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Invokes the tool called `name`.
    ///
    /// Arguments are validated against the tool's descriptor first, and the
    /// tool body does not run when validation fails.
    pub async fn invoke(&self, name: &str, arguments: Value) -> ToolResult {
        let tool = match self.registry.lookup(name) {
            Ok(tool) => tool,
            Err(err) => {
                warn!("{err}");
                return ToolResult::failure(
                    Error::unknown_tool().with_reason(format!("{err}")),
                );
            }
        };

        let arguments = match tool.descriptor().validate_arguments(arguments) {
            Ok(arguments) => arguments,
            Err(err) => {
                debug!("rejected arguments for `{name}`: {err}");
                return ToolResult::failure(err);
            }
        };

        trace!("invoking `{name}` with args: {arguments}");
        let mut handle = tokio::spawn(tool.object.clone().execute(arguments));
        let joined = match self.timeout {
            Some(limit) => match timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    warn!("tool `{name}` timed out after {limit:?}");
                    return ToolResult::failure(Error::timeout().with_reason(
                        format!("tool `{name}` did not finish within {limit:?}"),
                    ));
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(Ok(value)) => ToolResult::success(value),
            Ok(Err(err)) => ToolResult::failure(err),
            Err(err) => ToolResult::failure(join_error(err)),
        }
    }
}

fn join_error(err: JoinError) -> Error {
    if !err.is_panic() {
        return Error::execution_error().with_reason("tool was cancelled");
    }
    let message = panic_message(err.into_panic());
    warn!("tool panicked: {message}");
    Error::execution_error().with_reason(format!("tool panicked: {message}"))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => "unknown panic".to_owned(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::tool::{ErrorKind, ParameterSpec, ParameterType, ToolDescriptor};

    fn location_descriptor() -> ToolDescriptor {
        ToolDescriptor::new(
            "get_location_info",
            "Describes a location.",
            vec![ParameterSpec::required("location", ParameterType::String)],
        )
    }

    fn counting_invoker(calls: Arc<AtomicUsize>) -> Invoker {
        let mut registry = Registry::new();
        registry
            .register_fn(location_descriptor(), move |args| {
                calls.fetch_add(1, Ordering::SeqCst);
                let location = args["location"].as_str().unwrap_or_default();
                Ok(json!({ "location": location, "timezone": "EST" }))
            })
            .unwrap();
        Invoker::new(registry)
    }

    #[tokio::test]
    async fn test_invoke_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let invoker = counting_invoker(calls.clone());
        let args = json!({ "location": "New York" });

        let first = invoker.invoke("get_location_info", args.clone()).await;
        let second = invoker.invoke("get_location_info", args).await;
        assert!(first.is_success());
        assert_eq!(
            first.value(),
            &json!({ "location": "New York", "timezone": "EST" })
        );
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_arguments_skip_body() {
        let calls = Arc::new(AtomicUsize::new(0));
        let invoker = counting_invoker(calls.clone());

        let result = invoker.invoke("get_location_info", json!({})).await;
        assert_eq!(result.error().unwrap().kind(), ErrorKind::InvalidInput);
        assert!(
            result
                .error_message()
                .unwrap()
                .contains("missing required argument `location`")
        );

        let result = invoker
            .invoke("get_location_info", json!({ "location": 42 }))
            .await;
        assert_eq!(result.error().unwrap().kind(), ErrorKind::InvalidInput);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let invoker = Invoker::new(Registry::new());
        let result = invoker.invoke("book_hotel", json!({})).await;
        assert!(!result.is_success());
        assert_eq!(result.error().unwrap().kind(), ErrorKind::UnknownTool);
        assert_eq!(result.value(), &Value::Null);
    }

    #[tokio::test]
    async fn test_failing_and_panicking_tools() {
        let mut registry = Registry::new();
        registry
            .register_fn(
                ToolDescriptor::new("refuse", "Always fails.", vec![]),
                |_| Err(Error::execution_error().with_reason("service down")),
            )
            .unwrap();
        registry
            .register_fn(
                ToolDescriptor::new("explode", "Always panics.", vec![]),
                |_| panic!("boom"),
            )
            .unwrap();
        let invoker = Invoker::new(registry);

        let result = invoker.invoke("refuse", Value::Null).await;
        assert_eq!(result.error().unwrap().kind(), ErrorKind::ExecutionError);
        assert_eq!(result.error_message().unwrap(), "service down");

        let result = invoker.invoke("explode", json!({})).await;
        assert_eq!(result.error().unwrap().kind(), ErrorKind::ExecutionError);
        assert_eq!(result.error_message().unwrap(), "tool panicked: boom");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout() {
        static NO_PARAMETERS: Value = Value::Null;

        struct SlowTool;

        impl crate::tool::Tool for SlowTool {
            type Input = Value;

            fn name(&self) -> &str {
                "slow"
            }

            fn description(&self) -> &str {
                "Never answers in time."
            }

            fn parameter_schema(&self) -> &Value {
                &NO_PARAMETERS
            }

            fn execute(
                &self,
                _input: Self::Input,
            ) -> impl Future<Output = crate::tool::ToolOutput> + Send + 'static
            {
                async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(json!("late"))
                }
            }
        }

        let mut registry = Registry::new();
        registry.register(SlowTool).unwrap();
        let invoker =
            Invoker::new(registry).with_timeout(Duration::from_secs(5));

        let result = invoker.invoke("slow", json!({})).await;
        assert_eq!(result.error().unwrap().kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_timeout_stops_waiting_on_blocking_closure() {
        let mut registry = Registry::new();
        registry
            .register_fn(
                ToolDescriptor::new("stall", "Blocks its thread.", vec![]),
                |_| {
                    std::thread::sleep(Duration::from_millis(500));
                    Ok(json!("late"))
                },
            )
            .unwrap();
        let invoker =
            Invoker::new(registry).with_timeout(Duration::from_millis(20));

        let result = invoker.invoke("stall", json!({})).await;
        assert_eq!(result.error().unwrap().kind(), ErrorKind::Timeout);
    }
}
