use std::any::Any;
use std::panic::resume_unwind;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::spawn_blocking;
use tracing::Instrument;

use super::{Error, Tool, ToolOutput};

pub(crate) type BoxedToolFuture =
    Pin<Box<dyn Future<Output = ToolOutput> + Send>>;

/// A type-erased callable stored in the registry.
pub(crate) trait ToolObject: Send + Sync + 'static {
    /// Starts executing with arguments that already passed schema
    /// validation. The body only runs once the future is polled.
    fn execute(self: Arc<Self>, arguments: Value) -> BoxedToolFuture;

    fn as_any(&self) -> &dyn Any;
}

pub(crate) struct TypedTool<T: Tool>(pub T);

impl<T: Tool> ToolObject for TypedTool<T> {
    fn execute(self: Arc<Self>, arguments: Value) -> BoxedToolFuture {
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => {
                let reason = format!("{err}");
                return Box::pin(std::future::ready(ToolOutput::Err(
                    Error::invalid_input().with_reason(reason),
                )));
            }
        };
        let span = debug_span!("tool execute", tool = self.0.name());
        Box::pin(async move { self.0.execute(input).await }.instrument(span))
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        &self.0
    }
}

pub(crate) struct FnTool<F>(pub F);

impl<F> ToolObject for FnTool<F>
where
    F: Fn(Value) -> ToolOutput + Send + Sync + 'static,
{
    /// Closures may block, so they run on the blocking pool. That keeps
    /// the invoker's timeout responsive on a single-threaded runtime, but a
    /// closure that outlives the timeout still runs to completion.
    fn execute(self: Arc<Self>, arguments: Value) -> BoxedToolFuture {
        Box::pin(async move {
            match spawn_blocking(move || (self.0)(arguments)).await {
                Ok(output) => output,
                Err(err) if err.is_panic() => resume_unwind(err.into_panic()),
                Err(_) => Err(Error::execution_error()
                    .with_reason("tool was cancelled")),
            }
        })
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        &self.0
    }
}
