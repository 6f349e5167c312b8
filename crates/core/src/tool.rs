//! Tool registration and invocation.
//!
//! Tools are registered once in a [`Registry`] and called by name through an
//! [`Invoker`]. Every invocation produces a [`ToolResult`], failures
//! included, so the conversation loop never has to unwind because of a tool.

mod descriptor;
mod error;
mod invoker;
mod object;
mod registry;
mod result;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use descriptor::{ParameterSpec, ParameterType, ToolDescriptor};
pub use error::{Error, ErrorKind};
pub use invoker::Invoker;
pub use registry::{RegisteredTool, Registry, RegistryError};
pub use result::ToolResult;

/// The raw outcome of a tool body.
pub type ToolOutput = Result<Value, Error>;

/// A tool that can be called by the planner.
///
/// Implementations should be stateless. Context the tool needs, such as a
/// data source or the current date, is an immutable part of the value and
/// is copied into the returned future.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned + Send + 'static;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool, as a JSON schema object.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// The returned future must be fully independent of `self`. It may be
    /// dropped before completion when the call times out.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolOutput> + Send + 'static;
}
