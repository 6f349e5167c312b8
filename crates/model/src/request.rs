use serde_json::Value;

use crate::OpaqueMessage;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelRequest {
    /// The transcript so far, oldest first.
    pub messages: Vec<ModelMessage>,
    /// Tools the model may ask to call.
    pub tools: Vec<ModelTool>,
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// A planner text without tool calls.
    Assistant(String),
    /// The outcome of a tool call, answering an earlier request.
    Tool(ToolCallResult),
    /// A provider-specific planner message, kept verbatim so that tool call
    /// requests and their results line up when the history is replayed.
    Opaque(OpaqueMessage),
}

/// The result of calling a tool, as reported back to the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCallResult {
    /// The identifier of the tool call request this answers.
    pub id: String,
    /// The serialized tool result.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool, as a
    /// [JSON schema](https://json-schema.org/) object.
    pub parameters: Value,
}
