use itinera_model::{ModelMessage, ModelRequest, ModelTool};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionToolCall {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCall {
    pub index: Option<u32>,
    pub id: Option<String>,
    pub r#type: Option<String>,
    pub function: Option<FunctionToolCall>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub choices: Vec<Choice>,
    /// Only set on the final chunk, and only by servers that honor
    /// `stream_options.include_usage`.
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Choice {
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub reasoning_content: Option<String>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reasoning_content: Option<String>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
    stream: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        temperature: config.temperature,
        tools: req.tools.iter().map(create_tool).collect(),
        stream_options: Some(StreamOptions {
            include_usage: true,
        }),
        stream: true,
    }
}

#[inline]
fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message::System {
            content: content.clone(),
        },
        ModelMessage::User(content) => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant(content) => Message::Assistant {
            content: Some(content.clone()),
            tool_calls: None,
            reasoning_content: None,
        },
        ModelMessage::Tool(result) => Message::Tool {
            tool_call_id: result.id.clone(),
            content: result.content.clone(),
        },
        ModelMessage::Opaque(opaque_message) => {
            // Opaque messages from this provider always hold a `Message`.
            let Some(msg) = opaque_message.to_raw::<Message>() else {
                return Message::Assistant {
                    content: None,
                    tool_calls: None,
                    reasoning_content: None,
                };
            };
            msg.clone()
        }
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use itinera_model::{OpaqueMessage, ToolCallResult};

    use super::*;
    use crate::OpenAIConfigBuilder;

    #[test]
    fn test_create_request() {
        let request = ModelRequest {
            messages: vec![
                ModelMessage::System(
                    "You are a helpful AI travel assistant.".to_owned(),
                ),
                ModelMessage::User("Get flight status for AA100".to_owned()),
                ModelMessage::Tool(ToolCallResult {
                    id: "call_1".to_owned(),
                    content: "{\"status\":\"On Time\"}".to_owned(),
                }),
            ],
            tools: vec![ModelTool {
                name: "get_flight_status".to_owned(),
                description: "Looks up the status of a flight.".to_owned(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "flight_number": { "type": "string" }
                    },
                    "required": ["flight_number"]
                }),
            }],
        };
        let config = OpenAIConfigBuilder::ollama()
            .with_model("custom")
            .with_temperature(0.0)
            .build();
        let expected = ChatCompletionRequest {
            model: "custom".to_owned(),
            messages: vec![
                Message::System {
                    content: "You are a helpful AI travel assistant."
                        .to_owned(),
                },
                Message::User {
                    content: "Get flight status for AA100".to_owned(),
                },
                Message::Tool {
                    tool_call_id: "call_1".to_owned(),
                    content: "{\"status\":\"On Time\"}".to_owned(),
                },
            ],
            temperature: Some(0.0),
            tools: vec![Tool {
                r#type: "function",
                function: FunctionTool {
                    name: "get_flight_status".to_owned(),
                    description: "Looks up the status of a flight."
                        .to_owned(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "flight_number": { "type": "string" }
                        },
                        "required": ["flight_number"]
                    }),
                },
            }],
            stream_options: Some(StreamOptions {
                include_usage: true,
            }),
            stream: true,
        };
        assert_eq!(create_request(&request, &config), expected);
    }

    #[test]
    fn test_replay_opaque_message() {
        let assistant = Message::Assistant {
            content: None,
            tool_calls: Some(vec![ToolCall {
                index: Some(0),
                id: Some("call_1".to_owned()),
                r#type: Some("function".to_owned()),
                function: Some(FunctionToolCall {
                    name: Some("get_flight_status".to_owned()),
                    arguments: Some("{\"flight_number\":\"AA100\"}".to_owned()),
                }),
            }]),
            reasoning_content: None,
        };
        let opaque = OpaqueMessage::new("chatcmpl-1", assistant.clone());
        assert_eq!(create_message(&ModelMessage::Opaque(opaque)), assistant);

        // Opaque messages from another provider degrade to an empty turn.
        let foreign = OpaqueMessage::new("msg:1", "msg:1".to_owned());
        let payload =
            serde_json::to_value(create_message(&ModelMessage::Opaque(foreign)))
                .unwrap();
        assert_eq!(payload, json!({ "role": "assistant", "content": null }));
    }

    #[test]
    fn test_parse_chunks() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"chatcmpl-1","choices":[{"delta":{"content":"75°F"},"finish_reason":null}],"usage":null}"#,
        )
        .unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("75°F"));
        assert_eq!(chunk.usage, None);

        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"chatcmpl-1","choices":[],"usage":{"prompt_tokens":212,"completion_tokens":48,"total_tokens":260}}"#,
        )
        .unwrap();
        assert!(chunk.choices.is_empty());
        assert_eq!(chunk.usage.map(|usage| usage.total_tokens), Some(260));
    }
}
