//! Conversation-related types.

use std::fmt::{self, Display};

use itinera_model::{ModelMessage, ToolCallRequest, ToolCallResult};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::planner::PlannerReply;
use crate::tool::ToolResult;

/// Who produced a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person asking.
    User,
    /// The planner deciding what to do next.
    Planner,
    /// A tool answering a call.
    Tool,
}

/// The payload of a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Content {
    /// Plain text.
    Text(String),
    /// A structured JSON value, such as a tool result.
    Structured(Value),
}

impl Content {
    /// Returns the text of a [`Content::Text`].
    #[inline]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Structured(_) => None,
        }
    }
}

impl Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Text(text) => f.write_str(text),
            Content::Structured(value) => write!(f, "{value}"),
        }
    }
}

impl From<String> for Content {
    #[inline]
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    #[inline]
    fn from(text: &str) -> Self {
        Content::Text(text.to_owned())
    }
}

impl From<Value> for Content {
    #[inline]
    fn from(value: Value) -> Self {
        Content::Structured(value)
    }
}

/// One entry of a [`Transcript`].
///
/// Besides what is shown to a reader, every message keeps the form it is
/// replayed to the model in, so provider-specific details survive across
/// turns.
#[derive(Clone, Debug)]
pub struct Message {
    role: Role,
    content: Content,
    tool_calls: Vec<ToolCallRequest>,
    tool_call: Option<ToolCallRequest>,
    tool_result: Option<ToolResult>,
    pub(crate) model_msg: ModelMessage,
}

impl Message {
    /// Creates a message without tool call information.
    pub fn new(role: Role, content: impl Into<Content>) -> Self {
        let content = content.into();
        let text = format!("{content}");
        let model_msg = match role {
            Role::User => ModelMessage::User(text),
            Role::Planner => ModelMessage::Assistant(text),
            Role::Tool => ModelMessage::Tool(ToolCallResult {
                id: String::new(),
                content: text,
            }),
        };
        Self {
            role,
            content,
            tool_calls: vec![],
            tool_call: None,
            tool_result: None,
            model_msg,
        }
    }

    /// Creates a user message.
    #[inline]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, Content::Text(text.into()))
    }

    pub(crate) fn planner_reply(reply: PlannerReply) -> Self {
        let model_msg = match reply.opaque_msg {
            Some(opaque_msg) => ModelMessage::Opaque(opaque_msg),
            None => ModelMessage::Assistant(reply.text.clone()),
        };
        Self {
            role: Role::Planner,
            content: Content::Text(reply.text),
            tool_calls: reply.tool_calls,
            tool_call: None,
            tool_result: None,
            model_msg,
        }
    }

    pub(crate) fn tool_response(
        request: ToolCallRequest,
        result: ToolResult,
    ) -> Self {
        let payload = result.to_json();
        let model_msg = ModelMessage::Tool(ToolCallResult {
            id: request.id.clone(),
            content: format!("{payload}"),
        });
        Self {
            role: Role::Tool,
            content: Content::Structured(payload),
            tool_calls: vec![],
            tool_call: Some(request),
            tool_result: Some(result),
            model_msg,
        }
    }

    /// Returns who produced this message.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the content of this message.
    #[inline]
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Returns the tool calls a planner message requested.
    #[inline]
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        &self.tool_calls
    }

    /// Returns the call a tool message answers.
    #[inline]
    pub fn tool_call(&self) -> Option<&ToolCallRequest> {
        self.tool_call.as_ref()
    }

    /// Returns the result a tool message carries.
    #[inline]
    pub fn tool_result(&self) -> Option<&ToolResult> {
        self.tool_result.as_ref()
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Message", 4)?;
        state.serialize_field("role", &self.role)?;
        state.serialize_field("content", &self.content)?;
        if self.tool_calls.is_empty() {
            state.skip_field("tool_calls")?;
        } else {
            state.serialize_field("tool_calls", &self.tool_calls)?;
        }
        match &self.tool_call {
            Some(call) => state.serialize_field("tool_call", call)?,
            None => state.skip_field("tool_call")?,
        }
        state.end()
    }
}

/// The ordered history of one conversation. Messages are only ever
/// appended.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Returns every message, oldest first.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Iterates the messages, oldest first.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Returns the number of messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if nothing has been said yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the latest message.
    #[inline]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[inline]
    pub(crate) fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

impl IntoIterator for Transcript {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tool::Error;

    #[test]
    fn test_tool_response_replays_result() {
        let request = ToolCallRequest {
            id: "call_1".to_owned(),
            name: "get_flight_status".to_owned(),
            arguments: json!({ "flight_number": "AA100" }),
        };
        let msg = Message::tool_response(
            request.clone(),
            ToolResult::failure(Error::timeout()),
        );
        assert_eq!(msg.role(), Role::Tool);
        assert_eq!(msg.tool_call(), Some(&request));
        let ModelMessage::Tool(result) = &msg.model_msg else {
            panic!("expected a tool message");
        };
        assert_eq!(result.id, "call_1");
        let payload: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(
            payload,
            json!({ "success": false, "value": null, "error": "Timed out" })
        );
    }

    #[test]
    fn test_serialize_transcript() {
        let mut transcript = Transcript::default();
        transcript.push(Message::user("Get flight status for AA100"));
        transcript.push(Message::planner_reply(PlannerReply::text(
            "AA100 is on time. TERMINATE",
        )));
        assert_eq!(
            serde_json::to_value(&transcript).unwrap(),
            json!([
                { "role": "user", "content": "Get flight status for AA100" },
                { "role": "planner", "content": "AA100 is on time. TERMINATE" },
            ])
        );
        assert_eq!(transcript.len(), 2);
        assert_eq!(
            transcript.last().unwrap().content().as_text(),
            Some("AA100 is on time. TERMINATE")
        );
    }
}
