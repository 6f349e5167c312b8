use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A provider-specific planner message the loop stores but never inspects.
///
/// Replaying history through [`crate::ModelMessage`] alone would lose the
/// exact tool call structure some providers require (for example the
/// chat-completions `tool_calls` array that tool results must answer). A
/// provider wraps its own message type here and unwraps it again with
/// [`OpaqueMessage::to_raw`] when building the next request.
pub struct OpaqueMessage(Arc<dyn OpaqueMessageObject>);

impl OpaqueMessage {
    /// Creates a new `OpaqueMessage`.
    ///
    /// `id` must be unique within a conversation; equality and hashing only
    /// look at it.
    #[inline]
    pub fn new<ID: Into<String>, T: Send + Sync + 'static>(
        id: ID,
        value: T,
    ) -> Self {
        let id = id.into();
        Self(Arc::new(OpaqueMessageInner { id, value }))
    }

    /// Returns the wrapped value if it is a `T`.
    #[inline]
    pub fn to_raw<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }
}

impl Clone for OpaqueMessage {
    #[inline]
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl Debug for OpaqueMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueMessage")
            .field("id", &self.0.id())
            .finish()
    }
}

impl PartialEq for OpaqueMessage {
    fn eq(&self, other: &Self) -> bool {
        self.0.id() == other.0.id()
    }
}

impl Eq for OpaqueMessage {}

impl Hash for OpaqueMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id().hash(state);
    }
}

trait OpaqueMessageObject: Send + Sync {
    fn id(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

struct OpaqueMessageInner<T> {
    id: String,
    value: T,
}

impl<T: Send + Sync + 'static> OpaqueMessageObject for OpaqueMessageInner<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn as_any(&self) -> &dyn Any {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[derive(Clone)]
    struct ProviderMessage {
        text: String,
        tool_call_ids: Vec<String>,
    }

    fn provider_message(text: &str, ids: &[&str]) -> ProviderMessage {
        ProviderMessage {
            text: text.to_owned(),
            tool_call_ids: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    #[test]
    fn test_convert_between() {
        let raw = provider_message("Looking up AA100", &["call_1"]);
        let opaque = OpaqueMessage::new("chatcmpl-1", raw);
        let raw_back = opaque.to_raw::<ProviderMessage>().unwrap();
        assert_eq!(raw_back.text, "Looking up AA100");
        assert_eq!(raw_back.tool_call_ids, ["call_1"]);
        assert!(opaque.to_raw::<String>().is_none());
    }

    #[test]
    fn test_common_traits() {
        let opaque_0 = OpaqueMessage::new(
            "chatcmpl-1",
            provider_message("Looking up AA100", &["call_1"]),
        );
        let opaque_1 = OpaqueMessage::new(
            "chatcmpl-2",
            provider_message("AA100 is on time. TERMINATE", &[]),
        );

        let opaque_0_clone = opaque_0.clone();
        assert_eq!(opaque_0, opaque_0_clone);
        assert_ne!(opaque_0, opaque_1);

        let mut set = HashSet::new();
        set.insert(opaque_0);
        set.insert(opaque_0_clone);
        set.insert(opaque_1);
        assert_eq!(set.len(), 2);
    }
}
