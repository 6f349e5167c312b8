use std::borrow::Cow;

use serde::{Serialize, Serializer};
use serde_json::{Value, json};

use super::Error;

/// The outcome of one tool invocation.
///
/// Produced once by the invoker and never changed afterwards. A failed
/// result carries `null` as its value.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolResult {
    value: Value,
    error: Option<Error>,
}

impl ToolResult {
    /// Creates a successful result.
    #[inline]
    pub fn success(value: Value) -> Self {
        Self { value, error: None }
    }

    /// Creates a failed result.
    #[inline]
    pub fn failure(error: Error) -> Self {
        Self {
            value: Value::Null,
            error: Some(error),
        }
    }

    /// Returns `true` if the tool produced a value.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the structured value.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns the error of a failed result.
    #[inline]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Returns the error message of a failed result.
    #[inline]
    pub fn error_message(&self) -> Option<Cow<'_, str>> {
        self.error.as_ref().map(Error::reason)
    }

    /// Renders the result as the JSON payload reported to the planner.
    pub fn to_json(&self) -> Value {
        json!({
            "success": self.is_success(),
            "value": self.value,
            "error": self.error_message(),
        })
    }
}

impl Serialize for ToolResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_json() {
        let ok = ToolResult::success(json!({ "status": "On Time" }));
        assert!(ok.is_success());
        assert_eq!(
            ok.to_json(),
            json!({ "success": true, "value": { "status": "On Time" }, "error": null })
        );

        let failed = ToolResult::failure(
            Error::invalid_input().with_reason("missing required argument `location`"),
        );
        assert!(!failed.is_success());
        assert_eq!(failed.value(), &Value::Null);
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "success": false,
                "value": null,
                "error": "missing required argument `location`"
            })
        );
    }
}
