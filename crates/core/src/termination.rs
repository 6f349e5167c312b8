//! Deciding when a conversation is over.

use serde_json::Value;
use thiserror::Error;

use crate::conversation::{Content, Message};

/// The marker the planner appends once the task is complete.
pub const TERMINATION_MARKER: &str = "TERMINATE";

/// Phrases that end a conversation even without the marker.
pub const DEFAULT_COMPLETION_PHRASES: &[&str] =
    &["completed", "here are the results", "finished"];

/// Errors raised by a [`TerminationDetector`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TerminationError {
    /// The message content has a shape the detector cannot read.
    #[error("cannot inspect {0} content")]
    UnexpectedContent(&'static str),
}

/// Decides whether a message ends the conversation.
///
/// The loop treats an error as "not terminal" and keeps going.
pub trait TerminationDetector: Send + Sync {
    /// Returns `true` if `msg` ends the conversation.
    fn is_terminal(&self, msg: &Message) -> Result<bool, TerminationError>;

    /// The marker removed from planner text when building the summary.
    ///
    /// Closures and other detectors default to [`TERMINATION_MARKER`].
    fn completion_marker(&self) -> Option<&str> {
        Some(TERMINATION_MARKER)
    }
}

impl<F> TerminationDetector for F
where
    F: Fn(&Message) -> Result<bool, TerminationError> + Send + Sync,
{
    #[inline]
    fn is_terminal(&self, msg: &Message) -> Result<bool, TerminationError> {
        self(msg)
    }
}

/// Detects the termination marker and common completion phrases.
///
/// The marker is matched case-sensitively. Phrases are matched as
/// case-insensitive substrings, so "Completed" and "already completed"
/// both count.
#[derive(Clone, Debug)]
pub struct MarkerDetector {
    marker: String,
    phrases: Vec<String>,
}

impl Default for MarkerDetector {
    #[inline]
    fn default() -> Self {
        Self::new(TERMINATION_MARKER)
    }
}

impl MarkerDetector {
    /// Creates a detector for `marker` with the default phrases.
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            phrases: DEFAULT_COMPLETION_PHRASES
                .iter()
                .map(|phrase| (*phrase).to_owned())
                .collect(),
        }
    }

    /// Replaces the completion phrases.
    pub fn with_phrases<I, S>(mut self, phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.phrases = phrases
            .into_iter()
            .map(|phrase| phrase.as_ref().to_lowercase())
            .filter(|phrase| !phrase.is_empty())
            .collect();
        self
    }

    /// Only the marker ends the conversation.
    #[inline]
    pub fn without_phrases(mut self) -> Self {
        self.phrases.clear();
        self
    }

    /// Returns the marker.
    #[inline]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    fn matches_text(&self, text: &str) -> bool {
        // An empty marker would match every text.
        if !self.marker.is_empty() && text.contains(&self.marker) {
            return true;
        }
        let lowered = text.to_lowercase();
        self.phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
    }
}

impl TerminationDetector for MarkerDetector {
    fn is_terminal(&self, msg: &Message) -> Result<bool, TerminationError> {
        let text = match msg.content() {
            Content::Text(text) => text.as_str(),
            Content::Structured(Value::String(text)) => text.as_str(),
            Content::Structured(Value::Object(object)) => {
                match object.get("content") {
                    Some(Value::String(text)) => text.as_str(),
                    _ => {
                        return Err(TerminationError::UnexpectedContent(
                            "object",
                        ));
                    }
                }
            }
            Content::Structured(Value::Array(_)) => {
                return Err(TerminationError::UnexpectedContent("array"));
            }
            Content::Structured(_) => {
                return Err(TerminationError::UnexpectedContent("scalar"));
            }
        };
        Ok(self.matches_text(text))
    }

    fn completion_marker(&self) -> Option<&str> {
        Some(self.marker.as_str()).filter(|marker| !marker.is_empty())
    }
}

/// Removes the marker from a planner text and trims what is left.
pub(crate) fn strip_marker(text: &str, marker: &str) -> String {
    if marker.is_empty() {
        return text.trim().to_owned();
    }
    text.replace(marker, "").trim().to_owned()
}
