mod builder;
mod state;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use crate::conversation::{Message, Transcript};
use crate::planner::{Planner, PlannerError};
use crate::termination::TerminationDetector;
use crate::tool::{Invoker, Registry};
pub use builder::AgentBuilder;
pub use state::Stage;
use state::Run;

/// How many planner turns a conversation gets unless configured otherwise.
pub const DEFAULT_MAX_TURNS: usize = 10;

type StageObserver = Box<dyn Fn(Stage) + Send + Sync>;
type MessageObserver = Box<dyn Fn(&Message) + Send + Sync>;

/// Runs conversations between a planner and a fixed set of tools.
///
/// Each call to [`Agent::submit`] starts a fresh transcript from the user's
/// message and alternates between asking the planner for the next step and
/// invoking the tools it requests, one at a time, until the termination
/// detector fires or the turn limit is reached.
pub struct Agent {
    planner: Box<dyn Planner>,
    invoker: Invoker,
    detector: Box<dyn TerminationDetector>,
    max_turns: usize,
    planner_timeout: Option<Duration>,
    on_stage_change: Option<StageObserver>,
    on_message: Option<MessageObserver>,
}

impl Agent {
    /// Returns the registry of tools this agent can call.
    #[inline]
    pub fn registry(&self) -> &Registry {
        self.invoker.registry()
    }

    /// Returns the maximum number of planner turns per conversation.
    #[inline]
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Runs a conversation starting with `input` until it terminates.
    ///
    /// Tool failures never end the conversation; they are recorded in the
    /// transcript as failed results. A planner failure does, and the error
    /// carries the transcript collected so far.
    pub async fn submit<S: Into<String>>(
        &mut self,
        input: S,
    ) -> Result<ConversationOutcome, ConversationError> {
        let span = info_span!("conversation", max_turns = self.max_turns);
        Run::new(self, Message::user(input))
            .run()
            .instrument(span)
            .await
    }
}

/// Why a conversation stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminationReason {
    /// The termination detector fired on a planner message.
    Detected,
    /// The planner used up every turn without finishing.
    TurnLimitExceeded {
        /// The configured limit.
        limit: usize,
    },
}

/// The result of a finished conversation.
#[derive(Clone, Debug, Serialize)]
pub struct ConversationOutcome {
    /// Every message exchanged, oldest first.
    pub transcript: Transcript,
    /// The planner's final answer with the termination marker removed.
    pub summary: String,
    /// Why the conversation stopped.
    pub reason: TerminationReason,
    /// How many planner turns were used.
    pub turns: usize,
}

/// Errors that abort a conversation.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// The planner failed or timed out.
    #[error("{source}")]
    PlannerUnavailable {
        /// What went wrong.
        #[source]
        source: PlannerError,
        /// The transcript up to the failed turn.
        transcript: Transcript,
    },
}

impl ConversationError {
    /// Returns the transcript collected before the failure.
    #[inline]
    pub fn transcript(&self) -> &Transcript {
        match self {
            ConversationError::PlannerUnavailable { transcript, .. } => {
                transcript
            }
        }
    }

    /// Consumes the error and returns the transcript.
    #[inline]
    pub fn into_transcript(self) -> Transcript {
        match self {
            ConversationError::PlannerUnavailable { transcript, .. } => {
                transcript
            }
        }
    }
}
