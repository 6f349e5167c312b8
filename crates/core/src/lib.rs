//! The tool-calling conversation loop: a planner proposes actions, a
//! registry of typed tools carries them out, and a termination detector
//! decides when the exchange is over.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod model_client;
pub mod planner;
pub mod termination;
pub mod tool;

pub use agent::{
    Agent, AgentBuilder, ConversationError, ConversationOutcome,
    DEFAULT_MAX_TURNS, Stage, TerminationReason,
};
