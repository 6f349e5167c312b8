//! The protocol spoken between a conversation loop and a language model.
//!
//! A planner backed by a model sends the whole transcript plus the tool
//! definitions in a [`ModelRequest`], and reads back a stream of
//! [`ModelResponseEvent`]s: text deltas, tool call requests, and a final
//! completion event. Providers (hosted or local) implement
//! [`ModelProvider`] so the loop never depends on a concrete backend.
//!
//! Nothing here performs I/O. Provider crates do.

#![deny(missing_docs)]

mod error;
mod opaque;
mod provider;
mod request;
mod response;

pub use error::*;
pub use opaque::*;
pub use provider::*;
pub use request::*;
pub use response::*;
