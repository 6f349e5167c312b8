//! A travel assistant built on the tool-calling conversation loop.
//!
//! The crate includes a CLI tool for using in the terminal. You can also use
//! it as a library: [`SessionBuilder`] wires a model provider to the travel
//! tools in [`tools`].

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod config;
mod session;
pub mod tools;

pub use config::{Config, ConfigError, ProviderKind};
pub use session::{Session, SessionBuilder};

/// Re-exports of [`itinera_core`] crate.
pub mod core {
    pub use itinera_core::*;
}
