//! Motion core shared types.
//!
//! All types exchanged between the real-time motion core and the rest of
//! the machine live here: plan inputs, jump/drill parameters, the command
//! and signal vocabulary, the status snapshot, and the TOML configuration.

pub mod command;
pub mod config;
pub mod plan;
pub mod signal;
pub mod status;
