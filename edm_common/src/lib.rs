//! EDM Common Library
//!
//! Shared value types, hardware contracts and configuration loading for the
//! EDM motion core workspace.
//!
//! # Module Structure
//!
//! - [`axis`] - Fixed-size axis position vector and blu/mm conversion
//! - [`motion`] - Plan inputs, jump parameters, commands, signals, status
//! - [`hal`] - Servo device / EtherCAT network / machining I/O contracts
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - System-wide limits and defaults
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! edm_common = { path = "../edm_common" }
//! ```
//!
//! ```rust
//! use edm_common::prelude::*;
//! ```

pub mod axis;
pub mod config;
pub mod consts;
pub mod hal;
pub mod motion;
pub mod prelude;
