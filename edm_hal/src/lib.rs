//! # EDM HAL Library
//!
//! Backends for the hardware contracts defined in `edm_common::hal`.
//!
//! # Module Structure
//!
//! - [`drivers`] - backend implementations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 edm_motion (RT thread)                  │
//! │   EthercatStateMachine          ServoFeed / Drill       │
//! └──────────┬──────────────────────────────┬───────────────┘
//!            │ EthercatNetwork              │ MachiningIo
//!            ▼                              ▼
//! ┌─────────────────────┐        ┌──────────────────────────┐
//! │  SimulatedNetwork   │        │   SimulatedMachining     │
//! │  CiA-402 drives     │        │   feed script, touch,    │
//! │  DC clock           │        │   gate / enable outputs  │
//! └─────────────────────┘        └──────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod drivers;

pub use crate::drivers::simulation::{SimulatedMachining, SimulatedNetwork, create_backend};
