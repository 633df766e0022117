//! HAL backend implementations.
//!
//! - [`simulation`] - software backend for development and testing
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `EthercatNetwork` and `MachiningIo` from `edm_common::hal`
//! 3. Export a constructor next to [`simulation::create_backend`]

pub mod simulation;
