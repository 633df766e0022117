//! Hardware abstraction contracts.
//!
//! The motion core never talks to a fieldbus master or generator directly;
//! backends (see the `edm_hal` crate) implement these traits.

pub mod cia402;
pub mod driver;

pub use cia402::{ControlWord, DriveState, StatusWord};
pub use driver::{EthercatNetwork, HalError, MachiningIo, ServoDevice};
