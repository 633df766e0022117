//! Simulation backend.
//!
//! Provides an EtherCAT network of CiA-402 drives that follow their targets
//! instantly once enabled, and a machining I/O whose live feed distance is
//! scripted per cycle.

mod machining;
mod network;

pub use machining::SimulatedMachining;
pub use network::{SimulatedNetwork, SimulatedServo};

use edm_common::motion::config::MotionConfig;

/// Build a network with one drive per configured axis and an idle
/// machining I/O.
pub fn create_backend(config: &MotionConfig) -> (SimulatedNetwork, SimulatedMachining) {
    (
        SimulatedNetwork::new(config.axis_count, config.cycle_period_ns()),
        SimulatedMachining::new(),
    )
}
