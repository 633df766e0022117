//! Hardware contracts consumed by the motion core.
//!
//! This module defines:
//! - `ServoDevice` - One CiA-402 position-mode drive
//! - `EthercatNetwork` - The fieldbus master and its cyclic exchange
//! - `MachiningIo` - EDM generator, servo-feed sensing and auxiliaries
//! - `HalError` - Error types for HAL operations
//!
//! # Timing Contracts
//!
//! | Operation | Max Duration | RT Constraint |
//! |-----------|--------------|---------------|
//! | `connect()` | 1 second per try | Soft (called from Connecting only) |
//! | `cyclic_exchange()` | cycle_time_us / 4 | **HARD** |
//! | servo / machining I/O accessors | a few µs | **HARD** |

use thiserror::Error;

use super::cia402::{ControlWord, StatusWord};

/// Error types for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Backend initialization failed.
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// The master could not bring the network to operational.
    #[error("EtherCAT connect failed after {tries} tries: {reason}")]
    ConnectFailed { tries: u32, reason: String },

    /// Process data exchange failed.
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// Operation requires a connected network.
    #[error("Network not connected")]
    NotConnected,
}

/// One servo drive in cyclic synchronous position mode.
///
/// Positions are in blu. Values written here are transmitted on the next
/// `cyclic_exchange`; values read reflect the last exchange.
pub trait ServoDevice: Send {
    /// Set the target position for the next exchange.
    fn set_target_position(&mut self, position: f64);

    /// Last reported actual position.
    fn actual_position(&self) -> f64;

    fn status_word(&self) -> StatusWord;

    fn control_word(&self) -> ControlWord;

    fn set_control_word(&mut self, cw: ControlWord);

    /// Drive in Fault or Fault Reaction Active.
    fn is_fault(&self) -> bool {
        self.status_word().is_fault()
    }

    /// Drive in Operation Enabled.
    fn is_enabled(&self) -> bool {
        self.status_word().is_enabled()
    }
}

/// EtherCAT master capability.
///
/// # Lifecycle
///
/// 1. `connect()` - Scan, configure and bring slaves to OP
/// 2. `cyclic_exchange()` - Called every cycle while connected
/// 3. `disconnect()` - Drop to INIT (also used before a reconnect)
pub trait EthercatNetwork: Send {
    /// Backend identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Try up to `max_tries` times to bring the network to operational.
    fn connect(&mut self, max_tries: u32) -> Result<(), HalError>;

    fn disconnect(&mut self);

    /// Exchange process data once.
    ///
    /// Must not allocate or block. An error means the link is lost;
    /// `is_connected()` reports false afterwards.
    fn cyclic_exchange(&mut self) -> Result<(), HalError>;

    fn is_connected(&self) -> bool;

    /// Distributed-clock system time of the reference slave [ns].
    ///
    /// `None` when the backend has no DC support.
    fn dc_time_ns(&self) -> Option<i64>;

    fn servo_count(&self) -> usize;

    fn servo(&mut self, index: usize) -> Option<&mut dyn ServoDevice>;

    fn servo_ref(&self, index: usize) -> Option<&dyn ServoDevice>;

    /// Every servo is in Operation Enabled.
    fn all_enabled(&self) -> bool {
        let count = self.servo_count();
        count > 0
            && (0..count).all(|i| self.servo_ref(i).is_some_and(|s| s.is_enabled()))
    }

    /// Any servo reports a fault.
    fn any_fault(&self) -> bool {
        (0..self.servo_count()).any(|i| self.servo_ref(i).is_some_and(|s| s.is_fault()))
    }
}

/// EDM machining I/O.
///
/// Live feed distance is produced by the gap-voltage servo: positive
/// values advance along the feed direction, negative values back off.
pub trait MachiningIo: Send {
    /// Feed distance requested by the gap servo for this cycle [blu].
    fn read_live_feed_distance(&mut self) -> f64;

    /// Electrode touches the workpiece.
    fn touch_physically_detected(&self) -> bool;

    /// High-voltage gate of the pulse generator.
    fn set_voltage_gate(&mut self, on: bool);

    fn set_machining_enable(&mut self, on: bool);

    fn set_spindle(&mut self, on: bool);

    fn set_flushing_pump(&mut self, on: bool);
}
