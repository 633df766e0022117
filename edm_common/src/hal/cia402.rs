//! CiA-402 drive profile status/control words.
//!
//! Only the power state machine is modelled: decoding the drive state from
//! the status word and stepping the control word towards Operation Enabled.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Status word (object 0x6041).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StatusWord: u16 {
        const READY_TO_SWITCH_ON  = 0x0001;
        const SWITCHED_ON         = 0x0002;
        const OPERATION_ENABLED   = 0x0004;
        const FAULT               = 0x0008;
        const VOLTAGE_ENABLED     = 0x0010;
        /// Active low: cleared while a quick stop is active.
        const QUICK_STOP          = 0x0020;
        const SWITCH_ON_DISABLED  = 0x0040;
        const WARNING             = 0x0080;
        const REMOTE              = 0x0200;
        const TARGET_REACHED      = 0x0400;
    }
}

bitflags! {
    /// Control word (object 0x6040).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ControlWord: u16 {
        const SWITCH_ON        = 0x0001;
        const ENABLE_VOLTAGE   = 0x0002;
        /// Active low: clearing it requests a quick stop.
        const QUICK_STOP       = 0x0004;
        const ENABLE_OPERATION = 0x0008;
        const FAULT_RESET      = 0x0080;
        const HALT             = 0x0100;
    }
}

impl ControlWord {
    pub const DISABLE_VOLTAGE: Self = Self::empty();
    pub const SHUTDOWN: Self =
        Self::from_bits_truncate(Self::ENABLE_VOLTAGE.bits() | Self::QUICK_STOP.bits());
    pub const SWITCH_ON_CMD: Self = Self::from_bits_truncate(
        Self::SWITCH_ON.bits() | Self::ENABLE_VOLTAGE.bits() | Self::QUICK_STOP.bits(),
    );
    pub const ENABLE_OPERATION_CMD: Self = Self::from_bits_truncate(
        Self::SWITCH_ON.bits()
            | Self::ENABLE_VOLTAGE.bits()
            | Self::QUICK_STOP.bits()
            | Self::ENABLE_OPERATION.bits(),
    );
}

impl Default for StatusWord {
    fn default() -> Self {
        Self::empty()
    }
}

impl Default for ControlWord {
    fn default() -> Self {
        Self::empty()
    }
}

/// Drive power state decoded from the status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriveState {
    NotReadyToSwitchOn,
    SwitchOnDisabled,
    ReadyToSwitchOn,
    SwitchedOn,
    OperationEnabled,
    QuickStopActive,
    FaultReactionActive,
    Fault,
}

impl StatusWord {
    /// Decode the power state (CiA-402 table 30).
    pub fn drive_state(&self) -> DriveState {
        let raw = self.bits();
        match (raw & 0x004F, raw & 0x006F) {
            (0x0000, _) => DriveState::NotReadyToSwitchOn,
            (0x0040, _) => DriveState::SwitchOnDisabled,
            (0x000F, _) => DriveState::FaultReactionActive,
            (0x0008, _) => DriveState::Fault,
            (_, 0x0021) => DriveState::ReadyToSwitchOn,
            (_, 0x0023) => DriveState::SwitchedOn,
            (_, 0x0027) => DriveState::OperationEnabled,
            (_, 0x0007) => DriveState::QuickStopActive,
            _ => DriveState::NotReadyToSwitchOn,
        }
    }

    #[inline]
    pub fn is_fault(&self) -> bool {
        matches!(
            self.drive_state(),
            DriveState::Fault | DriveState::FaultReactionActive
        )
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.drive_state() == DriveState::OperationEnabled
    }

    /// Status word a compliant drive reports in `state`.
    pub const fn for_state(state: DriveState) -> Self {
        let raw = match state {
            DriveState::NotReadyToSwitchOn => 0x0000,
            DriveState::SwitchOnDisabled => 0x0040,
            DriveState::ReadyToSwitchOn => 0x0031,
            DriveState::SwitchedOn => 0x0033,
            DriveState::OperationEnabled => 0x0037,
            DriveState::QuickStopActive => 0x0017,
            DriveState::FaultReactionActive => 0x001F,
            DriveState::Fault => 0x0018,
        };
        Self::from_bits_truncate(raw)
    }
}

/// Next control word on the way to Operation Enabled.
///
/// Fault reset needs a rising edge on bit 7, so a fault alternates between
/// `FAULT_RESET` and an empty word. `FaultReactionActive` keeps the previous
/// word until the drive settles in `Fault`.
pub fn next_enable_step(state: DriveState, previous: ControlWord) -> ControlWord {
    match state {
        DriveState::Fault => {
            if previous.contains(ControlWord::FAULT_RESET) {
                ControlWord::DISABLE_VOLTAGE
            } else {
                ControlWord::FAULT_RESET
            }
        }
        DriveState::FaultReactionActive => previous,
        DriveState::NotReadyToSwitchOn | DriveState::SwitchOnDisabled => ControlWord::SHUTDOWN,
        DriveState::ReadyToSwitchOn => ControlWord::SWITCH_ON_CMD,
        DriveState::SwitchedOn | DriveState::OperationEnabled => {
            ControlWord::ENABLE_OPERATION_CMD
        }
        DriveState::QuickStopActive => ControlWord::DISABLE_VOLTAGE,
    }
}

/// Transition a drive performs for `cw` in `state` (device side).
///
/// Used by simulated drives; returns `state` when the word requests nothing
/// applicable.
pub fn apply_control_word(state: DriveState, previous: ControlWord, cw: ControlWord) -> DriveState {
    let fault_reset_edge =
        cw.contains(ControlWord::FAULT_RESET) && !previous.contains(ControlWord::FAULT_RESET);
    match state {
        DriveState::Fault if fault_reset_edge => DriveState::SwitchOnDisabled,
        DriveState::Fault | DriveState::FaultReactionActive => state,
        DriveState::NotReadyToSwitchOn => DriveState::SwitchOnDisabled,
        _ if !cw.contains(ControlWord::ENABLE_VOLTAGE) => DriveState::SwitchOnDisabled,
        _ if !cw.contains(ControlWord::QUICK_STOP) => match state {
            DriveState::OperationEnabled => DriveState::QuickStopActive,
            DriveState::QuickStopActive => state,
            _ => DriveState::SwitchOnDisabled,
        },
        DriveState::SwitchOnDisabled => DriveState::ReadyToSwitchOn,
        DriveState::ReadyToSwitchOn if cw.contains(ControlWord::SWITCH_ON) => {
            DriveState::SwitchedOn
        }
        DriveState::SwitchedOn if !cw.contains(ControlWord::SWITCH_ON) => {
            DriveState::ReadyToSwitchOn
        }
        DriveState::SwitchedOn if cw.contains(ControlWord::ENABLE_OPERATION) => {
            DriveState::OperationEnabled
        }
        DriveState::OperationEnabled if !cw.contains(ControlWord::ENABLE_OPERATION) => {
            DriveState::SwitchedOn
        }
        _ => state,
    }
}
