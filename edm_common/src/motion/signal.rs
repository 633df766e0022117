//! Motion signals emitted by the real-time thread.
//!
//! At most one signal per transition per cycle, each carrying the status
//! snapshot valid at emission time.

use serde::{Deserialize, Serialize};

use super::status::StatusSnapshot;

/// Transition that produced a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignalKind {
    ManualStarted = 0,
    ManualStopped = 1,
    AutoStarted = 2,
    AutoPaused = 3,
    AutoResumed = 4,
    AutoStopped = 5,
    /// Operator attention needed inside an auto task (hold point reached).
    AutoNotify = 6,
}

/// A signal plus the status at emission time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSignal {
    pub kind: SignalKind,
    pub status: StatusSnapshot,
}

impl MotionSignal {
    pub const fn new(kind: SignalKind, status: StatusSnapshot) -> Self {
        Self { kind, status }
    }
}
