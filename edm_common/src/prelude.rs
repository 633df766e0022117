//! Prelude module for common re-exports.
//!
//! ```rust
//! use edm_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader};
pub use crate::motion::config::MotionConfig;

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{AXIS_SLOTS, CYCLE_TIME_US};

// ─── Value Types ────────────────────────────────────────────────────
pub use crate::axis::AxisVec;
pub use crate::motion::command::{CommandOutcome, CommandTicket, MotionCommand, Waypoints};
pub use crate::motion::plan::{DrillParam, JumpParam, PlanInput};
pub use crate::motion::signal::{MotionSignal, SignalKind};
pub use crate::motion::status::{
    DominatedState, EcatState, JumpPhase, MainMode, RunState, StatusFlags, StatusSnapshot,
    TaskKind, ThreadState,
};

// ─── HAL ────────────────────────────────────────────────────────────
pub use crate::hal::{EthercatNetwork, HalError, MachiningIo, ServoDevice};

/// Default system cycle time as Duration.
pub const DEFAULT_CYCLE_TIME: Duration = Duration::from_micros(CYCLE_TIME_US);
