//! Status snapshot and state enums published by the real-time thread.
//!
//! The snapshot is a plain `Copy` value written once per cycle and copied
//! out by any number of consumer threads.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::axis::AxisVec;

/// Top-level motion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum MainMode {
    #[default]
    Idle = 0,
    Manual = 1,
    Auto = 2,
}

/// Lifecycle state shared by planner wrappers, tasks and the task runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum RunState {
    #[default]
    NotStarted = 0,
    Running = 1,
    Pausing = 2,
    Paused = 3,
    Resuming = 4,
    Stopping = 5,
    Stopped = 6,
}

impl RunState {
    /// Whether motion may still be produced.
    #[inline]
    pub const fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Running | Self::Pausing | Self::Resuming | Self::Stopping
        )
    }
}

/// Which side of the task runner currently produces positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum DominatedState {
    /// The auto task itself.
    #[default]
    TaskRunning = 0,
    /// Reverse replay of pause-time manual moves.
    PauseRecoverRunning = 1,
}

/// Kind of the current auto task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TaskKind {
    #[default]
    None = 0,
    RapidMove = 1,
    ServoFeed = 2,
    Delay = 3,
    FakePause = 4,
    Drill = 5,
}

/// Phase of the servo-feed jump cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum JumpPhase {
    #[default]
    Servoing = 0,
    JumpRetracting = 1,
    JumpApproaching = 2,
    JumpApproachBuffer = 3,
}

/// EtherCAT connect/enable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum EcatState {
    #[default]
    Init = 0,
    Disconnected = 1,
    Connecting = 2,
    ConnectedNotAllEnabled = 3,
    ConnectedEnabling = 4,
    Ready = 5,
}

/// Lifecycle of the real-time thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ThreadState {
    #[default]
    Init = 0,
    Running = 1,
    Stopping = 2,
    CanExit = 3,
}

bitflags! {
    /// Status bits for upper layers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StatusFlags: u16 {
        /// EtherCAT master connected.
        const ECAT_CONNECTED       = 0x0001;
        /// All servo drives in Operation Enabled.
        const ECAT_ALL_ENABLED     = 0x0002;
        /// Ready was lost (connectivity or enable); cleared on next Ready.
        const HARDWARE_FAULT       = 0x0004;
        /// Touch detection armed for the current move.
        const TOUCH_DETECT_ENABLED = 0x0008;
        /// Physical touch currently detected.
        const TOUCH_DETECTED       = 0x0010;
        /// A protected move was stopped by touch; cleared by command.
        const TOUCH_WARNING        = 0x0020;
        /// At least one signal was dropped because the queue was full.
        const SIGNALS_DROPPED      = 0x0040;
    }
}

impl Default for StatusFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Cycle timing statistics [ns].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CycleTiming {
    pub cycle_count: u64,
    pub last_cycle_ns: i64,
    pub max_cycle_ns: i64,
    pub avg_cycle_ns: i64,
    pub max_latency_ns: i64,
    pub overruns: u64,
    /// Last cycle's phase durations: ethercat, motion, command, publish.
    pub phase_ns: [i64; 4],
}

/// Per-cycle status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Cycle counter at publication.
    pub cycle: u64,
    /// Commanded axis positions [blu].
    pub commanded: AxisVec,
    /// Actual axis positions read back from the drives [blu].
    pub actual: AxisVec,
    pub main_mode: MainMode,
    pub auto_state: RunState,
    pub dominated: DominatedState,
    pub task_kind: TaskKind,
    pub jump_phase: JumpPhase,
    pub ecat_state: EcatState,
    pub thread_state: ThreadState,
    pub flags: StatusFlags,
    /// Current DC-sync wake offset [ns].
    pub dc_offset_ns: i64,
    pub timing: CycleTiming,
}

impl StatusSnapshot {
    #[inline]
    pub fn ecat_ready(&self) -> bool {
        self.ecat_state == EcatState::Ready
    }

    #[inline]
    pub fn has(&self, flag: StatusFlags) -> bool {
        self.flags.contains(flag)
    }
}

static_assertions::assert_impl_all!(StatusSnapshot: Copy, Send, Sync);
