//! Motion command vocabulary.
//!
//! Producers wrap a [`MotionCommand`] in a [`CommandTicket`], push it onto
//! the command queue and keep an `Arc` to poll the outcome. The real-time
//! thread resolves each ticket exactly once to `Accepted` or `Ignored`;
//! producers never touch consumer-owned state.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::axis::AxisVec;
use crate::consts::MAX_WAYPOINTS;

use super::plan::{DrillParam, JumpParam, PlanInput};

/// Absolute waypoints of a servo-feed path (fixed capacity, RT-safe).
pub type Waypoints = heapless::Vec<AxisVec, MAX_WAYPOINTS>;

/// A single request to the motion core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MotionCommand {
    /// Manual point move to an absolute target.
    StartManualPointMove {
        target: AxisVec,
        plan: PlanInput,
        /// Stop immediately on physical touch.
        touch_detect: bool,
    },
    /// Stop the running manual point move.
    StopManualPointMove { immediate: bool },
    /// Rapid (G00) move to an absolute target.
    StartRapidMove {
        target: AxisVec,
        plan: PlanInput,
        touch_detect: bool,
    },
    /// Servo-feed machining along concatenated linear segments.
    StartServoFeed { waypoints: Waypoints },
    /// Dwell for the given time.
    StartDelay { seconds: f64 },
    /// Operator-acknowledged hold point.
    StartFakePause,
    /// Drilling along the line to `target`.
    StartDrill { target: AxisVec, drill: DrillParam },
    /// Pause the auto task.
    PauseAuto,
    /// Resume the auto task (replays pause-time manual moves first).
    ResumeAuto,
    /// Stop the auto task.
    StopAuto { immediate: bool },
    /// Override the cruise velocity of the active point move.
    ChangeSpeed { cruise_velocity: f64 },
    /// Replace the jump parameters.
    SetJumpParam(JumpParam),
    /// Request an EtherCAT connect attempt.
    ConnectEthercat,
    /// Clear the touch warning bit.
    ClearWarning,
}

impl MotionCommand {
    /// Short name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StartManualPointMove { .. } => "StartManualPointMove",
            Self::StopManualPointMove { .. } => "StopManualPointMove",
            Self::StartRapidMove { .. } => "StartRapidMove",
            Self::StartServoFeed { .. } => "StartServoFeed",
            Self::StartDelay { .. } => "StartDelay",
            Self::StartFakePause => "StartFakePause",
            Self::StartDrill { .. } => "StartDrill",
            Self::PauseAuto => "PauseAuto",
            Self::ResumeAuto => "ResumeAuto",
            Self::StopAuto { .. } => "StopAuto",
            Self::ChangeSpeed { .. } => "ChangeSpeed",
            Self::SetJumpParam(_) => "SetJumpParam",
            Self::ConnectEthercat => "ConnectEthercat",
            Self::ClearWarning => "ClearWarning",
        }
    }

    /// Whether the command starts an auto task.
    pub const fn starts_auto_task(&self) -> bool {
        matches!(
            self,
            Self::StartRapidMove { .. }
                | Self::StartServoFeed { .. }
                | Self::StartDelay { .. }
                | Self::StartFakePause
                | Self::StartDrill { .. }
        )
    }
}

/// Outcome of a submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandOutcome {
    /// Not yet processed by the real-time thread.
    Pending = 0,
    /// Executed.
    Accepted = 1,
    /// Rejected in the current state.
    Ignored = 2,
}

impl CommandOutcome {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::Accepted),
            2 => Some(Self::Ignored),
            _ => None,
        }
    }
}

/// A command plus its atomically published outcome.
#[derive(Debug)]
pub struct CommandTicket {
    seq: u64,
    command: MotionCommand,
    outcome: AtomicU8,
}

static_assertions::assert_impl_all!(CommandTicket: Send, Sync);

impl CommandTicket {
    pub fn new(seq: u64, command: MotionCommand) -> Self {
        Self {
            seq,
            command,
            outcome: AtomicU8::new(CommandOutcome::Pending as u8),
        }
    }

    /// Submission sequence number.
    #[inline]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[inline]
    pub fn command(&self) -> &MotionCommand {
        &self.command
    }

    /// Current outcome (poll only).
    #[inline]
    pub fn outcome(&self) -> CommandOutcome {
        CommandOutcome::from_u8(self.outcome.load(Ordering::Acquire))
            .unwrap_or(CommandOutcome::Pending)
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.outcome() != CommandOutcome::Pending
    }

    /// Publish the outcome. Only the first call has an effect.
    ///
    /// Returns `false` if the ticket was already resolved.
    pub fn resolve(&self, accepted: bool) -> bool {
        let value = if accepted {
            CommandOutcome::Accepted
        } else {
            CommandOutcome::Ignored
        };
        self.outcome
            .compare_exchange(
                CommandOutcome::Pending as u8,
                value as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_roundtrip() {
        for v in 0..=2u8 {
            let o = CommandOutcome::from_u8(v).unwrap();
            assert_eq!(o as u8, v);
        }
        assert!(CommandOutcome::from_u8(3).is_none());
    }

    #[test]
    fn ticket_resolves_once() {
        let t = CommandTicket::new(7, MotionCommand::PauseAuto);
        assert_eq!(t.seq(), 7);
        assert_eq!(t.outcome(), CommandOutcome::Pending);
        assert!(!t.is_resolved());

        assert!(t.resolve(false));
        assert_eq!(t.outcome(), CommandOutcome::Ignored);

        // Second resolution has no effect.
        assert!(!t.resolve(true));
        assert_eq!(t.outcome(), CommandOutcome::Ignored);
    }

    #[test]
    fn auto_task_classification() {
        assert!(MotionCommand::StartFakePause.starts_auto_task());
        assert!(MotionCommand::StartDelay { seconds: 1.0 }.starts_auto_task());
        assert!(!MotionCommand::PauseAuto.starts_auto_task());
        assert!(!MotionCommand::StopManualPointMove { immediate: false }.starts_auto_task());
        assert_eq!(MotionCommand::ClearWarning.name(), "ClearWarning");
    }
}
