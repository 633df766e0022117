//! Auto-mode motion tasks.
//!
//! A task is created already running and exposes one flat capability set:
//! `run_once`, `pause`, `resume`, `stop` and state queries. [`MotionTask`]
//! is the tagged union the task runner owns.
//!
//! | Task | Motion | Pause | Stop |
//! |------|--------|-------|------|
//! | [`RapidMove`] | jerk-limited point move | decelerate | decelerate / immediate |
//! | [`ServoFeed`] | live gap-servo feed with jumps | after jump | after jump / immediate |
//! | [`Delay`] | none | freeze counter | complete |
//! | [`FakePause`] | none | always paused | complete |
//! | [`Drill`] | servo feed plus spindle and pump | after jump | after jump / immediate |

pub mod delay;
pub mod drill;
pub mod fake_pause;
pub mod feed;
pub mod rapid;

pub use delay::Delay;
pub use drill::Drill;
pub use fake_pause::FakePause;
pub use feed::ServoFeed;
pub use rapid::RapidMove;

use edm_common::axis::AxisVec;
use edm_common::motion::config::MotionConfig;
use edm_common::motion::status::{JumpPhase, RunState, TaskKind};

use crate::context::MotionContext;

/// Construction parameters shared by all tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskSettings {
    /// Servo cycle period [s].
    pub period_s: f64,
    /// Distance a jump retract stays in front of the path start [blu].
    pub jump_start_margin: f64,
}

impl TaskSettings {
    pub fn from_config(config: &MotionConfig) -> Self {
        Self {
            period_s: config.cycle_period_s(),
            jump_start_margin: config.feed.jump_start_margin,
        }
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self::from_config(&MotionConfig::default())
    }
}

/// One auto task.
#[derive(Debug)]
pub enum MotionTask {
    Rapid(RapidMove),
    Feed(ServoFeed),
    Delay(Delay),
    FakePause(FakePause),
    Drill(Drill),
}

impl MotionTask {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Rapid(_) => TaskKind::RapidMove,
            Self::Feed(_) => TaskKind::ServoFeed,
            Self::Delay(_) => TaskKind::Delay,
            Self::FakePause(_) => TaskKind::FakePause,
            Self::Drill(_) => TaskKind::Drill,
        }
    }

    /// Advance one cycle and return the commanded position.
    pub fn run_once(&mut self, ctx: &mut MotionContext<'_>) -> AxisVec {
        match self {
            Self::Rapid(t) => t.run_once(ctx),
            Self::Feed(t) => t.run_once(ctx),
            Self::Delay(t) => t.run_once(),
            Self::FakePause(t) => t.run_once(),
            Self::Drill(t) => t.run_once(ctx),
        }
    }

    pub fn pause(&mut self) -> bool {
        match self {
            Self::Rapid(t) => t.pause(),
            Self::Feed(t) => t.pause(),
            Self::Delay(t) => t.pause(),
            Self::FakePause(t) => t.pause(),
            Self::Drill(t) => t.pause(),
        }
    }

    pub fn resume(&mut self) -> bool {
        match self {
            Self::Rapid(t) => t.resume(),
            Self::Feed(t) => t.resume(),
            Self::Delay(t) => t.resume(),
            Self::FakePause(t) => t.resume(),
            Self::Drill(t) => t.resume(),
        }
    }

    pub fn stop(&mut self, immediate: bool) -> bool {
        match self {
            Self::Rapid(t) => t.stop(immediate),
            Self::Feed(t) => t.stop(immediate),
            Self::Delay(t) => t.stop(immediate),
            Self::FakePause(t) => t.stop(immediate),
            Self::Drill(t) => t.stop(immediate),
        }
    }

    /// Speed override; only point moves accept it.
    pub fn change_speed(&mut self, cruise_velocity: f64) -> bool {
        match self {
            Self::Rapid(t) => t.change_speed(cruise_velocity),
            _ => false,
        }
    }

    pub fn state(&self) -> RunState {
        match self {
            Self::Rapid(t) => t.state(),
            Self::Feed(t) => t.state(),
            Self::Delay(t) => t.state(),
            Self::FakePause(t) => t.state(),
            Self::Drill(t) => t.state(),
        }
    }

    /// Last commanded position; frozen once the task is over.
    pub fn position(&self) -> AxisVec {
        match self {
            Self::Rapid(t) => t.position(),
            Self::Feed(t) => t.position(),
            Self::Delay(t) => t.position(),
            Self::FakePause(t) => t.position(),
            Self::Drill(t) => t.position(),
        }
    }

    pub fn jump_phase(&self) -> JumpPhase {
        match self {
            Self::Feed(t) => t.jump_phase(),
            Self::Drill(t) => t.jump_phase(),
            _ => JumpPhase::Servoing,
        }
    }

    /// Touch protection armed for this task.
    pub fn touch_armed(&self) -> bool {
        matches!(self, Self::Rapid(t) if t.touch_detect() && t.state().is_active())
    }

    /// A protected rapid move was stopped by touch.
    pub fn touch_stopped(&self) -> bool {
        matches!(self, Self::Rapid(t) if t.touch_stopped())
    }

    #[inline]
    pub fn is_normal_running(&self) -> bool {
        self.state() == RunState::Running
    }

    #[inline]
    pub fn is_pausing(&self) -> bool {
        self.state() == RunState::Pausing
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.state() == RunState::Paused
    }

    #[inline]
    pub fn is_resuming(&self) -> bool {
        self.state() == RunState::Resuming
    }

    #[inline]
    pub fn is_stopping(&self) -> bool {
        self.state() == RunState::Stopping
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.state() == RunState::Stopped
    }

    /// The task produced its last position.
    #[inline]
    pub fn is_over(&self) -> bool {
        self.is_stopped()
    }
}
