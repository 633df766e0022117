//! Auto task execution with pause-time manual moves.
//!
//! The runner owns the current [`MotionTask`] and adds a second axis to its
//! state, [`DominatedState`]:
//!
//! - `TaskRunning`: the task produces the position.
//! - `PauseRecoverRunning`: the [`PauseRecoveryController`] is driving the
//!   axis back along the manual moves made during the pause.
//!
//! While the task is paused the operator may jog with manual point moves.
//! Each finished jog is recorded; `resume` first replays the recorder in
//! reverse and only then resumes the task itself.

pub mod recovery;

pub use recovery::{AxisRecord, AxisRecorder, PauseRecoveryController, RecoveryStep};

use edm_common::axis::AxisVec;
use edm_common::motion::plan::PlanInput;
use edm_common::motion::signal::SignalKind;
use edm_common::motion::status::{DominatedState, JumpPhase, RunState, TaskKind};
use tracing::{debug, info, warn};

use crate::context::{CycleEvents, MotionContext};
use crate::task::MotionTask;
use crate::vector::VectorMoveHandler;

/// Owner of the auto task.
#[derive(Debug)]
pub struct TaskRunner {
    task: Option<MotionTask>,
    dominated: DominatedState,
    recorder: AxisRecorder,
    recovery: PauseRecoveryController,
    manual: VectorMoveHandler,
    manual_active: bool,
    manual_touch_detect: bool,
    manual_start: AxisVec,
    manual_plan: PlanInput,
    /// Pause-time jogs moved the axis away from the task's own position.
    displaced: bool,
    /// Runner state at the end of the previous cycle.
    last_state: RunState,
    position: AxisVec,
}

impl TaskRunner {
    pub fn new(period_s: f64) -> Self {
        Self {
            task: None,
            dominated: DominatedState::TaskRunning,
            recorder: AxisRecorder::new(),
            recovery: PauseRecoveryController::new(period_s),
            manual: VectorMoveHandler::new(period_s),
            manual_active: false,
            manual_touch_detect: false,
            manual_start: AxisVec::ZERO,
            manual_plan: PlanInput::default(),
            displaced: false,
            last_state: RunState::NotStarted,
            position: AxisVec::ZERO,
        }
    }

    /// Take ownership of a freshly started task. Rejected while another
    /// task is loaded.
    pub fn start(&mut self, task: MotionTask) -> bool {
        if self.task.is_some() {
            return false;
        }
        self.position = task.position();
        self.last_state = task.state();
        self.dominated = DominatedState::TaskRunning;
        self.recorder.clear();
        self.recovery.reset();
        self.displaced = false;
        info!(task = ?task.kind(), "auto task started");
        self.task = Some(task);
        true
    }

    /// Advance one cycle and return the commanded position.
    ///
    /// Drops the task once it is over and reports `AutoStopped`.
    pub fn run_once(&mut self, ctx: &mut MotionContext<'_>, events: &mut CycleEvents) -> AxisVec {
        if self.task.is_none() {
            return self.position;
        }

        if self.manual_active {
            self.run_manual(ctx, events);
        } else if self.dominated == DominatedState::PauseRecoverRunning {
            self.run_recovery();
        } else if let Some(task) = self.task.as_mut() {
            let position = task.run_once(ctx);
            // A task stopped after jogs stays where the jogs left the axis.
            if !self.displaced {
                self.position = position;
            }
            if task.touch_stopped() {
                events.raise_touch_warning();
            }
        }

        self.report(events);
        self.position
    }

    fn run_manual(&mut self, ctx: &mut MotionContext<'_>, events: &mut CycleEvents) {
        if self.manual_touch_detect && self.manual.state().is_active() && ctx.touch_detected() {
            self.manual.stop(true);
            events.raise_touch_warning();
            warn!(position = ?self.manual.position().0, "pause jog stopped by touch");
        } else {
            self.position = self.manual.run_once();
        }

        if self.manual.is_over() {
            self.manual_active = false;
            self.position = self.manual.position();
            let recorded = self.recorder.push(AxisRecord {
                start: self.manual_start,
                stop: self.position,
                plan: self.manual_plan,
            });
            self.displaced |= recorded;
            debug!(recorded, entries = self.recorder.len(), "pause jog finished");
            events.signal(SignalKind::ManualStopped);
        }
    }

    fn run_recovery(&mut self) {
        let (position, step) = self.recovery.run_once(&mut self.recorder, self.position);
        self.position = position;
        if step == RecoveryStep::Busy {
            return;
        }
        self.dominated = DominatedState::TaskRunning;
        let Some(task) = self.task.as_mut() else {
            return;
        };
        match step {
            RecoveryStep::Over => {
                self.displaced = false;
                if !task.resume() {
                    warn!(state = ?task.state(), "task refused resume after recovery");
                }
            }
            RecoveryStep::Stopped => {
                task.stop(false);
            }
            RecoveryStep::Paused | RecoveryStep::Busy => {}
        }
    }

    fn report(&mut self, events: &mut CycleEvents) {
        let state = self.state();
        let before = self.last_state;
        self.last_state = state;

        if state != before {
            match state {
                RunState::Paused => events.signal(SignalKind::AutoPaused),
                RunState::Running if matches!(before, RunState::Paused | RunState::Resuming) => {
                    events.signal(SignalKind::AutoResumed)
                }
                _ => {}
            }
        }

        if !self.manual_active && self.task.as_ref().is_some_and(MotionTask::is_over) {
            info!(position = ?self.position.0, "auto task finished");
            self.task = None;
            self.dominated = DominatedState::TaskRunning;
            self.recorder.clear();
            self.last_state = RunState::NotStarted;
            events.signal(SignalKind::AutoStopped);
        }
    }

    // ─── Requests ───────────────────────────────────────────────────

    pub fn pause(&mut self) -> bool {
        if self.manual_active {
            return false;
        }
        let Some(task) = self.task.as_mut() else {
            return false;
        };
        match self.dominated {
            DominatedState::PauseRecoverRunning => self.recovery.pause(),
            DominatedState::TaskRunning => task.pause(),
        }
    }

    /// Resume a paused task, replaying pause-time jogs first.
    pub fn resume(&mut self) -> bool {
        if self.manual_active || self.dominated != DominatedState::TaskRunning {
            return false;
        }
        let Some(task) = self.task.as_mut() else {
            return false;
        };
        if task.state() != RunState::Paused {
            return false;
        }
        if self.recorder.is_empty() {
            return task.resume();
        }
        info!(entries = self.recorder.len(), "pause recovery started");
        self.recovery.begin();
        self.dominated = DominatedState::PauseRecoverRunning;
        true
    }

    /// Stop the task. A running jog or recovery is abandoned first.
    pub fn stop(&mut self, immediate: bool) -> bool {
        let Some(task) = self.task.as_mut() else {
            return false;
        };
        if self.manual_active {
            self.manual.stop(true);
        }
        match self.dominated {
            DominatedState::PauseRecoverRunning if !immediate => self.recovery.stop(false),
            DominatedState::PauseRecoverRunning => {
                self.recovery.reset();
                self.recorder.clear();
                self.dominated = DominatedState::TaskRunning;
                task.stop(true)
            }
            DominatedState::TaskRunning => {
                self.recorder.clear();
                task.stop(immediate)
            }
        }
    }

    pub fn change_speed(&mut self, cruise_velocity: f64) -> bool {
        if self.manual_active {
            return self.manual.change_speed(cruise_velocity);
        }
        match self.task.as_mut() {
            Some(task) if self.dominated == DominatedState::TaskRunning => {
                task.change_speed(cruise_velocity)
            }
            _ => false,
        }
    }

    /// Jog while the task is paused.
    pub fn start_manual(&mut self, target: AxisVec, plan: &PlanInput, touch_detect: bool) -> bool {
        let paused = self.task.as_ref().is_some_and(MotionTask::is_paused);
        if !paused || self.manual_active || self.dominated != DominatedState::TaskRunning {
            return false;
        }
        if !self.manual.start(self.position, target, plan) {
            return false;
        }
        self.manual_active = true;
        self.manual_touch_detect = touch_detect;
        self.manual_start = self.position;
        self.manual_plan = *plan;
        true
    }

    pub fn stop_manual(&mut self, immediate: bool) -> bool {
        self.manual_active && self.manual.stop(immediate)
    }

    /// Drop the task, the recorder and any jog or recovery.
    pub fn reset(&mut self) {
        self.task = None;
        self.dominated = DominatedState::TaskRunning;
        self.recorder.clear();
        self.recovery.reset();
        self.manual.stop(true);
        self.manual_active = false;
        self.displaced = false;
        self.last_state = RunState::NotStarted;
    }

    /// Re-seed the commanded position while idle.
    pub fn sync_position(&mut self, position: AxisVec) {
        if self.task.is_none() {
            self.position = position;
        }
    }

    // ─── Queries ────────────────────────────────────────────────────

    /// Auto state as seen from outside; `NotStarted` when idle.
    pub fn state(&self) -> RunState {
        let Some(task) = &self.task else {
            return RunState::NotStarted;
        };
        if self.dominated == DominatedState::PauseRecoverRunning {
            return match self.recovery.state() {
                RunState::Pausing => RunState::Pausing,
                RunState::Stopping => RunState::Stopping,
                _ => RunState::Resuming,
            };
        }
        task.state()
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.task.is_none()
    }

    #[inline]
    pub fn dominated(&self) -> DominatedState {
        self.dominated
    }

    pub fn task_kind(&self) -> TaskKind {
        self.task.as_ref().map_or(TaskKind::None, MotionTask::kind)
    }

    pub fn jump_phase(&self) -> JumpPhase {
        self.task.as_ref().map_or(JumpPhase::Servoing, MotionTask::jump_phase)
    }

    #[inline]
    pub fn task(&self) -> Option<&MotionTask> {
        self.task.as_ref()
    }

    /// Touch protection armed for the jog or the task.
    pub fn touch_armed(&self) -> bool {
        if self.manual_active {
            return self.manual_touch_detect;
        }
        self.task.as_ref().is_some_and(MotionTask::touch_armed)
    }

    #[inline]
    pub fn is_manual_active(&self) -> bool {
        self.manual_active
    }

    #[inline]
    pub fn recorder(&self) -> &AxisRecorder {
        &self.recorder
    }

    #[inline]
    pub fn position(&self) -> AxisVec {
        self.position
    }
}
