//! Top-level motion mode dispatcher.
//!
//! ```text
//!          start manual             start auto
//! Manual ◄──────────────── Idle ────────────────► Auto
//!   │  move over / touch    ▲    task over          │
//!   └───────────────────────┘◄──────────────────────┘
//! ```
//!
//! Manual mode runs one point move. Auto mode delegates everything to the
//! [`TaskRunner`]; manual moves requested while an auto task is paused are
//! routed to the runner as pause-time jogs. A start request that conflicts
//! with motion in the other mode is rejected.

use edm_common::axis::AxisVec;
use edm_common::motion::command::MotionCommand;
use edm_common::motion::config::MotionConfig;
use edm_common::motion::plan::PlanInput;
use edm_common::motion::signal::SignalKind;
use edm_common::motion::status::{DominatedState, JumpPhase, MainMode, RunState, TaskKind};
use tracing::{debug, info, warn};

use crate::context::{Auxiliaries, CycleEvents, MotionContext};
use crate::runner::TaskRunner;
use crate::task::{Delay, Drill, FakePause, MotionTask, RapidMove, ServoFeed, TaskSettings};
use crate::vector::VectorMoveHandler;

/// Requests that move the main mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRequest {
    StartManual,
    ManualDone,
    StartAuto,
    AutoDone,
    Reset,
}

/// Result of a mode transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeTransition {
    Ok(MainMode),
    Rejected(&'static str),
}

/// Main mode transition table.
pub fn mode_transition(mode: MainMode, request: ModeRequest) -> ModeTransition {
    use MainMode as M;
    use ModeRequest as R;

    match (mode, request) {
        (_, R::Reset) => ModeTransition::Ok(M::Idle),

        (M::Idle, R::StartManual) => ModeTransition::Ok(M::Manual),
        (M::Idle, R::StartAuto) => ModeTransition::Ok(M::Auto),

        // Pause-time jog; the runner checks that the task is paused.
        (M::Auto, R::StartManual) => ModeTransition::Ok(M::Auto),

        (M::Manual, R::ManualDone) => ModeTransition::Ok(M::Idle),
        (M::Auto, R::AutoDone) => ModeTransition::Ok(M::Idle),

        (M::Manual, R::StartManual | R::StartAuto) => {
            ModeTransition::Rejected("manual move in progress")
        }
        (M::Auto, R::StartAuto) => ModeTransition::Rejected("auto task in progress"),
        (M::Idle, R::ManualDone | R::AutoDone) => ModeTransition::Rejected("nothing running"),
        (M::Manual, R::AutoDone) | (M::Auto, R::ManualDone) => {
            ModeTransition::Rejected("completion from the other mode")
        }
    }
}

/// Owner of all motion below the cycle controller.
#[derive(Debug)]
pub struct MotionModeDispatcher {
    settings: TaskSettings,
    mode: MainMode,
    runner: TaskRunner,
    manual: VectorMoveHandler,
    manual_touch_detect: bool,
    position: AxisVec,
    events: CycleEvents,
}

impl MotionModeDispatcher {
    pub fn new(config: &MotionConfig) -> Self {
        let settings = TaskSettings::from_config(config);
        Self {
            settings,
            mode: MainMode::Idle,
            runner: TaskRunner::new(settings.period_s),
            manual: VectorMoveHandler::new(settings.period_s),
            manual_touch_detect: false,
            position: AxisVec::ZERO,
            events: CycleEvents::default(),
        }
    }

    fn transition(&mut self, request: ModeRequest) -> bool {
        match mode_transition(self.mode, request) {
            ModeTransition::Ok(next) => {
                if next != self.mode {
                    debug!(from = ?self.mode, to = ?next, ?request, "main mode");
                }
                self.mode = next;
                true
            }
            ModeTransition::Rejected(reason) => {
                debug!(mode = ?self.mode, ?request, reason, "mode request rejected");
                false
            }
        }
    }

    /// Advance one cycle and return the commanded position.
    pub fn run_once(&mut self, ctx: &mut MotionContext<'_>) -> AxisVec {
        match self.mode {
            MainMode::Idle => {}
            MainMode::Manual => self.run_manual(ctx),
            MainMode::Auto => {
                self.position = self.runner.run_once(ctx, &mut self.events);
                if self.runner.is_idle() {
                    self.transition(ModeRequest::AutoDone);
                }
            }
        }
        self.position
    }

    fn run_manual(&mut self, ctx: &mut MotionContext<'_>) {
        if self.manual_touch_detect && self.manual.state().is_active() && ctx.touch_detected() {
            self.manual.stop(true);
            self.events.raise_touch_warning();
            warn!(position = ?self.manual.position().0, "manual move stopped by touch");
        } else {
            self.position = self.manual.run_once();
        }
        if self.manual.is_over() {
            self.position = self.manual.position();
            self.transition(ModeRequest::ManualDone);
            self.events.signal(SignalKind::ManualStopped);
        }
    }

    /// Execute a motion command. Returns whether it was accepted.
    ///
    /// Commands that are not about motion are not handled here and return
    /// `false`.
    pub fn handle(&mut self, command: &MotionCommand, ctx: &mut MotionContext<'_>) -> bool {
        // Checked before any task is built; building a feed or drill
        // already switches machining outputs.
        if command.starts_auto_task() && self.mode != MainMode::Idle {
            debug!(mode = ?self.mode, command = command.name(), "auto start rejected");
            return false;
        }
        match command {
            MotionCommand::StartManualPointMove { target, plan, touch_detect } => {
                self.start_manual_pointmove(*target, plan, *touch_detect)
            }
            MotionCommand::StopManualPointMove { immediate } => {
                self.stop_manual_pointmove(*immediate)
            }
            MotionCommand::StartRapidMove { target, plan, touch_detect } => {
                let task =
                    RapidMove::start(&self.settings, self.position, *target, plan, *touch_detect);
                self.start_auto(task.map(MotionTask::Rapid))
            }
            MotionCommand::StartServoFeed { waypoints } => {
                let task = ServoFeed::start(
                    &self.settings,
                    ctx,
                    self.position,
                    waypoints,
                    Auxiliaries::default(),
                );
                self.start_auto(task.map(MotionTask::Feed))
            }
            MotionCommand::StartDelay { seconds } => {
                let task = Delay::start(&self.settings, self.position, *seconds);
                self.start_auto(task.map(MotionTask::Delay))
            }
            MotionCommand::StartFakePause => {
                let accepted =
                    self.start_auto(Some(MotionTask::FakePause(FakePause::start(self.position))));
                if accepted {
                    self.events.signal(SignalKind::AutoNotify);
                }
                accepted
            }
            MotionCommand::StartDrill { target, drill } => {
                let task = Drill::start(&self.settings, ctx, self.position, *target, drill);
                self.start_auto(task.map(MotionTask::Drill))
            }
            MotionCommand::PauseAuto => self.pause_auto(),
            MotionCommand::ResumeAuto => self.resume_auto(),
            MotionCommand::StopAuto { immediate } => self.stop_auto(*immediate),
            MotionCommand::ChangeSpeed { cruise_velocity } => self.change_speed(*cruise_velocity),
            MotionCommand::SetJumpParam(_)
            | MotionCommand::ConnectEthercat
            | MotionCommand::ClearWarning => false,
        }
    }

    // ─── Manual ─────────────────────────────────────────────────────

    pub fn start_manual_pointmove(
        &mut self,
        target: AxisVec,
        plan: &PlanInput,
        touch_detect: bool,
    ) -> bool {
        if let ModeTransition::Rejected(reason) = mode_transition(self.mode, ModeRequest::StartManual) {
            debug!(mode = ?self.mode, reason, "manual move rejected");
            return false;
        }
        let started = match self.mode {
            MainMode::Auto => self.runner.start_manual(target, plan, touch_detect),
            _ => {
                let ok = self.manual.start(self.position, target, plan);
                if ok {
                    self.manual_touch_detect = touch_detect;
                    self.transition(ModeRequest::StartManual);
                }
                ok
            }
        };
        if started {
            self.events.signal(SignalKind::ManualStarted);
        }
        started
    }

    pub fn stop_manual_pointmove(&mut self, immediate: bool) -> bool {
        match self.mode {
            MainMode::Manual => self.manual.stop(immediate),
            MainMode::Auto => self.runner.stop_manual(immediate),
            MainMode::Idle => false,
        }
    }

    // ─── Auto ───────────────────────────────────────────────────────

    fn start_auto(&mut self, task: Option<MotionTask>) -> bool {
        if self.mode != MainMode::Idle {
            debug!(mode = ?self.mode, "auto start rejected");
            return false;
        }
        let Some(task) = task else {
            debug!("auto task rejected at construction");
            return false;
        };
        if !self.runner.start(task) {
            return false;
        }
        self.transition(ModeRequest::StartAuto);
        self.events.signal(SignalKind::AutoStarted);
        true
    }

    pub fn pause_auto(&mut self) -> bool {
        self.mode == MainMode::Auto && self.runner.pause()
    }

    pub fn resume_auto(&mut self) -> bool {
        self.mode == MainMode::Auto && self.runner.resume()
    }

    pub fn stop_auto(&mut self, immediate: bool) -> bool {
        self.mode == MainMode::Auto && self.runner.stop(immediate)
    }

    /// Speed override for the active manual move or rapid move.
    pub fn change_speed(&mut self, cruise_velocity: f64) -> bool {
        match self.mode {
            MainMode::Manual => self.manual.change_speed(cruise_velocity),
            MainMode::Auto => self.runner.change_speed(cruise_velocity),
            MainMode::Idle => false,
        }
    }

    // ─── Lifecycle ──────────────────────────────────────────────────

    /// Drop all motion, switch the generator off and return to Idle.
    pub fn reset(&mut self, ctx: &mut MotionContext<'_>) {
        if self.mode != MainMode::Idle {
            info!(mode = ?self.mode, "motion reset");
        }
        self.runner.reset();
        self.manual.stop(true);
        ctx.set_machining(false, Auxiliaries { spindle: true, flushing_pump: true });
        self.transition(ModeRequest::Reset);
    }

    /// Adopt the actual position while nothing is commanded.
    pub fn sync_position(&mut self, actual: AxisVec) {
        if self.mode == MainMode::Idle {
            self.position = actual;
            self.runner.sync_position(actual);
        }
    }

    // ─── Queries ────────────────────────────────────────────────────

    #[inline]
    pub fn mode(&self) -> MainMode {
        self.mode
    }

    #[inline]
    pub fn position(&self) -> AxisVec {
        self.position
    }

    pub fn auto_state(&self) -> RunState {
        self.runner.state()
    }

    pub fn dominated(&self) -> DominatedState {
        self.runner.dominated()
    }

    pub fn task_kind(&self) -> TaskKind {
        self.runner.task_kind()
    }

    pub fn jump_phase(&self) -> JumpPhase {
        self.runner.jump_phase()
    }

    /// Touch protection armed for the current move.
    pub fn touch_armed(&self) -> bool {
        match self.mode {
            MainMode::Manual => self.manual_touch_detect && self.manual.state().is_active(),
            MainMode::Auto => self.runner.touch_armed(),
            MainMode::Idle => false,
        }
    }

    #[inline]
    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    /// Transitions noted since the last [`clear_events`](Self::clear_events).
    #[inline]
    pub fn events(&self) -> &CycleEvents {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}
