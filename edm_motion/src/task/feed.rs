//! Servo feed (G01 under gap control) with periodic jumps.
//!
//! The axis advances along a polyline by whatever distance the gap servo
//! reports each cycle. Every `dwell_ms` of machining the electrode jumps:
//!
//! ```text
//! Servoing ──dwell──► JumpRetracting ──► JumpApproaching ──► JumpApproachBuffer ──► Servoing
//!    ▲                 (planned, −dir)     (planned, to B      (live feed over the        │
//!    │                                      before pre-jump)    last B blu)               │
//!    └────────────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pause and stop requests are held (`Pausing` / `Stopping`) while a jump is
//! in flight and land on the first cycle back in `Servoing`, switching the
//! generator off. The path cursor never moves during a jump, so a full jump
//! cycle adds no axis error.

use edm_common::axis::AxisVec;
use edm_common::motion::plan::{JumpParam, PlanInput};
use edm_common::motion::status::{JumpPhase, RunState};
use tracing::{debug, info};

use crate::context::{Auxiliaries, MotionContext};
use crate::segment::SegmentList;
use crate::vector::VectorMoveHandler;

use super::TaskSettings;

const FEED_EPS: f64 = 1e-9;

/// Geometry of one jump, fixed when it begins.
#[derive(Debug, Clone, Copy, PartialEq)]
struct JumpFrame {
    pre_jump: AxisVec,
    direction: AxisVec,
    retract: f64,
    buffer: f64,
    plan: PlanInput,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Jump {
    Servoing { machined: u32 },
    Retracting(JumpFrame),
    Approaching(JumpFrame),
    /// `left`: distance still to close under live feed.
    ApproachBuffer { frame: JumpFrame, left: f64 },
}

impl Jump {
    const IDLE: Self = Self::Servoing { machined: 0 };

    fn phase(&self) -> JumpPhase {
        match self {
            Self::Servoing { .. } => JumpPhase::Servoing,
            Self::Retracting(_) => JumpPhase::JumpRetracting,
            Self::Approaching(_) => JumpPhase::JumpApproaching,
            Self::ApproachBuffer { .. } => JumpPhase::JumpApproachBuffer,
        }
    }
}

/// Machining cycles between two jumps.
fn dwell_cycles(param: &JumpParam, period_s: f64) -> u32 {
    ((f64::from(param.dwell_ms) * 1e-3 / period_s - FEED_EPS).ceil() as u32).max(1)
}

/// Live-feed machining along a polyline.
#[derive(Debug, Clone)]
pub struct ServoFeed {
    settings: TaskSettings,
    path: SegmentList,
    jumper: VectorMoveHandler,
    run: RunState,
    jump: Jump,
    aux: Auxiliaries,
    machining_on: bool,
    position: AxisVec,
    last_feed: f64,
    clamped_at_start: bool,
}

impl ServoFeed {
    /// Start feeding from `from` through `waypoints` and switch the
    /// generator on. `None` when the path is empty.
    pub fn start(
        settings: &TaskSettings,
        ctx: &mut MotionContext<'_>,
        from: AxisVec,
        waypoints: &[AxisVec],
        aux: Auxiliaries,
    ) -> Option<Self> {
        let path = SegmentList::from_waypoints(from, waypoints)?;
        let mut feed = Self {
            settings: *settings,
            path,
            jumper: VectorMoveHandler::new(settings.period_s),
            run: RunState::Running,
            jump: Jump::IDLE,
            aux,
            machining_on: false,
            position: from,
            last_feed: 0.0,
            clamped_at_start: false,
        };
        feed.switch_machining(ctx, true);
        debug!(
            length = feed.path.length(),
            segments = feed.path.segment_count(),
            "servo feed started"
        );
        Some(feed)
    }

    /// Advance one cycle and return the commanded position.
    pub fn run_once(&mut self, ctx: &mut MotionContext<'_>) -> AxisVec {
        self.last_feed = 0.0;
        match self.run {
            RunState::Running | RunState::Pausing | RunState::Stopping => {}
            RunState::Resuming => {
                self.switch_machining(ctx, true);
                self.run = RunState::Running;
                return self.position;
            }
            _ => {
                if self.machining_on {
                    self.switch_machining(ctx, false);
                }
                return self.position;
            }
        }

        if self.run != RunState::Running && matches!(self.jump, Jump::Servoing { .. }) {
            self.switch_machining(ctx, false);
            self.jump = Jump::IDLE;
            self.run = match self.run {
                RunState::Pausing => RunState::Paused,
                _ => RunState::Stopped,
            };
            debug!(state = ?self.run, cursor = self.path.cursor(), "servo feed held");
            return self.position;
        }

        self.jump = match self.jump {
            Jump::Servoing { machined } => self.servo(machined, ctx),
            Jump::Retracting(frame) => self.retract(frame),
            Jump::Approaching(frame) => self.approach(frame),
            Jump::ApproachBuffer { frame, left } => self.close_buffer(frame, left, ctx),
        };
        self.position
    }

    // ─── Jump transitions ───────────────────────────────────────────

    fn servo(&mut self, machined: u32, ctx: &mut MotionContext<'_>) -> Jump {
        let feed = ctx.read_live_feed_distance();
        self.last_feed = feed;
        self.path.advance(feed);
        self.position = self.path.position();

        if feed < 0.0 && self.path.at_start() {
            if !self.clamped_at_start {
                self.clamped_at_start = true;
                debug!("feed reversal clamped at path start");
            }
        } else if feed > 0.0 {
            self.clamped_at_start = false;
        }

        if self.path.at_end() {
            self.finish(ctx);
            return Jump::IDLE;
        }

        let machined = machined.saturating_add(1);
        let param = ctx.jump_param();
        if param.is_enabled() && machined >= dwell_cycles(&param, self.settings.period_s) {
            return self.begin_jump(&param);
        }
        Jump::Servoing { machined }
    }

    fn begin_jump(&mut self, param: &JumpParam) -> Jump {
        let direction = self.path.direction();
        let pre_jump = self.path.position();
        // Stay `jump_start_margin` in front of the segment start.
        let room = (self.path.segment_offset() - self.settings.jump_start_margin).max(0.0);
        let retract = param.retract_height.min(room);
        if retract <= FEED_EPS {
            return Jump::IDLE;
        }
        let plan = param.plan.at_rest();
        if !self.jumper.start(pre_jump, pre_jump - direction * retract, &plan) {
            debug!(retract, "jump retract rejected by planner");
            return Jump::IDLE;
        }
        Jump::Retracting(JumpFrame {
            pre_jump,
            direction,
            retract,
            buffer: param.buffer_distance.clamp(0.0, retract),
            plan,
        })
    }

    fn retract(&mut self, frame: JumpFrame) -> Jump {
        self.position = self.jumper.run_once();
        if !self.jumper.is_over() {
            return Jump::Retracting(frame);
        }
        let full_buffer = Jump::ApproachBuffer { frame, left: frame.retract };
        if frame.buffer >= frame.retract - FEED_EPS {
            return full_buffer;
        }
        let approach_to = frame.pre_jump - frame.direction * frame.buffer;
        if self.jumper.start(self.position, approach_to, &frame.plan) {
            Jump::Approaching(frame)
        } else {
            full_buffer
        }
    }

    fn approach(&mut self, frame: JumpFrame) -> Jump {
        self.position = self.jumper.run_once();
        if self.jumper.is_over() {
            Jump::ApproachBuffer { frame, left: frame.buffer }
        } else {
            Jump::Approaching(frame)
        }
    }

    fn close_buffer(&mut self, frame: JumpFrame, left: f64, ctx: &mut MotionContext<'_>) -> Jump {
        let feed = ctx.read_live_feed_distance();
        self.last_feed = feed;
        let left = left - feed;
        if left <= 0.0 {
            self.path.advance(-left);
            self.position = self.path.position();
            if self.path.at_end() {
                self.finish(ctx);
            }
            return Jump::IDLE;
        }
        let left = left.min(frame.retract);
        self.position = frame.pre_jump - frame.direction * left;
        Jump::ApproachBuffer { frame, left }
    }

    fn finish(&mut self, ctx: &mut MotionContext<'_>) {
        self.switch_machining(ctx, false);
        self.run = RunState::Stopped;
        info!(length = self.path.length(), "servo feed reached path end");
    }

    fn switch_machining(&mut self, ctx: &mut MotionContext<'_>, on: bool) {
        ctx.set_machining(on, self.aux);
        self.machining_on = on;
    }

    // ─── Requests ───────────────────────────────────────────────────

    /// Request a pause; lands once no jump is in flight.
    pub fn pause(&mut self) -> bool {
        match self.run {
            RunState::Running | RunState::Resuming => {
                self.run = RunState::Pausing;
                true
            }
            _ => false,
        }
    }

    /// Switch the generator back on and continue in place.
    pub fn resume(&mut self) -> bool {
        if self.run != RunState::Paused {
            return false;
        }
        self.run = RunState::Resuming;
        true
    }

    /// Request a stop.
    ///
    /// `immediate` forces `Stopped` at once, abandoning any jump. The
    /// generator is switched off on the next cycle.
    pub fn stop(&mut self, immediate: bool) -> bool {
        if immediate {
            if self.run == RunState::Stopped {
                return false;
            }
            self.jumper.stop(true);
            self.jump = Jump::IDLE;
            self.run = RunState::Stopped;
            return true;
        }
        match self.run {
            RunState::Running | RunState::Resuming | RunState::Pausing => {
                self.run = RunState::Stopping;
                true
            }
            RunState::Paused => {
                self.run = RunState::Stopped;
                true
            }
            _ => false,
        }
    }

    // ─── Queries ────────────────────────────────────────────────────

    #[inline]
    pub fn state(&self) -> RunState {
        self.run
    }

    #[inline]
    pub fn position(&self) -> AxisVec {
        self.position
    }

    #[inline]
    pub fn jump_phase(&self) -> JumpPhase {
        self.jump.phase()
    }

    /// Feed distance read in the last cycle (0 when none was read).
    #[inline]
    pub fn last_feed(&self) -> f64 {
        self.last_feed
    }

    /// Distance machined along the path [blu].
    #[inline]
    pub fn cursor(&self) -> f64 {
        self.path.cursor()
    }

    #[inline]
    pub fn path(&self) -> &SegmentList {
        &self.path
    }

    /// Generator outputs are on.
    #[inline]
    pub fn is_machining(&self) -> bool {
        self.machining_on
    }
}
