//! Rapid (G00) point move.

use edm_common::axis::AxisVec;
use edm_common::motion::plan::PlanInput;
use edm_common::motion::status::RunState;
use tracing::warn;

use crate::context::MotionContext;
use crate::vector::VectorMoveHandler;

use super::TaskSettings;

/// Point move with optional touch protection.
///
/// With `touch_detect` set, any physical touch while moving forces an
/// immediate stop.
#[derive(Debug, Clone)]
pub struct RapidMove {
    mover: VectorMoveHandler,
    touch_detect: bool,
    touch_stopped: bool,
}

impl RapidMove {
    /// `None` when the move is degenerate (zero length, invalid limits).
    pub fn start(
        settings: &TaskSettings,
        from: AxisVec,
        target: AxisVec,
        plan: &PlanInput,
        touch_detect: bool,
    ) -> Option<Self> {
        let mut mover = VectorMoveHandler::new(settings.period_s);
        mover.start(from, target, plan).then_some(Self {
            mover,
            touch_detect,
            touch_stopped: false,
        })
    }

    pub fn run_once(&mut self, ctx: &mut MotionContext<'_>) -> AxisVec {
        if self.touch_detect && self.mover.state().is_active() && ctx.touch_detected() {
            self.mover.stop(true);
            self.touch_stopped = true;
            warn!(position = ?self.mover.position().0, "rapid move stopped by touch");
            return self.mover.position();
        }
        self.mover.run_once()
    }

    #[inline]
    pub fn pause(&mut self) -> bool {
        self.mover.pause()
    }

    #[inline]
    pub fn resume(&mut self) -> bool {
        self.mover.resume()
    }

    #[inline]
    pub fn stop(&mut self, immediate: bool) -> bool {
        self.mover.stop(immediate)
    }

    #[inline]
    pub fn change_speed(&mut self, cruise_velocity: f64) -> bool {
        self.mover.change_speed(cruise_velocity)
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.mover.state()
    }

    #[inline]
    pub fn position(&self) -> AxisVec {
        self.mover.position()
    }

    #[inline]
    pub fn target(&self) -> AxisVec {
        self.mover.target()
    }

    /// Touch protection armed.
    #[inline]
    pub fn touch_detect(&self) -> bool {
        self.touch_detect
    }

    #[inline]
    pub fn touch_stopped(&self) -> bool {
        self.touch_stopped
    }
}
