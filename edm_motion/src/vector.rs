//! Straight-line axis move driven by a [`PlannerWrapper`].
//!
//! The wrapper plans the scalar distance between two absolute points; each
//! cycle the axis position is rebuilt as `start + unit · s`. When the move
//! reaches its end the position snaps to the exact target so rounding never
//! accumulates across consecutive moves.

use edm_common::axis::AxisVec;
use edm_common::motion::plan::PlanInput;
use edm_common::motion::status::RunState;

use crate::planner::PlannerWrapper;

/// Point-to-point move between two absolute axis positions.
#[derive(Debug, Clone)]
pub struct VectorMoveHandler {
    wrapper: PlannerWrapper,
    start: AxisVec,
    target: AxisVec,
    unit: AxisVec,
    position: AxisVec,
}

impl VectorMoveHandler {
    pub fn new(period_s: f64) -> Self {
        Self {
            wrapper: PlannerWrapper::new(period_s),
            start: AxisVec::ZERO,
            target: AxisVec::ZERO,
            unit: AxisVec::ZERO,
            position: AxisVec::ZERO,
        }
    }

    /// Start a move from `start` to `target`.
    ///
    /// Returns `false` for coincident points or rejected limits; the handler
    /// keeps its previous state in that case.
    pub fn start(&mut self, start: AxisVec, target: AxisVec, input: &PlanInput) -> bool {
        if !(start.is_finite() && target.is_finite()) {
            return false;
        }
        let delta = target - start;
        let Some(unit) = delta.unit() else {
            return false;
        };
        if !self.wrapper.start(input, delta.norm()) {
            return false;
        }
        self.start = start;
        self.target = target;
        self.unit = unit;
        self.position = start;
        true
    }

    /// Advance one cycle and return the commanded position.
    pub fn run_once(&mut self) -> AxisVec {
        if !self.wrapper.state().is_active() {
            return self.position;
        }
        self.wrapper.run_once();
        self.position = if self.wrapper.reached_end() {
            self.target
        } else {
            self.start + self.unit * self.wrapper.position()
        };
        self.position
    }

    #[inline]
    pub fn pause(&mut self) -> bool {
        self.wrapper.pause()
    }

    #[inline]
    pub fn resume(&mut self) -> bool {
        self.wrapper.resume()
    }

    #[inline]
    pub fn stop(&mut self, immediate: bool) -> bool {
        self.wrapper.stop(immediate)
    }

    #[inline]
    pub fn change_speed(&mut self, cruise_velocity: f64) -> bool {
        self.wrapper.change_speed(cruise_velocity)
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.wrapper.state()
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.wrapper.is_over()
    }

    /// Stopped exactly at the target.
    #[inline]
    pub fn reached_target(&self) -> bool {
        self.wrapper.is_over() && self.position == self.target
    }

    /// Last commanded position.
    #[inline]
    pub fn position(&self) -> AxisVec {
        self.position
    }

    #[inline]
    pub fn start_point(&self) -> AxisVec {
        self.start
    }

    #[inline]
    pub fn target(&self) -> AxisVec {
        self.target
    }

    /// Unit direction of the move.
    #[inline]
    pub fn direction(&self) -> AxisVec {
        self.unit
    }

    /// Path velocity [blu/s].
    #[inline]
    pub fn velocity(&self) -> f64 {
        self.wrapper.velocity()
    }

    #[inline]
    pub fn remaining(&self) -> f64 {
        self.wrapper.remaining()
    }

    #[inline]
    pub fn input(&self) -> &PlanInput {
        self.wrapper.input()
    }
}
