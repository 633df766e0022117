//! Planner inputs and machining parameters.
//!
//! Velocities are in blu/s, accelerations in blu/s². Jerk is not given
//! directly: acceleration ramps linearly over `jerk_period_count` servo
//! cycles.

use serde::{Deserialize, Serialize};

/// Boundary conditions and limits for one planning episode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanInput {
    /// Velocity at the start of the episode [blu/s].
    pub entry_velocity: f64,
    /// Velocity at the end of the episode [blu/s].
    pub exit_velocity: f64,
    /// Target cruise velocity [blu/s].
    pub cruise_velocity: f64,
    /// Acceleration limit (> 0) [blu/s²].
    pub accel_limit: f64,
    /// Deceleration limit (< 0) [blu/s²].
    pub decel_limit: f64,
    /// Cycles over which acceleration ramps from zero to its limit.
    pub jerk_period_count: u32,
}

impl Default for PlanInput {
    fn default() -> Self {
        Self {
            entry_velocity: 0.0,
            exit_velocity: 0.0,
            cruise_velocity: 1000.0,
            accel_limit: 500_000.0,
            decel_limit: -500_000.0,
            jerk_period_count: 30,
        }
    }
}

impl PlanInput {
    /// Same limits, zero boundary velocities.
    pub fn at_rest(&self) -> Self {
        Self {
            entry_velocity: 0.0,
            exit_velocity: 0.0,
            ..*self
        }
    }

    /// Structural check of the limits (boundary velocities are not checked).
    pub fn is_valid(&self) -> bool {
        self.cruise_velocity.is_finite()
            && self.cruise_velocity > 0.0
            && self.accel_limit.is_finite()
            && self.accel_limit > 0.0
            && self.decel_limit.is_finite()
            && self.decel_limit < 0.0
            && self.entry_velocity.is_finite()
            && self.entry_velocity >= 0.0
            && self.exit_velocity.is_finite()
            && self.exit_velocity >= 0.0
    }

    /// Distance needed to stop from `velocity` at the configured deceleration.
    #[inline]
    pub fn stopping_distance(&self, velocity: f64) -> f64 {
        if velocity <= 0.0 || self.decel_limit >= 0.0 {
            return 0.0;
        }
        velocity * velocity / (2.0 * self.decel_limit.abs())
    }
}

/// Jump (retract-for-flushing) parameters.
///
/// Supplied by an external settings component and snapshotted by a
/// servo-feed task at the start of every jump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpParam {
    /// Retract distance along the negative feed direction [blu]. 0 disables jumps.
    pub retract_height: f64,
    /// Machining time between two jumps [ms]. 0 disables jumps.
    pub dwell_ms: u32,
    /// Distance before the pre-jump position where live servo feed takes over [blu].
    pub buffer_distance: f64,
    /// Planner limits for retract and approach.
    pub plan: PlanInput,
}

impl Default for JumpParam {
    fn default() -> Self {
        Self {
            retract_height: 0.0,
            dwell_ms: 0,
            buffer_distance: 0.0,
            plan: PlanInput {
                cruise_velocity: 20_000.0,
                accel_limit: 2_000_000.0,
                decel_limit: -2_000_000.0,
                jerk_period_count: 5,
                ..PlanInput::default()
            },
        }
    }
}

impl JumpParam {
    /// Whether periodic jumps are active with these parameters.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.retract_height > 0.0 && self.dwell_ms > 0
    }

    /// Distances non-negative and the retract/approach plan valid.
    pub fn is_valid(&self) -> bool {
        self.retract_height.is_finite()
            && self.retract_height >= 0.0
            && self.buffer_distance.is_finite()
            && self.buffer_distance >= 0.0
            && self.plan.is_valid()
    }
}

/// Drill-specific machining parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrillParam {
    /// Engage spindle rotation while machining.
    pub spindle: bool,
    /// Engage the flushing pump while machining.
    pub flushing_pump: bool,
    /// Backward live feed in one cycle that registers first contact [blu].
    ///
    /// A gap-voltage servo answers a short circuit with a feed reversal,
    /// so the first reversal deeper than this marks the touch trigger.
    pub touch_reversal_threshold: f64,
    /// Breakout window length [cycles].
    pub breakout_window_cycles: u32,
    /// Forward advance within the window that indicates breakout [blu].
    pub breakout_advance: f64,
}

impl Default for DrillParam {
    fn default() -> Self {
        Self {
            spindle: true,
            flushing_pump: true,
            touch_reversal_threshold: 0.0,
            breakout_window_cycles: 200,
            breakout_advance: 400.0,
        }
    }
}
