//! Pause/resume/stop semantics on top of [`JerkLimitedPlanner`].
//!
//! The wrapper tracks a scalar move of fixed length and re-plans the
//! remaining part whenever the operator interrupts it:
//!
//! ```text
//! NotStarted ─start─► Running ─pause─► Pausing ─► Paused ─resume─► Running
//!                        │                │                           │
//!                        └─stop──► Stopping ◄─stop─┘                  │
//!                                     │                               │
//!                                     ▼                               │
//!                                  Stopped ◄──────── target reached ──┘
//! ```
//!
//! Every re-plan starts a fresh monotonic episode at the current scalar
//! position, so the position never moves backwards and never passes the
//! move length.

use edm_common::motion::plan::PlanInput;
use edm_common::motion::status::RunState;

use super::jerk::JerkLimitedPlanner;

/// Remaining distance treated as "at target" [blu].
const LENGTH_EPS: f64 = 1e-9;

/// Scalar point-to-point move with interruptible planning.
#[derive(Debug, Clone)]
pub struct PlannerWrapper {
    planner: JerkLimitedPlanner,
    /// Limits of the move; cruise may be overridden by `change_speed`.
    input: PlanInput,
    state: RunState,
    length: f64,
    position: f64,
    /// Scalar position where the current planner episode began.
    episode_start: f64,
}

impl PlannerWrapper {
    pub fn new(period_s: f64) -> Self {
        Self {
            planner: JerkLimitedPlanner::new(period_s),
            input: PlanInput::default(),
            state: RunState::NotStarted,
            length: 0.0,
            position: 0.0,
            episode_start: 0.0,
        }
    }

    /// Begin a move of `length` blu. Discards any previous move.
    ///
    /// Returns `false` if the planner rejects the input; the wrapper is then
    /// unchanged.
    pub fn start(&mut self, input: &PlanInput, length: f64) -> bool {
        if !self.planner.plan(input, length) {
            return false;
        }
        self.input = *input;
        self.state = RunState::Running;
        self.length = length;
        self.position = 0.0;
        self.episode_start = 0.0;
        true
    }

    /// Advance one cycle. Returns the scalar increment [blu].
    pub fn run_once(&mut self) -> f64 {
        if !matches!(
            self.state,
            RunState::Running | RunState::Pausing | RunState::Stopping
        ) {
            return 0.0;
        }

        let before = self.position;
        self.planner.run_once();
        self.position = self.episode_start + self.planner.emitted();

        if self.planner.is_over() {
            if self.state == RunState::Running || self.remaining() <= LENGTH_EPS {
                self.position = self.length;
            }
            self.state = match self.state {
                RunState::Pausing => RunState::Paused,
                _ => RunState::Stopped,
            };
        }
        self.position - before
    }

    /// Decelerate to rest and enter `Paused`.
    ///
    /// Accepted while `Running`; rejected while stopping or already paused.
    pub fn pause(&mut self) -> bool {
        match self.state {
            RunState::Running | RunState::Resuming => {
                self.decelerate(RunState::Pausing, RunState::Paused);
                true
            }
            _ => false,
        }
    }

    /// Re-plan the remaining distance from rest.
    pub fn resume(&mut self) -> bool {
        if self.state != RunState::Paused {
            return false;
        }
        let remaining = self.remaining();
        if remaining <= LENGTH_EPS {
            self.position = self.length;
            self.state = RunState::Stopped;
            return true;
        }
        if !self.planner.plan(&self.input.at_rest(), remaining) {
            return false;
        }
        self.episode_start = self.position;
        self.state = RunState::Running;
        true
    }

    /// Stop the move.
    ///
    /// `immediate` forces `Stopped` in any state without a deceleration
    /// episode. Otherwise a running move decelerates (`Stopping`), a pausing
    /// one keeps its deceleration but ends `Stopped`, and a paused one stops
    /// at once.
    pub fn stop(&mut self, immediate: bool) -> bool {
        if immediate {
            self.planner.halt();
            self.state = RunState::Stopped;
            return true;
        }
        match self.state {
            RunState::Running | RunState::Resuming => {
                self.decelerate(RunState::Stopping, RunState::Stopped);
                true
            }
            RunState::Pausing => {
                self.state = RunState::Stopping;
                true
            }
            RunState::Paused => {
                self.state = RunState::Stopped;
                true
            }
            RunState::Stopping => true,
            RunState::NotStarted | RunState::Stopped => false,
        }
    }

    /// Change the cruise velocity of the remaining move.
    ///
    /// While `Running` the remainder is re-planned from the current velocity;
    /// while `Paused` the new cruise is kept for the next resume.
    pub fn change_speed(&mut self, cruise_velocity: f64) -> bool {
        if !(cruise_velocity.is_finite() && cruise_velocity > 0.0) {
            return false;
        }
        match self.state {
            RunState::Running => {
                let remaining = self.remaining();
                let replan = PlanInput {
                    entry_velocity: self.planner.velocity().max(0.0),
                    cruise_velocity,
                    ..self.input
                };
                if remaining > LENGTH_EPS && self.planner.plan(&replan, remaining) {
                    self.episode_start = self.position;
                }
                self.input.cruise_velocity = cruise_velocity;
                true
            }
            RunState::Paused => {
                self.input.cruise_velocity = cruise_velocity;
                true
            }
            _ => false,
        }
    }

    /// Plan a deceleration-only episode, or switch to `done` at once when
    /// already at rest or at the end.
    fn decelerate(&mut self, during: RunState, done: RunState) {
        let velocity = self.planner.velocity();
        let remaining = self.remaining();
        if self.planner.is_over() || velocity <= 0.0 || remaining <= LENGTH_EPS {
            self.planner.halt();
            self.state = done;
            return;
        }

        let distance = self.input.stopping_distance(velocity).min(remaining);
        let stop = PlanInput {
            entry_velocity: velocity,
            exit_velocity: 0.0,
            cruise_velocity: velocity,
            ..self.input
        };
        if distance > 0.0 && self.planner.plan(&stop, distance) {
            self.episode_start = self.position;
            self.state = during;
        } else {
            self.planner.halt();
            self.state = done;
        }
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[inline]
    pub fn is_over(&self) -> bool {
        self.state == RunState::Stopped
    }

    /// The scalar position reached the move length.
    #[inline]
    pub fn reached_end(&self) -> bool {
        self.remaining() <= LENGTH_EPS
    }

    /// Scalar position within the move [blu].
    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    #[inline]
    pub fn remaining(&self) -> f64 {
        self.length - self.position
    }

    /// Current velocity [blu/s]; 0 unless motion is being produced.
    #[inline]
    pub fn velocity(&self) -> f64 {
        if self.state.is_active() {
            self.planner.velocity()
        } else {
            0.0
        }
    }

    #[inline]
    pub fn input(&self) -> &PlanInput {
        &self.input
    }

    /// Length of the current planner episode [blu].
    #[inline]
    pub fn episode_length(&self) -> f64 {
        self.planner.distance()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TS: f64 = 0.001;

    fn input() -> PlanInput {
        PlanInput {
            entry_velocity: 0.0,
            exit_velocity: 0.0,
            cruise_velocity: 1000.0,
            accel_limit: 500_000.0,
            decel_limit: -500_000.0,
            jerk_period_count: 30,
        }
    }

    fn run_until_over(w: &mut PlannerWrapper) -> usize {
        let mut n = 0;
        while w.state().is_active() {
            w.run_once();
            n += 1;
            assert!(n < 1_000_000);
        }
        n
    }

    #[test]
    fn natural_completion_reaches_length() {
        let mut w = PlannerWrapper::new(TS);
        assert_eq!(w.state(), RunState::NotStarted);
        assert!(w.start(&input(), 250.0));
        run_until_over(&mut w);
        assert!(w.is_over());
        assert_eq!(w.position(), 250.0);
        assert!(w.reached_end());
        assert_eq!(w.run_once(), 0.0);
    }

    #[test]
    fn start_rejects_zero_length() {
        let mut w = PlannerWrapper::new(TS);
        assert!(!w.start(&input(), 0.0));
        assert_eq!(w.state(), RunState::NotStarted);
    }

    #[test]
    fn pause_stopping_distance_from_800() {
        let cruise = PlanInput {
            entry_velocity: 800.0,
            exit_velocity: 800.0,
            cruise_velocity: 800.0,
            ..input()
        };
        let mut w = PlannerWrapper::new(TS);
        assert!(w.start(&cruise, 100.0));
        assert!(w.pause());
        assert_eq!(w.state(), RunState::Pausing);
        assert!((w.episode_length() - 0.64).abs() < 1e-12);

        run_until_over(&mut w);
        assert_eq!(w.state(), RunState::Paused);
        assert!((w.position() - 0.64).abs() < 1e-12);
        assert_eq!(w.velocity(), 0.0);
    }

    #[test]
    fn pause_stopping_distance_clamped_to_remaining() {
        let cruise = PlanInput {
            entry_velocity: 800.0,
            exit_velocity: 800.0,
            cruise_velocity: 800.0,
            ..input()
        };
        let mut w = PlannerWrapper::new(TS);
        assert!(w.start(&cruise, 0.5));
        assert!(w.pause());
        assert!((w.episode_length() - 0.5).abs() < 1e-12);
        run_until_over(&mut w);
        assert_eq!(w.state(), RunState::Paused);
        assert_eq!(w.position(), 0.5);

        // Nothing left: resume finishes at once.
        assert!(w.resume());
        assert!(w.is_over());
    }

    #[test]
    fn stop_decelerates_to_rest_within_length() {
        let mut w = PlannerWrapper::new(TS);
        assert!(w.start(&input(), 300.0));
        for _ in 0..150 {
            w.run_once();
        }
        let before = w.position();
        assert!(w.stop(false));
        assert_eq!(w.state(), RunState::Stopping);
        let mut last = f64::MAX;
        while w.state().is_active() {
            let inc = w.run_once();
            assert!(inc >= 0.0 && inc <= last + 1e-12);
            last = inc;
        }
        assert!(w.is_over());
        assert!(w.position() > before);
        assert!(w.position() <= 300.0);
        assert_eq!(w.velocity(), 0.0);
    }

    #[test]
    fn stop_while_pausing_ends_stopped() {
        let mut w = PlannerWrapper::new(TS);
        assert!(w.start(&input(), 300.0));
        for _ in 0..100 {
            w.run_once();
        }
        assert!(w.pause());
        assert!(w.stop(false));
        assert_eq!(w.state(), RunState::Stopping);
        // Pause is rejected while stopping.
        assert!(!w.pause());
        run_until_over(&mut w);
        assert_eq!(w.state(), RunState::Stopped);
    }

    #[test]
    fn immediate_stop_forces_stopped() {
        let mut w = PlannerWrapper::new(TS);
        assert!(w.start(&input(), 300.0));
        for _ in 0..100 {
            w.run_once();
        }
        let pos = w.position();
        assert!(w.stop(true));
        assert!(w.is_over());
        assert_eq!(w.run_once(), 0.0);
        assert_eq!(w.position(), pos);
    }

    #[test]
    fn change_speed_running_and_paused() {
        let mut w = PlannerWrapper::new(TS);
        assert!(w.start(&input(), 2_000.0));
        for _ in 0..200 {
            w.run_once();
        }
        assert!(w.change_speed(2_000.0));
        for _ in 0..200 {
            w.run_once();
        }
        assert!(w.velocity() > 1_500.0);

        assert!(w.pause());
        run_until_over(&mut w);
        assert!(w.change_speed(500.0));
        assert_eq!(w.input().cruise_velocity, 500.0);
        assert!(w.resume());
        run_until_over(&mut w);
        assert_eq!(w.position(), 2_000.0);

        // Not accepted once stopped.
        assert!(!w.change_speed(100.0));
        assert!(!w.change_speed(-1.0));
    }

    fn random_input(cruise: f64, accel: f64, decel: f64, nacc: u32) -> PlanInput {
        PlanInput {
            cruise_velocity: cruise,
            accel_limit: accel,
            decel_limit: -decel,
            jerk_period_count: nacc,
            ..PlanInput::default()
        }
    }

    /// Run `cycles` increments, stopping early once the move is over.
    fn run_for(w: &mut PlannerWrapper, cycles: usize) {
        for _ in 0..cycles {
            if !w.state().is_active() {
                break;
            }
            w.run_once();
        }
    }

    proptest! {
        #[test]
        fn pause_resume_reaches_same_target(
            length in 1.0f64..2_000.0,
            cruise in 1_000.0f64..20_000.0,
            accel in 10_000.0f64..5_000_000.0,
            decel in 10_000.0f64..5_000_000.0,
            nacc in 0u32..50,
            pause_at in 0usize..3_000,
        ) {
            let mut w = PlannerWrapper::new(TS);
            prop_assume!(w.start(&random_input(cruise, accel, decel, nacc), length));
            run_for(&mut w, pause_at);
            if w.pause() {
                run_until_over(&mut w);
                prop_assert_eq!(w.state(), RunState::Paused);
                prop_assert!(w.position() <= length + 1e-9 * length);
                prop_assert!(w.resume());
            }
            run_until_over(&mut w);
            prop_assert!(w.is_over());
            prop_assert_eq!(w.position(), length);
        }

        #[test]
        fn stop_ends_at_rest_within_length(
            length in 1.0f64..2_000.0,
            cruise in 1_000.0f64..20_000.0,
            accel in 10_000.0f64..5_000_000.0,
            decel in 10_000.0f64..5_000_000.0,
            nacc in 0u32..50,
            stop_at in 0usize..3_000,
        ) {
            let mut w = PlannerWrapper::new(TS);
            prop_assume!(w.start(&random_input(cruise, accel, decel, nacc), length));
            run_for(&mut w, stop_at);
            let before = w.position();
            let running = w.state() == RunState::Running;
            prop_assert_eq!(w.stop(false), running);
            run_until_over(&mut w);
            prop_assert_eq!(w.state(), RunState::Stopped);
            prop_assert!(w.position() >= before);
            prop_assert!(w.position() <= length + 1e-9 * length);
        }
    }
}
