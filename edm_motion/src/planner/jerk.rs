//! Discrete jerk-limited (S-curve) velocity planner.
//!
//! A plan is built from up to seven phases: an S-ramp from the entry
//! velocity to the peak velocity (jerk-up, constant acceleration,
//! jerk-down), a cruise phase, and an S-ramp from the peak to the exit
//! velocity. Every phase has constant jerk, so position inside a phase is
//! the cubic `p0 + v0·t + a0·t²/2 + j·t³/6`.
//!
//! ## Discretization
//!
//! The continuous profile of duration `T` is sampled at `N = ceil(T / Ts)`
//! points spaced `h = T / N ≤ Ts`, so the episode lasts a whole number of
//! servo cycles and never exceeds the planned velocity or acceleration.
//! The last increment is `distance − Σ(previous increments)`, which absorbs
//! all floating point residue: the increments of an episode sum to
//! `distance` exactly.
//!
//! ## Profile selection
//!
//! 1. Full profile: accelerate to cruise, cruise, decelerate.
//! 2. Distance too short for cruise: bisect the peak velocity between
//!    `max(entry, exit)` and cruise until both ramps fit.
//! 3. Even the direct entry→exit ramp does not fit (or cruise lies below
//!    the boundary velocities): one combined ramp fitted to the distance,
//!    accepting a higher acceleration than configured.
//!
//! Jerk is not configured directly: a ramp at the acceleration limit takes
//! `jerk_period_count` cycles to build up acceleration.

use edm_common::motion::plan::PlanInput;

const MAX_PHASES: usize = 7;

/// Velocity differences below this are treated as zero [blu/s].
const VELOCITY_EPS: f64 = 1e-9;

/// Bisection steps for the reduced-peak profile (reaches f64 resolution).
const BISECT_ITERATIONS: u32 = 64;

// ─── Profile Pieces ─────────────────────────────────────────────────

/// Constant-jerk piece of the profile.
#[derive(Debug, Clone, Copy, Default)]
struct Phase {
    /// Start time within the episode [s].
    t0: f64,
    duration: f64,
    /// Position at `t0` [blu].
    p0: f64,
    v0: f64,
    a0: f64,
    jerk: f64,
}

impl Phase {
    #[inline]
    fn displacement(&self, dt: f64) -> f64 {
        self.v0 * dt + self.a0 * dt * dt / 2.0 + self.jerk * dt * dt * dt / 6.0
    }

    #[inline]
    fn position_at(&self, t: f64) -> f64 {
        self.p0 + self.displacement((t - self.t0).clamp(0.0, self.duration))
    }

    #[inline]
    fn end_time(&self) -> f64 {
        self.t0 + self.duration
    }
}

/// Symmetric S-ramp between two velocities.
///
/// `tj` is the jerk time on each side, `ta` the constant-acceleration time
/// in between. `peak` is the signed acceleration reached after `tj`.
#[derive(Debug, Clone, Copy)]
struct Ramp {
    v0: f64,
    v1: f64,
    tj: f64,
    ta: f64,
    peak: f64,
}

impl Ramp {
    /// No velocity change, no duration.
    fn idle(v: f64) -> Self {
        Self { v0: v, v1: v, tj: 0.0, ta: 0.0, peak: 0.0 }
    }

    /// Shortest ramp `v0 → v1` under acceleration magnitude `limit` with
    /// nominal jerk time `tj_nominal`.
    fn limited(v0: f64, v1: f64, limit: f64, tj_nominal: f64) -> Self {
        let dv = v1 - v0;
        let mag = dv.abs();
        if mag <= VELOCITY_EPS {
            return Self::idle(v1);
        }
        let (tj, ta) = if mag >= limit * tj_nominal {
            (tj_nominal, mag / limit - tj_nominal)
        } else {
            // Acceleration never reaches the limit: triangular accel profile.
            ((mag * tj_nominal / limit).sqrt(), 0.0)
        };
        Self { v0, v1, tj, ta, peak: dv / (tj + ta) }
    }

    /// Ramp `v0 → v1` stretched or squeezed to exactly `duration`.
    fn fitted(v0: f64, v1: f64, duration: f64, tj_nominal: f64) -> Self {
        let tj = tj_nominal.min(duration / 2.0);
        let ta = duration - 2.0 * tj;
        Self { v0, v1, tj, ta, peak: (v1 - v0) / (tj + ta) }
    }

    #[inline]
    fn duration(&self) -> f64 {
        2.0 * self.tj + self.ta
    }

    #[inline]
    fn distance(&self) -> f64 {
        (self.v0 + self.v1) / 2.0 * self.duration()
    }
}

// ─── Planner ────────────────────────────────────────────────────────

/// Jerk-limited point-to-point planner producing one increment per cycle.
///
/// Zero allocation: the profile is stored in a fixed phase array. Calling
/// [`plan`](Self::plan) while an episode is running discards it.
#[derive(Debug, Clone)]
pub struct JerkLimitedPlanner {
    /// Servo cycle period [s].
    period: f64,
    phases: [Phase; MAX_PHASES],
    phase_count: usize,
    /// Phase containing the last sample time.
    cursor: usize,
    distance: f64,
    total_time: f64,
    steps: u64,
    step: u64,
    /// Sample spacing `h = total_time / steps` [s].
    sample: f64,
    /// Sum of increments returned so far.
    emitted: f64,
    /// Continuous-profile position at the last sample.
    profile_pos: f64,
    increment: f64,
    velocity: f64,
    over: bool,
}

impl JerkLimitedPlanner {
    /// Create an idle planner (`is_over() == true`) for cycle `period_s`.
    pub fn new(period_s: f64) -> Self {
        debug_assert!(period_s > 0.0, "cycle period must be positive");
        Self {
            period: period_s,
            phases: [Phase::default(); MAX_PHASES],
            phase_count: 0,
            cursor: 0,
            distance: 0.0,
            total_time: 0.0,
            steps: 0,
            step: 0,
            sample: 0.0,
            emitted: 0.0,
            profile_pos: 0.0,
            increment: 0.0,
            velocity: 0.0,
            over: true,
        }
    }

    /// Plan a new episode covering `distance` from the current point.
    ///
    /// Returns `false` (and leaves the planner untouched) for a
    /// non-positive distance or structurally invalid limits.
    pub fn plan(&mut self, input: &PlanInput, distance: f64) -> bool {
        if !(distance.is_finite() && distance > 0.0) || !input.is_valid() {
            return false;
        }

        let tj = f64::from(input.jerk_period_count) * self.period;
        let vi = input.entry_velocity;
        let vo = input.exit_velocity;
        let vc = input.cruise_velocity;
        let accel = input.accel_limit;
        let decel = input.decel_limit.abs();

        let limit = |from: f64, to: f64| if to >= from { accel } else { decel };
        let rise = |vp: f64| Ramp::limited(vi, vp, limit(vi, vp), tj);
        let fall = |vp: f64| Ramp::limited(vp, vo, limit(vp, vo), tj);
        let reach = |vp: f64| rise(vp).distance() + fall(vp).distance();

        let floor = vi.max(vo);
        let (first, cruise_v, cruise_t, second) = if reach(vc) <= distance {
            (rise(vc), vc, (distance - reach(vc)) / vc, fall(vc))
        } else if vc >= floor && reach(floor) <= distance {
            let (mut lo, mut hi) = (floor, vc);
            for _ in 0..BISECT_ITERATIONS {
                let mid = 0.5 * (lo + hi);
                if reach(mid) <= distance {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            let rest = (distance - reach(lo)).max(0.0);
            let cruise_t = if lo > VELOCITY_EPS { rest / lo } else { 0.0 };
            (rise(lo), lo, cruise_t, fall(lo))
        } else {
            if vi + vo <= VELOCITY_EPS {
                return false;
            }
            let t = 2.0 * distance / (vi + vo);
            (Ramp::fitted(vi, vo, t, tj), vo, 0.0, Ramp::idle(vo))
        };

        self.phase_count = 0;
        self.total_time = 0.0;
        self.profile_pos = 0.0;
        self.push_ramp(&first);
        self.push_phase(cruise_t, cruise_v, 0.0, 0.0);
        self.push_ramp(&second);

        self.distance = distance;
        self.steps = ((self.total_time / self.period - 1e-9).ceil() as u64).max(1);
        self.sample = self.total_time / self.steps as f64;
        self.step = 0;
        self.cursor = 0;
        self.emitted = 0.0;
        self.profile_pos = 0.0;
        self.increment = 0.0;
        self.velocity = vi;
        self.over = false;
        true
    }

    fn push_ramp(&mut self, ramp: &Ramp) {
        let jerk = if ramp.tj > 0.0 { ramp.peak / ramp.tj } else { 0.0 };
        let half = ramp.peak * ramp.tj / 2.0;
        self.push_phase(ramp.tj, ramp.v0, 0.0, jerk);
        self.push_phase(ramp.ta, ramp.v0 + half, ramp.peak, 0.0);
        self.push_phase(ramp.tj, ramp.v1 - half, ramp.peak, -jerk);
    }

    fn push_phase(&mut self, duration: f64, v0: f64, a0: f64, jerk: f64) {
        if duration <= 0.0 || self.phase_count >= MAX_PHASES {
            return;
        }
        let phase = Phase {
            t0: self.total_time,
            duration,
            p0: self.profile_pos,
            v0,
            a0,
            jerk,
        };
        self.profile_pos += phase.displacement(duration);
        self.total_time += duration;
        self.phases[self.phase_count] = phase;
        self.phase_count += 1;
    }

    fn position_at(&mut self, t: f64) -> f64 {
        if self.phase_count == 0 {
            return 0.0;
        }
        while self.cursor + 1 < self.phase_count && t > self.phases[self.cursor].end_time() {
            self.cursor += 1;
        }
        self.phases[self.cursor].position_at(t)
    }

    /// Advance one cycle and return the position increment [blu].
    ///
    /// Returns 0 once the episode is over.
    pub fn run_once(&mut self) -> f64 {
        if self.over {
            self.increment = 0.0;
            self.velocity = 0.0;
            return 0.0;
        }

        self.step += 1;
        let increment = if self.step >= self.steps {
            self.over = true;
            self.distance - self.emitted
        } else {
            let p = self.position_at(self.step as f64 * self.sample);
            let inc = p - self.profile_pos;
            self.profile_pos = p;
            inc
        };

        self.emitted = if self.over { self.distance } else { self.emitted + increment };
        self.increment = increment;
        self.velocity = increment / self.period;
        increment
    }

    /// Abandon the episode at the current point.
    pub fn halt(&mut self) {
        self.over = true;
        self.distance = self.emitted;
        self.increment = 0.0;
        self.velocity = 0.0;
    }

    /// The last increment has been returned.
    #[inline]
    pub fn is_over(&self) -> bool {
        self.over
    }

    /// Velocity of the last increment [blu/s] (entry velocity right after planning).
    #[inline]
    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    #[inline]
    pub fn last_increment(&self) -> f64 {
        self.increment
    }

    /// Episode length [blu].
    #[inline]
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Distance covered in this episode [blu].
    #[inline]
    pub fn emitted(&self) -> f64 {
        self.emitted
    }

    #[inline]
    pub fn remaining(&self) -> f64 {
        self.distance - self.emitted
    }

    /// Episode length in cycles.
    #[inline]
    pub fn total_cycles(&self) -> u64 {
        self.steps
    }

    #[inline]
    pub fn elapsed_cycles(&self) -> u64 {
        self.step
    }

    /// Cycle period [s].
    #[inline]
    pub fn period(&self) -> f64 {
        self.period
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
