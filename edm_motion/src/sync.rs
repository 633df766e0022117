//! Distributed-clock synchronisation of the cycle wake time.
//!
//! The reference slave's DC system time is sampled after every exchange.
//! Its phase inside the cycle period, relative to the configured shift, is
//! the error of a PI controller (backward Euler, back-calculation
//! anti-windup). The negated, clamped output is added to the next cycle
//! period so the host wake-up drifts into phase with the network clock.

use edm_common::motion::config::DcSyncConfig;
use tracing::debug;

/// Anti-windup tracking time constant, in cycles.
const TRACKING_CYCLES: f64 = 10.0;

/// PI accumulator state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PiState {
    /// Integral accumulator [ns].
    integral: f64,
    /// Previous unsaturated output, for anti-windup.
    prev_raw_output: f64,
}

impl PiState {
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn integral(&self) -> f64 {
        self.integral
    }
}

/// PI gains.
#[derive(Debug, Clone, Copy)]
pub struct PiGains {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain [1/s] (0 = disabled).
    pub ki: f64,
    /// Anti-windup tracking time constant [s] (0 = disabled).
    pub tt: f64,
    /// Output saturation limit.
    pub out_max: f64,
}

/// One PI step. Returns the unsaturated output.
#[inline]
pub fn pi_compute(state: &mut PiState, gains: &PiGains, error: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        return 0.0;
    }

    let p_term = gains.kp * error;

    let i_term = if gains.ki != 0.0 {
        let anti_windup = if gains.tt > 0.0 && gains.out_max > 0.0 {
            let saturated = state.prev_raw_output.clamp(-gains.out_max, gains.out_max);
            (saturated - state.prev_raw_output) / gains.tt
        } else {
            0.0
        };
        state.integral += (gains.ki * error + anti_windup) * dt;
        state.integral
    } else {
        state.integral = 0.0;
        0.0
    };

    let raw_output = p_term + i_term;
    state.prev_raw_output = raw_output;
    raw_output
}

/// Wake-time offset controller.
#[derive(Debug, Clone)]
pub struct DcSync {
    enabled: bool,
    gains: PiGains,
    shift_ns: i64,
    period_ns: i64,
    dt: f64,
    state: PiState,
    last_error_ns: i64,
    offset_ns: i64,
}

impl DcSync {
    pub fn new(config: &DcSyncConfig, period_ns: i64) -> Self {
        let dt = period_ns as f64 * 1e-9;
        Self {
            enabled: config.enabled,
            gains: PiGains {
                kp: config.kp,
                ki: config.ki,
                tt: TRACKING_CYCLES * dt,
                out_max: config.max_offset_ns as f64,
            },
            shift_ns: config.shift_ns,
            period_ns,
            dt,
            state: PiState::default(),
            last_error_ns: 0,
            offset_ns: 0,
        }
    }

    /// Phase of `dc_time_ns` relative to the shift, wrapped to
    /// `[-period/2, period/2)`.
    pub fn phase_error_ns(&self, dc_time_ns: i64) -> i64 {
        let half = self.period_ns / 2;
        let phase = (dc_time_ns - self.shift_ns).rem_euclid(self.period_ns);
        if phase >= half { phase - self.period_ns } else { phase }
    }

    /// Feed the latest DC sample and return the offset for the next period [ns].
    ///
    /// Without a sample (disconnected or no DC support) the controller resets
    /// and the offset is zero.
    pub fn update(&mut self, dc_time_ns: Option<i64>) -> i64 {
        let Some(dc) = dc_time_ns.filter(|_| self.enabled) else {
            if self.offset_ns != 0 || self.state.integral() != 0.0 {
                debug!("dc sync reset");
            }
            self.reset();
            return 0;
        };
        let error = self.phase_error_ns(dc);
        let raw = pi_compute(&mut self.state, &self.gains, error as f64, self.dt);
        let max = self.gains.out_max;
        self.last_error_ns = error;
        self.offset_ns = (-raw).clamp(-max, max).round() as i64;
        self.offset_ns
    }

    pub fn reset(&mut self) {
        self.state.reset();
        self.last_error_ns = 0;
        self.offset_ns = 0;
    }

    /// Offset returned by the last update [ns].
    #[inline]
    pub fn offset_ns(&self) -> i64 {
        self.offset_ns
    }

    /// Phase error seen by the last update [ns].
    #[inline]
    pub fn last_error_ns(&self) -> i64 {
        self.last_error_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: i64 = 1_000_000;
    const DT: f64 = 0.001;

    #[test]
    fn proportional_only() {
        let mut s = PiState::default();
        let g = PiGains { kp: 0.5, ki: 0.0, tt: 0.0, out_max: 100.0 };
        assert!((pi_compute(&mut s, &g, 10.0, DT) - 5.0).abs() < 1e-12);
        assert_eq!(s.integral(), 0.0);
    }

    #[test]
    fn integral_accumulates() {
        let mut s = PiState::default();
        let g = PiGains { kp: 0.0, ki: 100.0, tt: 0.0, out_max: 100.0 };
        for _ in 0..10 {
            pi_compute(&mut s, &g, 1.0, DT);
        }
        assert!((s.integral() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn anti_windup_bounds_integral() {
        let mut s = PiState::default();
        let g = PiGains { kp: 1.0, ki: 1000.0, tt: 0.01, out_max: 10.0 };
        for _ in 0..10_000 {
            pi_compute(&mut s, &g, 100.0, DT);
        }
        // Unbounded the integral would reach 1e6.
        assert!(s.integral().abs() < 10_000.0, "integral {}", s.integral());
    }

    #[test]
    fn phase_error_wraps_to_half_period() {
        let sync = DcSync::new(&DcSyncConfig::default(), PERIOD);
        assert_eq!(sync.phase_error_ns(5 * PERIOD + 1_000), 1_000);
        assert_eq!(sync.phase_error_ns(5 * PERIOD - 1_000), -1_000);
        assert_eq!(sync.phase_error_ns(PERIOD / 2), -PERIOD / 2);

        let shifted = DcSync::new(&DcSyncConfig { shift_ns: 200_000, ..Default::default() }, PERIOD);
        assert_eq!(shifted.phase_error_ns(3 * PERIOD + 200_000), 0);
    }

    #[test]
    fn locks_onto_drifting_clock() {
        let mut sync = DcSync::new(&DcSyncConfig::default(), PERIOD);
        let drift = 200;
        let mut dc = 7 * PERIOD + 30_000;
        for _ in 0..20_000 {
            let offset = sync.update(Some(dc));
            // DC advances by the host's actual wake interval plus drift.
            dc += PERIOD + offset + drift;
        }
        assert!(sync.last_error_ns().abs() <= 2, "error {}", sync.last_error_ns());
        assert!((sync.offset_ns() + drift).abs() <= 2, "offset {}", sync.offset_ns());
    }

    #[test]
    fn output_is_clamped() {
        let cfg = DcSyncConfig { max_offset_ns: 5_000, ..Default::default() };
        let mut sync = DcSync::new(&cfg, PERIOD);
        for _ in 0..1_000 {
            sync.update(Some(PERIOD + 400_000));
        }
        assert_eq!(sync.offset_ns(), -5_000);
    }

    #[test]
    fn missing_sample_or_disabled_gives_zero() {
        let mut sync = DcSync::new(&DcSyncConfig::default(), PERIOD);
        assert_ne!(sync.update(Some(10_000)), 0);
        assert_eq!(sync.update(None), 0);
        assert_eq!(sync.offset_ns(), 0);

        let mut off = DcSync::new(&DcSyncConfig { enabled: false, ..Default::default() }, PERIOD);
        assert_eq!(off.update(Some(10_000)), 0);
    }
}
