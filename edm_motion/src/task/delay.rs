//! Dwell (G04).

use edm_common::axis::AxisVec;
use edm_common::motion::status::RunState;

use super::TaskSettings;

/// Holds position for a number of cycles.
#[derive(Debug, Clone)]
pub struct Delay {
    target_cycles: u64,
    elapsed: u64,
    state: RunState,
    position: AxisVec,
}

impl Delay {
    /// `None` for a negative or non-finite duration.
    pub fn start(settings: &TaskSettings, position: AxisVec, seconds: f64) -> Option<Self> {
        if !(seconds.is_finite() && seconds >= 0.0) {
            return None;
        }
        Some(Self {
            target_cycles: (seconds / settings.period_s).round() as u64,
            elapsed: 0,
            state: RunState::Running,
            position,
        })
    }

    pub fn run_once(&mut self) -> AxisVec {
        if self.state == RunState::Running {
            if self.elapsed < self.target_cycles {
                self.elapsed += 1;
            }
            if self.elapsed >= self.target_cycles {
                self.state = RunState::Stopped;
            }
        }
        self.position
    }

    /// Freeze the counter.
    pub fn pause(&mut self) -> bool {
        if self.state == RunState::Running {
            self.state = RunState::Paused;
            true
        } else {
            false
        }
    }

    pub fn resume(&mut self) -> bool {
        if self.state == RunState::Paused {
            self.state = RunState::Running;
            true
        } else {
            false
        }
    }

    /// Complete at once.
    pub fn stop(&mut self, _immediate: bool) -> bool {
        if self.state == RunState::Stopped {
            return false;
        }
        self.state = RunState::Stopped;
        true
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[inline]
    pub fn position(&self) -> AxisVec {
        self.position
    }

    #[inline]
    pub fn elapsed_cycles(&self) -> u64 {
        self.elapsed
    }

    #[inline]
    pub fn target_cycles(&self) -> u64 {
        self.target_cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TaskSettings {
        TaskSettings { period_s: 0.001, jump_start_margin: 0.0 }
    }

    #[test]
    fn counts_cycles() {
        let mut d = Delay::start(&settings(), AxisVec::ZERO, 0.005).unwrap();
        assert_eq!(d.target_cycles(), 5);
        for _ in 0..4 {
            d.run_once();
            assert_eq!(d.state(), RunState::Running);
        }
        d.run_once();
        assert_eq!(d.state(), RunState::Stopped);
    }

    #[test]
    fn pause_freezes_counter() {
        let mut d = Delay::start(&settings(), AxisVec::ZERO, 0.003).unwrap();
        d.run_once();
        assert!(d.pause());
        for _ in 0..10 {
            d.run_once();
        }
        assert_eq!(d.elapsed_cycles(), 1);
        assert!(d.resume());
        d.run_once();
        d.run_once();
        assert_eq!(d.state(), RunState::Stopped);
    }

    #[test]
    fn zero_delay_completes_on_first_cycle() {
        let mut d = Delay::start(&settings(), AxisVec::ZERO, 0.0).unwrap();
        d.run_once();
        assert_eq!(d.state(), RunState::Stopped);
        assert!(Delay::start(&settings(), AxisVec::ZERO, -1.0).is_none());
    }

    #[test]
    fn stop_completes() {
        let mut d = Delay::start(&settings(), AxisVec::ZERO, 10.0).unwrap();
        assert!(d.stop(false));
        assert_eq!(d.state(), RunState::Stopped);
        assert!(!d.stop(false));
    }
}
