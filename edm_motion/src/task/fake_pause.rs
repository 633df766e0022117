//! Operator-acknowledged hold point (M00).

use edm_common::axis::AxisVec;
use edm_common::motion::status::RunState;

/// No motion. Starts paused; `resume` acknowledges the hold and completes.
#[derive(Debug, Clone)]
pub struct FakePause {
    state: RunState,
    position: AxisVec,
}

impl FakePause {
    pub fn start(position: AxisVec) -> Self {
        Self { state: RunState::Paused, position }
    }

    #[inline]
    pub fn run_once(&mut self) -> AxisVec {
        self.position
    }

    /// Always paused already.
    pub fn pause(&mut self) -> bool {
        self.state == RunState::Paused
    }

    pub fn resume(&mut self) -> bool {
        if self.state == RunState::Paused {
            self.state = RunState::Stopped;
            true
        } else {
            false
        }
    }

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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_acknowledges() {
        let mut f = FakePause::start(AxisVec::ZERO);
        assert_eq!(f.state(), RunState::Paused);
        assert!(f.pause());
        assert!(f.resume());
        assert_eq!(f.state(), RunState::Stopped);
        assert!(!f.resume());
        assert!(!f.pause());
    }
}
