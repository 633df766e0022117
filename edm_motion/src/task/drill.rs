//! Small-hole drilling.
//!
//! A servo feed along a single segment with the spindle and flushing pump
//! switched together with the generator. While servoing the drill records
//! three positions:
//!
//! - touch start: where the feed began
//! - touch trigger: first feed reversal deeper than the configured threshold
//! - breakout: first window after the trigger in which the electrode
//!   advanced at least `breakout_advance`

use edm_common::axis::AxisVec;
use edm_common::motion::plan::DrillParam;
use edm_common::motion::status::{JumpPhase, RunState};
use tracing::info;

use crate::context::{Auxiliaries, MotionContext};

use super::{ServoFeed, TaskSettings};

#[derive(Debug, Clone)]
pub struct Drill {
    feed: ServoFeed,
    param: DrillParam,
    touch_start: AxisVec,
    touch_trigger: Option<AxisVec>,
    breakout: Option<AxisVec>,
    window_cycles: u32,
    window_start: f64,
}

impl Drill {
    pub fn start(
        settings: &TaskSettings,
        ctx: &mut MotionContext<'_>,
        from: AxisVec,
        target: AxisVec,
        param: &DrillParam,
    ) -> Option<Self> {
        let aux = Auxiliaries {
            spindle: param.spindle,
            flushing_pump: param.flushing_pump,
        };
        let feed = ServoFeed::start(settings, ctx, from, &[target], aux)?;
        Some(Self {
            feed,
            param: *param,
            touch_start: from,
            touch_trigger: None,
            breakout: None,
            window_cycles: 0,
            window_start: 0.0,
        })
    }

    pub fn run_once(&mut self, ctx: &mut MotionContext<'_>) -> AxisVec {
        let position = self.feed.run_once(ctx);
        if self.feed.state() == RunState::Running && self.feed.jump_phase() == JumpPhase::Servoing
        {
            self.observe(position);
        }
        position
    }

    fn observe(&mut self, position: AxisVec) {
        if self.touch_trigger.is_none() {
            if self.feed.last_feed() < -self.param.touch_reversal_threshold {
                self.touch_trigger = Some(position);
                self.window_start = self.feed.cursor();
                info!(depth = self.feed.cursor(), "drill touch triggered");
            }
            return;
        }
        if self.breakout.is_some()
            || self.param.breakout_window_cycles == 0
            || self.param.breakout_advance <= 0.0
        {
            return;
        }
        self.window_cycles += 1;
        if self.window_cycles < self.param.breakout_window_cycles {
            return;
        }
        let advance = self.feed.cursor() - self.window_start;
        if advance >= self.param.breakout_advance {
            self.breakout = Some(position);
            info!(depth = self.feed.cursor(), advance, "drill breakout detected");
        }
        self.window_cycles = 0;
        self.window_start = self.feed.cursor();
    }

    #[inline]
    pub fn pause(&mut self) -> bool {
        self.feed.pause()
    }

    #[inline]
    pub fn resume(&mut self) -> bool {
        self.feed.resume()
    }

    #[inline]
    pub fn stop(&mut self, immediate: bool) -> bool {
        self.feed.stop(immediate)
    }

    #[inline]
    pub fn state(&self) -> RunState {
        self.feed.state()
    }

    #[inline]
    pub fn position(&self) -> AxisVec {
        self.feed.position()
    }

    #[inline]
    pub fn jump_phase(&self) -> JumpPhase {
        self.feed.jump_phase()
    }

    #[inline]
    pub fn touch_start(&self) -> AxisVec {
        self.touch_start
    }

    #[inline]
    pub fn touch_trigger(&self) -> Option<AxisVec> {
        self.touch_trigger
    }

    #[inline]
    pub fn breakout(&self) -> Option<AxisVec> {
        self.breakout
    }
}
