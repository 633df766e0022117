//! Simulated machining I/O.
//!
//! The live feed distance is only produced while both the voltage gate and
//! machining enable are on. Scripted values are consumed first, one per
//! read; afterwards the constant feed rate is returned.

use std::collections::VecDeque;

use edm_common::hal::MachiningIo;
use tracing::trace;

/// Scriptable generator, gap servo and touch sensor.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMachining {
    /// Feed distance per read once the script is exhausted [blu]
    feed_rate: f64,
    /// Per-read feed distances consumed before `feed_rate` [blu]
    script: VecDeque<f64>,
    /// Physical touch input
    touch: bool,
    /// High-voltage gate output
    voltage_gate: bool,
    /// Machining enable output
    machining_enable: bool,
    /// Spindle rotation output
    spindle: bool,
    /// Flushing pump output
    flushing_pump: bool,
    /// Reads that returned a feed distance
    feed_reads: u64,
}

impl SimulatedMachining {
    /// Idle I/O: no feed, no touch, all outputs off.
    pub fn new() -> Self {
        Self::default()
    }

    /// I/O feeding `rate` blu per cycle while machining.
    pub fn with_feed_rate(rate: f64) -> Self {
        Self { feed_rate: rate, ..Self::default() }
    }

    /// Set the constant feed per cycle [blu].
    pub fn set_feed_rate(&mut self, rate: f64) {
        self.feed_rate = rate;
    }

    /// Queue per-cycle feed distances [blu].
    pub fn push_feed_script<I: IntoIterator<Item = f64>>(&mut self, feeds: I) {
        self.script.extend(feeds);
    }

    /// Set the physical touch input.
    pub fn set_touch(&mut self, on: bool) {
        self.touch = on;
    }

    /// Generator is on.
    pub fn is_machining(&self) -> bool {
        self.voltage_gate && self.machining_enable
    }

    /// High-voltage gate output.
    pub fn voltage_gate(&self) -> bool {
        self.voltage_gate
    }

    /// Machining enable output.
    pub fn machining_enable(&self) -> bool {
        self.machining_enable
    }

    /// Spindle output.
    pub fn spindle(&self) -> bool {
        self.spindle
    }

    /// Flushing pump output.
    pub fn flushing_pump(&self) -> bool {
        self.flushing_pump
    }

    /// Reads that produced a feed distance.
    pub fn feed_reads(&self) -> u64 {
        self.feed_reads
    }
}

impl MachiningIo for SimulatedMachining {
    fn read_live_feed_distance(&mut self) -> f64 {
        if !self.is_machining() {
            return 0.0;
        }
        self.feed_reads += 1;
        self.script.pop_front().unwrap_or(self.feed_rate)
    }

    fn touch_physically_detected(&self) -> bool {
        self.touch
    }

    fn set_voltage_gate(&mut self, on: bool) {
        if self.voltage_gate != on {
            trace!(on, "voltage gate");
        }
        self.voltage_gate = on;
    }

    fn set_machining_enable(&mut self, on: bool) {
        self.machining_enable = on;
    }

    fn set_spindle(&mut self, on: bool) {
        self.spindle = on;
    }

    fn set_flushing_pump(&mut self, on: bool) {
        self.flushing_pump = on;
    }
}
