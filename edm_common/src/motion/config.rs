//! Configuration structures for the motion core.
//!
//! All config types use `serde::Deserialize` for TOML loading. Every section
//! and field has a default so a partial file (or an empty one) is valid.
//! Numeric bounds are checked by [`MotionConfig::validate`].

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, LogLevel};
use crate::consts::{
    AXIS_SLOTS, CYCLE_TIME_US, CYCLE_TIME_US_MAX, CYCLE_TIME_US_MIN, DEFAULT_BLU_PER_MM, MIN_AXES,
};

use super::plan::{JumpParam, PlanInput};

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level motion core configuration.
///
/// Loaded from TOML at startup and immutable afterwards (jump parameters
/// are the only runtime-adjustable values, via `set_jump_param`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Servo cycle time in microseconds (default: 1000 = 1ms).
    pub cycle_time_us: u64,
    /// Number of physical axes (3..=6).
    pub axis_count: usize,
    /// Base length units per millimetre.
    pub blu_per_mm: f64,
    /// Logging verbosity.
    pub log_level: LogLevel,
    pub rt: RtConfig,
    pub ethercat: EthercatConfig,
    pub dc_sync: DcSyncConfig,
    pub channels: ChannelConfig,
    pub shutdown: ShutdownConfig,
    pub feed: FeedConfig,
    /// Default jump parameters.
    pub jump: JumpParam,
    /// Default planner limits for manual point moves.
    pub manual: PlanInput,
    /// Default planner limits for rapid moves.
    pub rapid: PlanInput,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: CYCLE_TIME_US,
            axis_count: 3,
            blu_per_mm: DEFAULT_BLU_PER_MM,
            log_level: LogLevel::default(),
            rt: RtConfig::default(),
            ethercat: EthercatConfig::default(),
            dc_sync: DcSyncConfig::default(),
            channels: ChannelConfig::default(),
            shutdown: ShutdownConfig::default(),
            feed: FeedConfig::default(),
            jump: JumpParam::default(),
            manual: PlanInput::default(),
            rapid: PlanInput {
                cruise_velocity: 10_000.0,
                accel_limit: 1_000_000.0,
                decel_limit: -1_000_000.0,
                jerk_period_count: 20,
                ..PlanInput::default()
            },
        }
    }
}

impl MotionConfig {
    /// Cycle period [s].
    #[inline]
    pub fn cycle_period_s(&self) -> f64 {
        self.cycle_time_us as f64 / 1_000_000.0
    }

    /// Cycle period [ns].
    #[inline]
    pub fn cycle_period_ns(&self) -> i64 {
        self.cycle_time_us as i64 * 1000
    }

    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(CYCLE_TIME_US_MIN..=CYCLE_TIME_US_MAX).contains(&self.cycle_time_us) {
            return Err(invalid(format!(
                "cycle_time_us {} out of range [{CYCLE_TIME_US_MIN}, {CYCLE_TIME_US_MAX}]",
                self.cycle_time_us
            )));
        }
        if !(MIN_AXES..=AXIS_SLOTS).contains(&self.axis_count) {
            return Err(invalid(format!(
                "axis_count {} out of range [{MIN_AXES}, {AXIS_SLOTS}]",
                self.axis_count
            )));
        }
        if !(self.blu_per_mm.is_finite() && self.blu_per_mm > 0.0) {
            return Err(invalid(format!("blu_per_mm must be > 0, got {}", self.blu_per_mm)));
        }
        for (name, plan) in [
            ("manual", &self.manual),
            ("rapid", &self.rapid),
            ("jump.plan", &self.jump.plan),
        ] {
            if !plan.is_valid() {
                return Err(invalid(format!(
                    "{name}: cruise/accel must be > 0, decel < 0, boundary velocities >= 0"
                )));
            }
        }
        if !self.jump.is_valid() {
            return Err(invalid("jump: retract_height and buffer_distance must be >= 0".into()));
        }
        if self.ethercat.max_connect_tries == 0 {
            return Err(invalid("ethercat.max_connect_tries must be >= 1".into()));
        }
        if self.dc_sync.max_offset_ns < 0 || self.dc_sync.max_offset_ns > self.cycle_period_ns() / 2 {
            return Err(invalid(format!(
                "dc_sync.max_offset_ns must be in [0, {}]",
                self.cycle_period_ns() / 2
            )));
        }
        if self.channels.signal_capacity == 0 {
            return Err(invalid("channels.signal_capacity must be >= 1".into()));
        }
        if self.channels.status_publish_interval == 0 {
            return Err(invalid("channels.status_publish_interval must be >= 1".into()));
        }
        if self.feed.jump_start_margin < 0.0 {
            return Err(invalid("feed.jump_start_margin must be >= 0".into()));
        }
        if self.feed.resume_policy != ResumePolicy::InPlace {
            return Err(invalid(
                "feed.resume_policy: only \"in_place\" is supported".into(),
            ));
        }
        Ok(())
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::ValidationError(msg)
}

// ─── Sections ───────────────────────────────────────────────────────

/// Real-time thread placement. Applied only with the `rt` feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RtConfig {
    /// CPU core to pin the RT thread to.
    pub cpu_core: usize,
    /// SCHED_FIFO priority.
    pub priority: i32,
}

impl Default for RtConfig {
    fn default() -> Self {
        Self {
            cpu_core: 1,
            priority: 80,
        }
    }
}

/// EtherCAT connect/enable behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EthercatConfig {
    /// Attempts passed to the network's `connect`.
    pub max_connect_tries: u32,
    /// Connect without waiting for a `ConnectEthercat` command.
    pub auto_connect: bool,
    /// Cycles allowed for all drives to reach Operation Enabled.
    pub enable_timeout_cycles: u32,
    /// Cycles to wait in Disconnected before an automatic reconnect.
    pub reconnect_backoff_cycles: u32,
}

impl Default for EthercatConfig {
    fn default() -> Self {
        Self {
            max_connect_tries: 3,
            auto_connect: true,
            enable_timeout_cycles: 5000,
            reconnect_backoff_cycles: 1000,
        }
    }
}

/// Distributed-clock synchronisation of the wake time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DcSyncConfig {
    pub enabled: bool,
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain [1/s].
    pub ki: f64,
    /// Desired phase of the host wake-up inside the DC period [ns].
    pub shift_ns: i64,
    /// Output clamp [ns].
    pub max_offset_ns: i64,
}

impl Default for DcSyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kp: 0.1,
            ki: 0.5,
            shift_ns: 0,
            max_offset_ns: 100_000,
        }
    }
}

/// Command/signal/status plumbing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Signal queue capacity.
    pub signal_capacity: usize,
    /// Publish the status snapshot every N cycles.
    pub status_publish_interval: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            signal_capacity: 256,
            status_publish_interval: 1,
        }
    }
}

/// Thread shutdown behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Cycles to wait for motion to stop before forcing exit.
    pub stop_retry_cycles: u32,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            stop_retry_cycles: 2000,
        }
    }
}

/// Resume behaviour after a servo-feed/drill pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Continue machining at the pause position.
    #[default]
    InPlace,
    /// Return to the machining start first (not supported).
    BackToStart,
}

/// Servo-feed behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Distance a jump retract stays in front of the segment start [blu].
    pub jump_start_margin: f64,
    pub resume_policy: ResumePolicy,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            jump_start_margin: 0.0,
            resume_policy: ResumePolicy::InPlace,
        }
    }
}
