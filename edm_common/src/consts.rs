//! System-wide constants for the EDM workspace.
//!
//! Single source of truth for numeric limits and default paths.

/// Number of axis slots carried by every [`AxisVec`](crate::axis::AxisVec).
///
/// Machines use 3 to 6 of them; unused slots stay at zero.
pub const AXIS_SLOTS: usize = 6;

/// Minimum number of configured physical axes.
pub const MIN_AXES: usize = 3;

/// Default servo cycle time in microseconds (1 kHz = 1000 µs).
pub const CYCLE_TIME_US: u64 = 1000;

/// Lower bound for the configured cycle time [µs].
pub const CYCLE_TIME_US_MIN: u64 = 125;

/// Upper bound for the configured cycle time [µs].
pub const CYCLE_TIME_US_MAX: u64 = 10_000;

/// Maximum waypoints in a single servo-feed command.
pub const MAX_WAYPOINTS: usize = 32;

/// Capacity of the pause-time manual move recorder.
pub const MAX_RECORDER_ENTRIES: usize = 64;

/// Default base length units per millimetre (1 blu = 1 µm).
pub const DEFAULT_BLU_PER_MM: f64 = 1000.0;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/edm/motion.toml";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(MIN_AXES <= AXIS_SLOTS);
        assert!(CYCLE_TIME_US_MIN <= CYCLE_TIME_US && CYCLE_TIME_US <= CYCLE_TIME_US_MAX);
        assert!(MAX_WAYPOINTS > 0);
        assert!(MAX_RECORDER_ENTRIES > 0);
        assert!(DEFAULT_BLU_PER_MM > 0.0);
    }
}
