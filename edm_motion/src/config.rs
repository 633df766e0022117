//! Configuration loading for the motion core.
//!
//! Parses `MotionConfig` from TOML, then runs the field bounds of
//! [`MotionConfig::validate`] followed by the controller-level checks
//! below.

use std::path::Path;

use edm_common::config::{ConfigError, ConfigLoader};
use edm_common::motion::config::MotionConfig;
use tracing::info;

// ─── Loading Functions ──────────────────────────────────────────────

/// Load and validate the motion configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<MotionConfig, ConfigError> {
    let config = MotionConfig::load(path)?;
    validate(&config)?;
    info!(
        path = %path.display(),
        cycle_time_us = config.cycle_time_us,
        axes = config.axis_count,
        "motion config loaded"
    );
    Ok(config)
}

/// Load config from a TOML string (for testing).
pub fn load_config_from_str(content: &str) -> Result<MotionConfig, ConfigError> {
    let config = MotionConfig::from_toml(content)?;
    validate(&config)?;
    Ok(config)
}

// ─── Validation ─────────────────────────────────────────────────────

/// Field bounds plus checks that depend on how the controller uses them.
pub fn validate(config: &MotionConfig) -> Result<(), ConfigError> {
    config.validate()?;

    let dc = &config.dc_sync;
    if !(dc.kp.is_finite() && dc.kp >= 0.0 && dc.ki.is_finite() && dc.ki >= 0.0) {
        return Err(ConfigError::ValidationError(format!(
            "dc_sync: kp and ki must be finite and >= 0 (kp={}, ki={})",
            dc.kp, dc.ki
        )));
    }
    if !(0..config.cycle_period_ns()).contains(&dc.shift_ns) {
        return Err(ConfigError::ValidationError(format!(
            "dc_sync.shift_ns {} must lie inside the cycle period [0, {})",
            dc.shift_ns,
            config.cycle_period_ns()
        )));
    }
    if config.ethercat.enable_timeout_cycles == 0 {
        return Err(ConfigError::ValidationError(
            "ethercat.enable_timeout_cycles must be >= 1".into(),
        ));
    }
    if config.shutdown.stop_retry_cycles == 0 {
        return Err(ConfigError::ValidationError(
            "shutdown.stop_retry_cycles must be >= 1".into(),
        ));
    }
    Ok(())
}
