//! Configuration validation
//!
//! Checks values serde cannot: power-of-two capacities, worker bounds and
//! non-zero report intervals.

use crate::Config;
use crate::engine::MAX_FLUSH_WORKERS;
use crate::error::{ConfigError, Result};

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_engine(config)?;
    validate_metrics(config)?;
    Ok(())
}

/// Check that a line capacity is usable
pub fn validate_capacity(section: &str, capacity: usize) -> Result<()> {
    if capacity == 0 {
        return Err(ConfigError::invalid_value(section, "capacity", "must be non-zero"));
    }
    if !capacity.is_power_of_two() {
        return Err(ConfigError::invalid_value(
            section,
            "capacity",
            format!("{} is not a power of two", capacity),
        ));
    }
    Ok(())
}

fn validate_engine(config: &Config) -> Result<()> {
    let engine = &config.engine;

    validate_capacity("engine", engine.default_capacity)?;

    for (name, line) in &engine.lines {
        validate_capacity(&format!("engine.lines.{}", name), line.capacity)?;
    }

    if engine.flush_workers > MAX_FLUSH_WORKERS {
        return Err(ConfigError::invalid_value(
            "engine",
            "flush_workers",
            format!("{} exceeds the maximum of {}", engine.flush_workers, MAX_FLUSH_WORKERS),
        ));
    }

    if engine.overflow == crate::OverflowPolicy::Drop && !config.metrics.enabled {
        tracing::warn!("overflow = \"drop\" with metrics disabled: dropped records only show in logs");
    }

    Ok(())
}

fn validate_metrics(config: &Config) -> Result<()> {
    if config.metrics.enabled && config.metrics.interval.is_zero() {
        return Err(ConfigError::invalid_value(
            "metrics",
            "interval",
            "must be greater than zero when metrics are enabled",
        ));
    }
    Ok(())
}
