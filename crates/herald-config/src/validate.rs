//! Post-merge configuration validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 4] = ["pretty", "compact", "json", "full"];

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_events(config)?;
    validate_logging(config)?;
    Ok(())
}

fn validate_events(config: &Config) -> ConfigResult<()> {
    if config.events.max_listeners < 0 {
        return Err(ConfigError::ValidationError {
            field: "events.max_listeners".to_owned(),
            message: format!(
                "max_listeners must be a non-negative integer (0 = unbounded), got {}",
                config.events.max_listeners
            ),
        });
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let level = config.logging.level.as_str();
    if level.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: "log level must not be empty".to_owned(),
        });
    }
    if !VALID_LEVELS.contains(&level) {
        return Err(ConfigError::ValidationError {
            field: "logging.level".to_owned(),
            message: format!(
                "unsupported log level '{level}'; expected one of: {}",
                VALID_LEVELS.join(", ")
            ),
        });
    }

    let format = config.logging.format.as_str();
    if !VALID_FORMATS.contains(&format) {
        return Err(ConfigError::ValidationError {
            field: "logging.format".to_owned(),
            message: format!(
                "unsupported log format '{format}'; expected one of: {}",
                VALID_FORMATS.join(", ")
            ),
        });
    }

    Ok(())
}
