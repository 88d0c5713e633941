//! Validation helpers and parsing utilities for configuration documents.

use crate::defaults::{MAX_ATTEMPTS_LIMIT, MAX_BACKOFF_MS};
use crate::error::{ConfigError, ConfigResult};
use crate::model::VolcastConfig;

/// Validate a fully assembled configuration document.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] for the first out-of-range value.
pub fn validate_config(config: &VolcastConfig) -> ConfigResult<()> {
    let copy = &config.copy;
    if copy.max_attempts == 0 {
        return Err(ConfigError::invalid(
            "copy",
            "max_attempts",
            Some(copy.max_attempts.to_string()),
            "must_be_positive",
        ));
    }
    if copy.max_attempts > MAX_ATTEMPTS_LIMIT {
        return Err(ConfigError::invalid(
            "copy",
            "max_attempts",
            Some(copy.max_attempts.to_string()),
            "too_large",
        ));
    }
    if copy.backoff_ms > MAX_BACKOFF_MS {
        return Err(ConfigError::invalid(
            "copy",
            "backoff_ms",
            Some(copy.backoff_ms.to_string()),
            "too_large",
        ));
    }

    let telemetry = &config.telemetry;
    if telemetry.level.trim().is_empty() {
        return Err(ConfigError::invalid("telemetry", "level", None, "empty"));
    }
    if let Some(format) = telemetry.format.as_deref()
        && !matches!(format, "json" | "pretty")
    {
        return Err(ConfigError::invalid(
            "telemetry",
            "format",
            Some(format.to_string()),
            "unknown_format",
        ));
    }
    Ok(())
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_u32(section: &'static str, field: &'static str, raw: &str) -> ConfigResult<u32> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(section, field, Some(raw.to_string()), "not_an_integer"))
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_u64(section: &'static str, field: &'static str, raw: &str) -> ConfigResult<u64> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(section, field, Some(raw.to_string()), "not_an_integer"))
}

#[allow(clippy::redundant_pub_crate)]
pub(crate) fn parse_bool(section: &'static str, field: &'static str, raw: &str) -> ConfigResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(
            section,
            field,
            Some(raw.to_string()),
            "not_a_boolean",
        )),
    }
}
