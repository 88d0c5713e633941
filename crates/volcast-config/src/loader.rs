//! Configuration loading from an optional JSON document plus environment overrides.
//!
//! # Design
//! - Missing documents fall back to defaults; a present but broken document is an error.
//! - Environment lookups are injected so overrides can be tested without mutating the process env.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::defaults::{
    ENV_BACKOFF_MS, ENV_CONCURRENCY, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_MAX_ATTEMPTS, ENV_RELABEL,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::VolcastConfig;
use crate::validate::{parse_bool, parse_u32, parse_u64, validate_config};

/// Load configuration from `path` (when given) and the process environment.
///
/// # Errors
///
/// Returns an error if the document cannot be read or parsed, or if the
/// resulting configuration fails validation.
pub fn load_config(path: Option<&Path>) -> ConfigResult<VolcastConfig> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration using a caller-supplied environment lookup.
///
/// # Errors
///
/// Returns an error if the document cannot be read or parsed, an override
/// cannot be parsed, or the resulting configuration fails validation.
pub fn load_config_with_env<F>(path: Option<&Path>, lookup: F) -> ConfigResult<VolcastConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => read_document(path)?,
        None => VolcastConfig::default(),
    };
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config)?;
    Ok(config)
}

fn read_document(path: &Path) -> ConfigResult<VolcastConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded configuration document");
    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env_overrides<F>(config: &mut VolcastConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_MAX_ATTEMPTS) {
        config.copy.max_attempts = parse_u32("copy", "max_attempts", &raw)?;
    }
    if let Some(raw) = lookup(ENV_BACKOFF_MS) {
        config.copy.backoff_ms = parse_u64("copy", "backoff_ms", &raw)?;
    }
    if let Some(raw) = lookup(ENV_CONCURRENCY) {
        config.copy.concurrency = raw.parse()?;
    }
    if let Some(raw) = lookup(ENV_RELABEL) {
        config.copy.relabel = parse_bool("copy", "relabel", &raw)?;
    }
    if let Some(raw) = lookup(ENV_LOG_LEVEL) {
        config.telemetry.level = raw;
    }
    if let Some(raw) = lookup(ENV_LOG_FORMAT) {
        config.telemetry.format = Some(raw.trim().to_ascii_lowercase());
    }
    Ok(())
}
