//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers; every field has a default so partial documents load.
//! - IO and override logic stays in `loader.rs`.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_BACKOFF_MS, DEFAULT_LOG_LEVEL, DEFAULT_MAX_ATTEMPTS};
use crate::error::ConfigError;

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VolcastConfig {
    /// Copy pipeline policy.
    pub copy: CopyPolicy,
    /// Logging settings.
    pub telemetry: TelemetrySettings,
}

/// Policy applied by the copy pipeline to every volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CopyPolicy {
    /// Copy attempts per file, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between attempts, in milliseconds.
    pub backoff_ms: u64,
    /// Whether volumes are processed one at a time or side by side.
    pub concurrency: ConcurrencyMode,
    /// Whether volumes are relabelled after copying.
    pub relabel: bool,
}

impl Default for CopyPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
            concurrency: ConcurrencyMode::Sequential,
            relabel: true,
        }
    }
}

impl CopyPolicy {
    /// Pause between copy attempts.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Scheduling mode for per-volume workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    /// One volume after another on the calling thread.
    #[default]
    Sequential,
    /// One worker thread per volume.
    Parallel,
}

impl ConcurrencyMode {
    /// Render the mode as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }
}

impl FromStr for ConcurrencyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            _ => Err(ConfigError::invalid(
                "copy",
                "concurrency",
                Some(s.to_string()),
                "unknown_mode",
            )),
        }
    }
}

/// Logging settings consumed by the telemetry crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySettings {
    /// Log level or `EnvFilter` directive.
    pub level: String,
    /// Output format (`pretty` or `json`); inferred from the build when unset.
    pub format: Option<String>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: None,
        }
    }
}
