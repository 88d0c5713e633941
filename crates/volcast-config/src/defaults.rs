//! Default values and environment keys for configuration documents.
//!
//! # Design
//! - Centralize defaults so the loader, validation and CLI agree on them.
//! - Keep environment variable names explicit for discoverability.

/// Copy attempts per file before the file is reported as failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Fixed pause between copy attempts in milliseconds.
pub const DEFAULT_BACKOFF_MS: u64 = 1_000;
/// Upper bound accepted for `max_attempts`.
pub const MAX_ATTEMPTS_LIMIT: u32 = 100;
/// Upper bound accepted for `backoff_ms`.
pub const MAX_BACKOFF_MS: u64 = 60_000;
/// Log level used when neither the document nor `RUST_LOG` provide one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment override for `copy.max_attempts`.
pub const ENV_MAX_ATTEMPTS: &str = "VOLCAST_MAX_ATTEMPTS";
/// Environment override for `copy.backoff_ms`.
pub const ENV_BACKOFF_MS: &str = "VOLCAST_BACKOFF_MS";
/// Environment override for `copy.concurrency`.
pub const ENV_CONCURRENCY: &str = "VOLCAST_CONCURRENCY";
/// Environment override for `copy.relabel`.
pub const ENV_RELABEL: &str = "VOLCAST_RELABEL";
/// Environment override for `telemetry.level`.
pub const ENV_LOG_LEVEL: &str = "VOLCAST_LOG_LEVEL";
/// Environment override for `telemetry.format`.
pub const ENV_LOG_FORMAT: &str = "VOLCAST_LOG_FORMAT";
