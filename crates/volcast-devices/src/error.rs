//! Error types for volume discovery.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while enumerating removable volumes.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No discovery strategy exists for this platform.
    #[error("volume discovery unsupported on this platform")]
    Unsupported {
        /// Target operating system.
        platform: &'static str,
    },
    /// A discovery tool could not be started.
    #[error("failed to run discovery tool")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A discovery tool exited unsuccessfully.
    #[error("discovery tool failed")]
    ToolFailed {
        /// Program that failed.
        program: String,
        /// Exit code when the process was not killed by a signal.
        code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
    /// `lsblk` or PowerShell output did not match the expected JSON shape.
    #[error("failed to parse discovery tool JSON")]
    Json {
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// `diskutil` output was not a valid property list.
    #[error("failed to parse diskutil output")]
    Plist {
        /// Underlying plist error.
        source: plist::Error,
    },
    /// A mount directory could not be listed.
    #[error("failed to list mount directory")]
    ReadDir {
        /// Directory that failed to list.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

/// Convenience alias for discovery results.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
