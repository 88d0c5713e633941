//! # Design
//!
//! - Structured, constant-message errors for the copy pipeline.
//! - Context (paths, volumes, files) lives in fields so reports and tests can
//!   inspect it without parsing strings.
//! - Every variant maps onto a serialisable [`ErrorKind`] for run reports.

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Result type for copy pipeline operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Serialisable classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The source directory could not be listed.
    SourceUnavailable,
    /// The request itself was malformed.
    InvalidInput,
    /// No target volumes were supplied or discovered.
    NoVolumesAvailable,
    /// The destination directory could not be prepared.
    DestinationUnwritable,
    /// A file could not be copied within its retry budget.
    CopyFailed,
    /// A file permission could not be changed.
    PermissionChangeFailed,
    /// The volume label could not be changed.
    RelabelFailed,
    /// The destination tree could not be traversed.
    Traversal,
}

impl ErrorKind {
    /// Stable string form used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceUnavailable => "source_unavailable",
            Self::InvalidInput => "invalid_input",
            Self::NoVolumesAvailable => "no_volumes_available",
            Self::DestinationUnwritable => "destination_unwritable",
            Self::CopyFailed => "copy_failed",
            Self::PermissionChangeFailed => "permission_change_failed",
            Self::RelabelFailed => "relabel_failed",
            Self::Traversal => "traversal",
        }
    }
}

/// Errors produced by the copy pipeline.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// The source directory is missing or unreadable.
    #[error("source directory unavailable")]
    SourceUnavailable {
        /// Source directory that failed to list.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Request validation failures.
    #[error("invalid copy request")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// No volumes were available to copy onto.
    #[error("no target volumes available")]
    NoVolumesAvailable,
    /// The destination directory could not be created or is read-only.
    #[error("destination directory unwritable")]
    DestinationUnwritable {
        /// Volume identifier.
        volume: String,
        /// Directory that could not be prepared.
        path: PathBuf,
        /// Static reason for the failure.
        reason: &'static str,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A single copy attempt failed.
    #[error("file copy failed")]
    CopyFailed {
        /// Volume identifier.
        volume: String,
        /// Destination path of the attempted copy.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Permission changes failed for a path.
    #[error("permission change failed")]
    PermissionChangeFailed {
        /// Path whose permissions could not be changed.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Relabelling a volume failed or is unsupported.
    #[error("volume relabel failed")]
    RelabelFailed {
        /// Volume identifier.
        volume: String,
        /// Requested label.
        label: String,
        /// Static reason for the failure.
        reason: &'static str,
        /// Tool output or other detail when available.
        detail: Option<String>,
    },
    /// Walkdir traversal failures.
    #[error("destination traversal failed")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
}

impl FsOpsError {
    pub(crate) fn source_unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_input(
        field: &'static str,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::InvalidInput {
            field,
            reason,
            value,
        }
    }

    pub(crate) fn destination_unwritable(
        volume: &str,
        path: impl Into<PathBuf>,
        reason: &'static str,
        source: io::Error,
    ) -> Self {
        Self::DestinationUnwritable {
            volume: volume.to_string(),
            path: path.into(),
            reason,
            source,
        }
    }

    pub(crate) fn copy_failed(volume: &str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::CopyFailed {
            volume: volume.to_string(),
            path: path.into(),
            source,
        }
    }

    pub(crate) fn permission(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::PermissionChangeFailed {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Build a relabel failure. Public so platform labelers outside this crate
    /// can report errors in the pipeline's vocabulary.
    #[must_use]
    pub fn relabel(
        volume: &str,
        label: &str,
        reason: &'static str,
        detail: Option<String>,
    ) -> Self {
        Self::RelabelFailed {
            volume: volume.to_string(),
            label: label.to_string(),
            reason,
            detail,
        }
    }

    /// Classification used in run reports.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::NoVolumesAvailable => ErrorKind::NoVolumesAvailable,
            Self::DestinationUnwritable { .. } => ErrorKind::DestinationUnwritable,
            Self::CopyFailed { .. } => ErrorKind::CopyFailed,
            Self::PermissionChangeFailed { .. } => ErrorKind::PermissionChangeFailed,
            Self::RelabelFailed { .. } => ErrorKind::RelabelFailed,
            Self::Walkdir { .. } => ErrorKind::Traversal,
        }
    }

    /// Human-readable rendering including context fields and the source chain.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = self.to_string();
        let _ = match self {
            Self::SourceUnavailable { path, source } => {
                write!(out, " ({}): {source}", path.display())
            }
            Self::InvalidInput {
                field,
                reason,
                value,
            } => match value {
                Some(value) => write!(out, ": {field} {reason} ({value})"),
                None => write!(out, ": {field} {reason}"),
            },
            Self::NoVolumesAvailable => Ok(()),
            Self::DestinationUnwritable {
                path,
                reason,
                source,
                ..
            } => write!(out, " ({}, {reason}): {source}", path.display()),
            Self::CopyFailed { path, source, .. } => {
                write!(out, " ({}): {source}", path.display())
            }
            Self::PermissionChangeFailed { path, source } => {
                write!(out, " ({}): {source}", path.display())
            }
            Self::RelabelFailed {
                label,
                reason,
                detail,
                ..
            } => match detail {
                Some(detail) => write!(out, " ({label}, {reason}): {detail}"),
                None => write!(out, " ({label}, {reason})"),
            },
            Self::Walkdir {
                operation,
                path,
                source,
            } => write!(out, " ({operation} at {}): {source}", path.display()),
        };
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use walkdir::WalkDir;

    fn io_error() -> io::Error {
        io::Error::other("io")
    }

    #[test]
    fn helpers_build_variants_with_sources() -> Result<(), Box<dyn Error>> {
        let source = FsOpsError::source_unavailable("/missing", io_error());
        assert_eq!(source.kind(), ErrorKind::SourceUnavailable);
        assert!(source.source().is_some());

        let copy = FsOpsError::copy_failed("/media/a", "/media/a/x/f.txt", io_error());
        assert_eq!(copy.kind(), ErrorKind::CopyFailed);
        assert!(copy.source().is_some());

        let dest = FsOpsError::destination_unwritable("/media/a", "/media/a/x", "create", io_error());
        assert_eq!(dest.kind(), ErrorKind::DestinationUnwritable);

        let perm = FsOpsError::permission("/media/a/x/f.txt", io_error());
        assert_eq!(perm.kind(), ErrorKind::PermissionChangeFailed);

        let temp = tempfile::tempdir()?;
        let missing = temp.path().join("missing");
        let walkdir_error = WalkDir::new(&missing)
            .into_iter()
            .next()
            .and_then(Result::err)
            .ok_or_else(|| io::Error::other("expected walkdir error"))?;
        let walk = FsOpsError::walkdir("finalize.walk", &missing, walkdir_error);
        assert_eq!(walk.kind(), ErrorKind::Traversal);
        assert!(walk.source().is_some());
        Ok(())
    }

    #[test]
    fn messages_stay_constant_and_describe_adds_context() {
        let err = FsOpsError::relabel("/media/a", "SHOW_1", "unsupported", None);
        assert_eq!(err.to_string(), "volume relabel failed");
        assert!(err.source().is_none());
        assert_eq!(err.describe(), "volume relabel failed (SHOW_1, unsupported)");

        let err = FsOpsError::invalid_input("new_name", "empty", None);
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.describe(), "invalid copy request: new_name empty");

        let err = FsOpsError::copy_failed("/media/a", "/media/a/x/f.txt", io_error());
        assert_eq!(err.describe(), "file copy failed (/media/a/x/f.txt): io");
    }

    #[test]
    fn kinds_serialize_as_snake_case() -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(ErrorKind::NoVolumesAvailable)?;
        assert_eq!(value, "no_volumes_available");
        assert_eq!(ErrorKind::Traversal.as_str(), "traversal");
        Ok(())
    }
}
