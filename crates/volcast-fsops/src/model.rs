//! Plan and report types shared by the copy pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ErrorKind, FsOpsError};

/// A regular file discovered at the top level of the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFile {
    /// Display name of the file (lossy UTF-8 for unusual names).
    pub name: String,
    /// Absolute or caller-relative path to the file.
    pub path: PathBuf,
}

/// Ordered, immutable list of files to copy. Cloning shares the list, so every
/// volume worker sees exactly the same plan.
#[derive(Debug, Clone)]
pub struct FilePlan {
    source_dir: PathBuf,
    files: Arc<[SourceFile]>,
}

impl FilePlan {
    pub(crate) fn new(source_dir: PathBuf, files: Vec<SourceFile>) -> Self {
        Self {
            source_dir,
            files: files.into(),
        }
    }

    /// Directory the plan was built from.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Planned files in copy order.
    #[must_use]
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Number of planned files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the source directory contained no regular files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A volume as seen by one run: its identifier, 1-based position in the input
/// list and the label it should carry afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeTarget {
    /// Volume identifier (mount root or device path).
    pub identifier: String,
    /// 1-based position in the input list.
    pub index: usize,
    /// Label derived as `{new_name}_{index}`.
    pub label: String,
}

impl VolumeTarget {
    /// Derive the target for the volume at 1-based `index`.
    #[must_use]
    pub fn new(identifier: impl Into<String>, new_name: &str, index: usize) -> Self {
        Self {
            identifier: identifier.into(),
            index,
            label: format!("{new_name}_{index}"),
        }
    }
}

/// Final state of one file on one volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStatus {
    /// The file was copied on one of its attempts.
    Succeeded,
    /// Every attempt failed.
    FailedAfterRetries,
}

/// Outcome of copying one file onto one volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyOutcome {
    /// Name of the copied file.
    pub file_name: String,
    /// Volume identifier.
    pub volume: String,
    /// Attempts made, always at least one.
    pub attempts: u32,
    /// Final status.
    pub status: CopyStatus,
    /// Last error observed when the copy failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CopyOutcome {
    /// Whether the copy eventually succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == CopyStatus::Succeeded
    }
}

/// Status recorded for a per-volume step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step ran to completion.
    Completed,
    /// Step ran and failed.
    Failed,
    /// Step was not run.
    Skipped,
}

impl StepStatus {
    /// Stable string form used in metrics labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of a per-volume step such as relabelling or finalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Step status.
    pub status: StepStatus,
    /// Failure classification when the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Free-form detail (error description, skip reason, counts).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StepReport {
    /// Completed step with optional detail.
    #[must_use]
    pub const fn completed(detail: Option<String>) -> Self {
        Self {
            status: StepStatus::Completed,
            error_kind: None,
            detail,
        }
    }

    /// Skipped step with a reason.
    #[must_use]
    pub fn skipped(reason: &str) -> Self {
        Self {
            status: StepStatus::Skipped,
            error_kind: None,
            detail: Some(reason.to_string()),
        }
    }

    /// Failed step derived from a pipeline error.
    #[must_use]
    pub fn failed(error: &FsOpsError) -> Self {
        Self::failed_with(error.kind(), error.describe())
    }

    /// Failed step with an explicit classification and detail.
    #[must_use]
    pub const fn failed_with(kind: ErrorKind, detail: String) -> Self {
        Self {
            status: StepStatus::Failed,
            error_kind: Some(kind),
            detail: Some(detail),
        }
    }

    /// Whether the step failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// Everything that happened on one volume during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeOutcome {
    /// The volume and its derived label.
    pub target: VolumeTarget,
    /// Destination directory on the volume.
    pub destination: PathBuf,
    /// Files planned for this volume.
    pub planned_files: usize,
    /// Destination directory preparation.
    pub directory: StepReport,
    /// Per-file outcomes in plan order; shorter than the plan after a
    /// fail-fast stop or cancellation.
    pub files: Vec<CopyOutcome>,
    /// Relabel step.
    pub relabel: StepReport,
    /// Read-only finalisation step.
    pub finalize: StepReport,
    /// Files made read-only during finalisation.
    pub read_only_files: usize,
    /// Whether cancellation interrupted this volume.
    pub cancelled: bool,
}

impl VolumeOutcome {
    /// Outcome for a volume whose worker terminated without reporting.
    #[must_use]
    pub fn aborted(target: VolumeTarget, destination: PathBuf, planned_files: usize) -> Self {
        let detail = "volume worker aborted".to_string();
        Self {
            target,
            destination,
            planned_files,
            directory: StepReport::failed_with(ErrorKind::DestinationUnwritable, detail),
            files: Vec::new(),
            relabel: StepReport::skipped("worker_aborted"),
            finalize: StepReport::skipped("worker_aborted"),
            read_only_files: 0,
            cancelled: false,
        }
    }

    /// Number of files copied successfully.
    #[must_use]
    pub fn copied(&self) -> usize {
        self.files.iter().filter(|outcome| outcome.succeeded()).count()
    }

    /// First file that exhausted its retries, if any.
    #[must_use]
    pub fn failed_file(&self) -> Option<&CopyOutcome> {
        self.files.iter().find(|outcome| !outcome.succeeded())
    }

    /// A volume succeeds when every planned file was copied and the relabel did
    /// not fail. A skipped relabel (disabled by policy) does not count as a
    /// failure. Finalisation is best effort and is reported separately.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.cancelled
            && self.directory.status == StepStatus::Completed
            && self.copied() == self.planned_files
            && !self.relabel.is_failed()
    }
}

/// Report for a whole run, one entry per input volume in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Identifier of the run.
    pub run_id: Uuid,
    /// Source directory.
    pub source_dir: PathBuf,
    /// Base name used for the destination directory and labels.
    pub new_name: String,
    /// Files planned for every volume.
    pub total_files: usize,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the last volume finished.
    pub finished_at: DateTime<Utc>,
    /// Per-volume outcomes in input order.
    pub volumes: Vec<VolumeOutcome>,
}

impl RunReport {
    /// Whether every volume succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.volumes.iter().all(VolumeOutcome::is_success)
    }

    /// Volumes that did not succeed.
    pub fn failed_volumes(&self) -> impl Iterator<Item = &VolumeOutcome> {
        self.volumes.iter().filter(|volume| !volume.is_success())
    }

    /// Whether cancellation interrupted any volume.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.volumes.iter().any(|volume| volume.cancelled)
    }
}
