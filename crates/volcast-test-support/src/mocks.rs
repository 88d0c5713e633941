//! Fault-injecting volumes and recording progress sinks.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use volcast_fsops::{
    CancelToken, CopyOutcome, FsOpsError, FsOpsResult, LocalVolume, ProgressSink, VolumeHandle,
    VolumeOutcome, VolumeTarget,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Volume backed by a real directory that can be told to fail.
///
/// Copies, permission changes and directory creation go to a [`LocalVolume`]
/// unless a fault is configured. Labels are recorded instead of applied.
pub struct FlakyVolume {
    inner: LocalVolume,
    remaining_failures: Mutex<HashMap<String, u32>>,
    attempts: Mutex<HashMap<String, u32>>,
    labels: Mutex<Vec<String>>,
    fail_directory: bool,
    fail_label: bool,
    panic_on_copy: bool,
    read_only_failures: HashSet<String>,
}

impl FlakyVolume {
    /// Volume rooted at `root` with no faults configured.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            inner: LocalVolume::new(root),
            remaining_failures: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            labels: Mutex::new(Vec::new()),
            fail_directory: false,
            fail_label: false,
            panic_on_copy: false,
            read_only_failures: HashSet::new(),
        }
    }

    /// Fail the first `times` copy attempts of `file_name`.
    #[must_use]
    pub fn fail_file(self, file_name: &str, times: u32) -> Self {
        lock(&self.remaining_failures).insert(file_name.to_string(), times);
        self
    }

    /// Fail every copy attempt of `file_name`.
    #[must_use]
    pub fn always_fail(self, file_name: &str) -> Self {
        self.fail_file(file_name, u32::MAX)
    }

    /// Refuse to create the destination directory.
    #[must_use]
    pub const fn fail_directory(mut self) -> Self {
        self.fail_directory = true;
        self
    }

    /// Refuse to apply labels.
    #[must_use]
    pub const fn fail_label(mut self) -> Self {
        self.fail_label = true;
        self
    }

    /// Panic on the first copy attempt.
    #[must_use]
    pub const fn panic_on_copy(mut self) -> Self {
        self.panic_on_copy = true;
        self
    }

    /// Refuse to make `file_name` read-only.
    #[must_use]
    pub fn fail_read_only(mut self, file_name: &str) -> Self {
        self.read_only_failures.insert(file_name.to_string());
        self
    }

    /// Copy attempts made for `file_name`.
    #[must_use]
    pub fn attempts(&self, file_name: &str) -> u32 {
        lock(&self.attempts).get(file_name).copied().unwrap_or(0)
    }

    /// Labels applied so far.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        lock(&self.labels).clone()
    }
}

impl VolumeHandle for FlakyVolume {
    fn identifier(&self) -> &str {
        self.inner.identifier()
    }

    fn root(&self) -> &Path {
        self.inner.root()
    }

    fn ensure_directory(&self, relative_name: &str) -> FsOpsResult<PathBuf> {
        if self.fail_directory {
            return Err(FsOpsError::DestinationUnwritable {
                volume: self.identifier().to_string(),
                path: self.root().join(relative_name),
                reason: "injected",
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }
        self.inner.ensure_directory(relative_name)
    }

    fn copy_into(&self, source_file: &Path, destination_dir: &Path) -> FsOpsResult<PathBuf> {
        assert!(!self.panic_on_copy, "injected copy panic");
        let name = source_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        *lock(&self.attempts).entry(name.clone()).or_insert(0) += 1;

        let should_fail = lock(&self.remaining_failures)
            .get_mut(&name)
            .is_some_and(|remaining| {
                if *remaining == 0 {
                    return false;
                }
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                true
            });
        if should_fail {
            return Err(FsOpsError::CopyFailed {
                volume: self.identifier().to_string(),
                path: destination_dir.join(&name),
                source: io::Error::other(format!("injected failure for {name}")),
            });
        }
        self.inner.copy_into(source_file, destination_dir)
    }

    fn set_read_only(&self, path: &Path) -> FsOpsResult<()> {
        let refused = path
            .file_name()
            .is_some_and(|name| self.read_only_failures.contains(&*name.to_string_lossy()));
        if refused {
            return Err(FsOpsError::PermissionChangeFailed {
                path: path.to_path_buf(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }
        self.inner.set_read_only(path)
    }

    fn set_label(&self, label: &str) -> FsOpsResult<()> {
        if self.fail_label {
            return Err(FsOpsError::relabel(
                self.identifier(),
                label,
                "injected",
                None,
            ));
        }
        lock(&self.labels).push(label.to_string());
        Ok(())
    }
}

/// Progress notification captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressRecord {
    /// `on_volume_started`.
    VolumeStarted {
        /// Volume identifier.
        volume: String,
        /// 1-based volume position.
        index: usize,
    },
    /// `on_file_copied`.
    FileCopied {
        /// Volume identifier.
        volume: String,
        /// Files completed so far.
        completed: usize,
        /// Files planned.
        total: usize,
    },
    /// `on_file_failed`.
    FileFailed {
        /// Volume identifier.
        volume: String,
        /// Failed file.
        file: String,
    },
    /// `on_volume_finished`.
    VolumeFinished {
        /// Volume identifier.
        volume: String,
        /// Whether the volume succeeded.
        succeeded: bool,
    },
}

/// Sink that records every notification and can cancel a run after a number
/// of copied files.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<ProgressRecord>>,
    cancel_after: Option<(usize, CancelToken)>,
}

impl RecordingSink {
    /// Sink that only records.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that cancels `token` once `files` copies have completed in total.
    #[must_use]
    pub fn cancelling_after(files: usize, token: CancelToken) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            cancel_after: Some((files, token)),
        }
    }

    /// Every notification received so far.
    #[must_use]
    pub fn records(&self) -> Vec<ProgressRecord> {
        lock(&self.records).clone()
    }

    /// `completed` counts reported for `volume`, in order.
    #[must_use]
    pub fn copied_counts(&self, volume: &str) -> Vec<usize> {
        lock(&self.records)
            .iter()
            .filter_map(|record| match record {
                ProgressRecord::FileCopied {
                    volume: recorded,
                    completed,
                    ..
                } if recorded == volume => Some(*completed),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn on_file_copied(&self, volume: &str, completed: usize, total: usize) {
        let mut records = lock(&self.records);
        records.push(ProgressRecord::FileCopied {
            volume: volume.to_string(),
            completed,
            total,
        });
        if let Some((limit, token)) = &self.cancel_after {
            let copied = records
                .iter()
                .filter(|record| matches!(record, ProgressRecord::FileCopied { .. }))
                .count();
            if copied >= *limit {
                token.cancel();
            }
        }
    }

    fn on_volume_started(&self, target: &VolumeTarget) {
        lock(&self.records).push(ProgressRecord::VolumeStarted {
            volume: target.identifier.clone(),
            index: target.index,
        });
    }

    fn on_file_failed(&self, outcome: &CopyOutcome) {
        lock(&self.records).push(ProgressRecord::FileFailed {
            volume: outcome.volume.clone(),
            file: outcome.file_name.clone(),
        });
    }

    fn on_volume_finished(&self, outcome: &VolumeOutcome) {
        lock(&self.records).push(ProgressRecord::VolumeFinished {
            volume: outcome.target.identifier.clone(),
            succeeded: outcome.is_success(),
        });
    }
}
