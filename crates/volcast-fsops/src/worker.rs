//! Per-volume pipeline: directory, copies, relabel, read-only finalisation.

use std::path::Path;

use tracing::{info, warn};
use volcast_telemetry::Metrics;
use walkdir::WalkDir;

use crate::cancel::CancelToken;
use crate::error::FsOpsError;
use crate::model::{FilePlan, StepReport, VolumeOutcome, VolumeTarget};
use crate::progress::ProgressSink;
use crate::retry::RetryingCopier;
use crate::volume::VolumeHandle;

const STEP_DIRECTORY: &str = "directory";
const STEP_RELABEL: &str = "relabel";
const STEP_FINALIZE: &str = "finalize";

/// Drives one volume through the pipeline. Workers borrow everything they
/// share, so one worker value can serve several scoped threads.
pub struct VolumeWorker<'a> {
    copier: &'a RetryingCopier,
    sink: &'a dyn ProgressSink,
    cancel: &'a CancelToken,
    metrics: Option<&'a Metrics>,
    relabel: bool,
}

impl<'a> VolumeWorker<'a> {
    /// Worker copying with `copier`, reporting to `sink` and observing `cancel`.
    #[must_use]
    pub const fn new(
        copier: &'a RetryingCopier,
        sink: &'a dyn ProgressSink,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            copier,
            sink,
            cancel,
            metrics: None,
            relabel: true,
        }
    }

    /// Record step and volume counters in `metrics`.
    #[must_use]
    pub const fn with_metrics(mut self, metrics: &'a Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enable or disable the relabel step.
    #[must_use]
    pub const fn with_relabel(mut self, relabel: bool) -> Self {
        self.relabel = relabel;
        self
    }

    /// Run the full sequence for `target` on `handle`.
    ///
    /// Never fails: every problem is recorded in the returned outcome.
    pub fn run(
        &self,
        target: &VolumeTarget,
        handle: &dyn VolumeHandle,
        plan: &FilePlan,
        new_name: &str,
    ) -> VolumeOutcome {
        let mut outcome = VolumeOutcome {
            target: target.clone(),
            destination: handle.root().join(new_name),
            planned_files: plan.len(),
            directory: StepReport::skipped("not_started"),
            files: Vec::with_capacity(plan.len()),
            relabel: StepReport::skipped("not_started"),
            finalize: StepReport::skipped("not_started"),
            read_only_files: 0,
            cancelled: false,
        };

        if self.cancel.is_cancelled() {
            outcome.cancelled = true;
            outcome.directory = StepReport::skipped("cancelled");
            outcome.relabel = StepReport::skipped("cancelled");
            outcome.finalize = StepReport::skipped("cancelled");
            self.finish(&outcome);
            return outcome;
        }

        self.sink.on_volume_started(target);
        info!(volume = %target.identifier, label = %target.label, files = plan.len(), "volume started");

        match handle.ensure_directory(new_name) {
            Ok(destination) => {
                outcome.destination = destination;
                outcome.directory = StepReport::completed(None);
            }
            Err(err) => {
                warn!(volume = %target.identifier, error = %err.describe(), "destination unavailable");
                outcome.directory = StepReport::failed(&err);
                outcome.relabel = StepReport::skipped("directory_failed");
                outcome.finalize = StepReport::skipped("directory_failed");
                self.record_step(STEP_DIRECTORY, &outcome.directory);
                self.finish(&outcome);
                return outcome;
            }
        }
        self.record_step(STEP_DIRECTORY, &outcome.directory);

        self.copy_files(&mut outcome, handle, plan);

        outcome.relabel = if self.relabel {
            match handle.set_label(&target.label) {
                Ok(()) => StepReport::completed(Some(target.label.clone())),
                Err(err) => {
                    warn!(volume = %target.identifier, label = %target.label, error = %err.describe(), "relabel failed");
                    StepReport::failed(&err)
                }
            }
        } else {
            StepReport::skipped("disabled")
        };
        self.record_step(STEP_RELABEL, &outcome.relabel);

        let (finalize, read_only_files) = finalize_read_only(handle, &outcome.destination);
        outcome.finalize = finalize;
        outcome.read_only_files = read_only_files;
        self.record_step(STEP_FINALIZE, &outcome.finalize);

        self.finish(&outcome);
        outcome
    }

    fn copy_files(&self, outcome: &mut VolumeOutcome, handle: &dyn VolumeHandle, plan: &FilePlan) {
        let total = plan.len();
        for file in plan.files() {
            if self.cancel.is_cancelled() {
                info!(volume = %outcome.target.identifier, copied = outcome.files.len(), "copy cancelled");
                outcome.cancelled = true;
                return;
            }

            let copy = self
                .copier
                .copy_one_file(file, &outcome.destination, handle);
            let succeeded = copy.succeeded();
            if let Some(metrics) = self.metrics {
                metrics.inc_file(succeeded);
            }
            if succeeded {
                outcome.files.push(copy);
                self.sink
                    .on_file_copied(&outcome.target.identifier, outcome.files.len(), total);
            } else {
                warn!(
                    volume = %outcome.target.identifier,
                    file = %copy.file_name,
                    attempts = copy.attempts,
                    "file failed after retries; abandoning volume"
                );
                self.sink.on_file_failed(&copy);
                outcome.files.push(copy);
                return;
            }
        }
    }

    fn record_step(&self, step: &str, report: &StepReport) {
        if let Some(metrics) = self.metrics {
            metrics.inc_step(step, report.status.as_str());
        }
    }

    fn finish(&self, outcome: &VolumeOutcome) {
        let succeeded = outcome.is_success();
        if let Some(metrics) = self.metrics {
            metrics.inc_volume(succeeded, outcome.cancelled);
        }
        info!(
            volume = %outcome.target.identifier,
            succeeded,
            copied = outcome.copied(),
            planned = outcome.planned_files,
            cancelled = outcome.cancelled,
            "volume finished"
        );
        self.sink.on_volume_finished(outcome);
    }
}

/// Mark every regular file under `destination` read-only, including files left
/// by earlier runs. Failures are collected and the walk continues.
fn finalize_read_only(handle: &dyn VolumeHandle, destination: &Path) -> (StepReport, usize) {
    let mut read_only = 0;
    let mut failures = 0_usize;
    let mut first_error: Option<FsOpsError> = None;

    for entry in WalkDir::new(destination) {
        let result = match entry {
            Ok(entry) if entry.file_type().is_file() => handle.set_read_only(entry.path()),
            Ok(_) => continue,
            Err(source) => Err(FsOpsError::walkdir("finalize.walk", destination, source)),
        };
        match result {
            Ok(()) => read_only += 1,
            Err(err) => {
                warn!(
                    volume = %handle.identifier(),
                    error = %err.describe(),
                    "read-only finalisation failed for entry"
                );
                failures += 1;
                first_error.get_or_insert(err);
            }
        }
    }

    let report = match first_error {
        None => StepReport::completed(Some(format!("read_only_files={read_only}"))),
        Some(err) => StepReport::failed_with(
            err.kind(),
            format!("failures={failures} first={}", err.describe()),
        ),
    };
    (report, read_only)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::StepStatus;
    use crate::planner::CopyPlanner;
    use crate::progress::NoopProgress;
    use crate::volume::LocalVolume;
    use anyhow::Result;
    use std::fs;
    use std::time::Duration;

    fn source_with(files: &[&str]) -> Result<tempfile::TempDir> {
        let source = tempfile::tempdir()?;
        for name in files {
            fs::write(source.path().join(name), name.as_bytes())?;
        }
        Ok(source)
    }

    #[test]
    fn copies_everything_and_finalizes() -> Result<()> {
        let source = source_with(&["a.mkv", "b.mkv"])?;
        let root = tempfile::tempdir()?;
        let plan = CopyPlanner::plan(source.path())?;
        let volume = LocalVolume::new(root.path());
        let copier = RetryingCopier::new(3, Duration::ZERO);
        let cancel = CancelToken::new();
        let metrics = Metrics::new()?;
        let worker = VolumeWorker::new(&copier, &NoopProgress, &cancel)
            .with_metrics(&metrics)
            .with_relabel(false);

        let target = VolumeTarget::new(volume.identifier(), "SHOW", 1);
        let outcome = worker.run(&target, &volume, &plan, "SHOW");

        assert!(outcome.is_success());
        assert_eq!(outcome.copied(), 2);
        assert_eq!(outcome.relabel.status, StepStatus::Skipped);
        assert_eq!(outcome.read_only_files, 2);
        assert!(root.path().join("SHOW").join("b.mkv").is_file());
        assert_eq!(metrics.step_count(STEP_FINALIZE, "completed"), 1);
        assert_eq!(metrics.snapshot().volumes_succeeded, 1);
        Ok(())
    }

    #[test]
    fn missing_volume_fails_directory_and_skips_the_rest() -> Result<()> {
        let source = source_with(&["a.mkv"])?;
        let temp = tempfile::tempdir()?;
        let plan = CopyPlanner::plan(source.path())?;
        let volume = LocalVolume::new(temp.path().join("unplugged"));
        let copier = RetryingCopier::new(1, Duration::ZERO);
        let cancel = CancelToken::new();
        let worker = VolumeWorker::new(&copier, &NoopProgress, &cancel);

        let target = VolumeTarget::new(volume.identifier(), "SHOW", 1);
        let outcome = worker.run(&target, &volume, &plan, "SHOW");

        assert_eq!(outcome.directory.status, StepStatus::Failed);
        assert_eq!(
            outcome.directory.error_kind,
            Some(ErrorKind::DestinationUnwritable)
        );
        assert!(outcome.files.is_empty());
        assert_eq!(outcome.relabel.status, StepStatus::Skipped);
        assert_eq!(outcome.finalize.status, StepStatus::Skipped);
        assert!(!outcome.is_success());
        Ok(())
    }

    #[test]
    fn relabel_failure_is_recorded_after_copies() -> Result<()> {
        let source = source_with(&["a.mkv"])?;
        let root = tempfile::tempdir()?;
        let plan = CopyPlanner::plan(source.path())?;
        let volume = LocalVolume::new(root.path());
        let copier = RetryingCopier::new(1, Duration::ZERO);
        let cancel = CancelToken::new();
        let worker = VolumeWorker::new(&copier, &NoopProgress, &cancel);

        let target = VolumeTarget::new(volume.identifier(), "SHOW", 1);
        let outcome = worker.run(&target, &volume, &plan, "SHOW");

        assert_eq!(outcome.copied(), 1);
        assert_eq!(outcome.relabel.error_kind, Some(ErrorKind::RelabelFailed));
        assert_eq!(outcome.finalize.status, StepStatus::Completed);
        assert!(!outcome.is_success());
        Ok(())
    }

    #[test]
    fn cancelled_token_skips_the_volume() -> Result<()> {
        let source = source_with(&["a.mkv"])?;
        let root = tempfile::tempdir()?;
        let plan = CopyPlanner::plan(source.path())?;
        let volume = LocalVolume::new(root.path());
        let copier = RetryingCopier::new(1, Duration::ZERO);
        let cancel = CancelToken::new();
        cancel.cancel();
        let worker = VolumeWorker::new(&copier, &NoopProgress, &cancel);

        let target = VolumeTarget::new(volume.identifier(), "SHOW", 1);
        let outcome = worker.run(&target, &volume, &plan, "SHOW");

        assert!(outcome.cancelled);
        assert!(outcome.files.is_empty());
        assert!(!root.path().join("SHOW").exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn finalisation_covers_residue_from_earlier_runs() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let source = source_with(&["a.mkv"])?;
        let root = tempfile::tempdir()?;
        let residue_dir = root.path().join("SHOW").join("extras");
        fs::create_dir_all(&residue_dir)?;
        let residue = residue_dir.join("old.nfo");
        fs::write(&residue, b"old")?;

        let plan = CopyPlanner::plan(source.path())?;
        let volume = LocalVolume::new(root.path());
        let copier = RetryingCopier::new(1, Duration::ZERO);
        let cancel = CancelToken::new();
        let worker = VolumeWorker::new(&copier, &NoopProgress, &cancel).with_relabel(false);

        let target = VolumeTarget::new(volume.identifier(), "SHOW", 1);
        let outcome = worker.run(&target, &volume, &plan, "SHOW");

        assert_eq!(outcome.read_only_files, 2);
        assert_eq!(fs::metadata(&residue)?.permissions().mode() & 0o777, 0o400);
        Ok(())
    }
}
