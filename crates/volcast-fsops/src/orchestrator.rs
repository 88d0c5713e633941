//! Fans one file plan out to every target volume.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;
use volcast_config::{ConcurrencyMode, CopyPolicy};
use volcast_telemetry::Metrics;

use crate::cancel::CancelToken;
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::{FilePlan, RunReport, VolumeOutcome, VolumeTarget};
use crate::planner::CopyPlanner;
use crate::progress::{NoopProgress, ProgressSink};
use crate::retry::RetryingCopier;
use crate::volume::VolumeHandle;
use crate::worker::VolumeWorker;

/// Inputs for one run.
#[derive(Clone)]
pub struct CopyRequest {
    /// Directory whose top-level files are distributed.
    pub source_dir: PathBuf,
    /// Destination directory name and label prefix.
    pub new_name: String,
    /// Target volumes in label order.
    pub volumes: Vec<Arc<dyn VolumeHandle>>,
}

impl fmt::Debug for CopyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let volumes: Vec<&str> = self.volumes.iter().map(|volume| volume.identifier()).collect();
        f.debug_struct("CopyRequest")
            .field("source_dir", &self.source_dir)
            .field("new_name", &self.new_name)
            .field("volumes", &volumes)
            .finish()
    }
}

/// Runs the copy pipeline across volumes and assembles the [`RunReport`].
pub struct CopyOrchestrator {
    policy: CopyPolicy,
    metrics: Metrics,
    sink: Arc<dyn ProgressSink>,
    cancel: CancelToken,
}

impl CopyOrchestrator {
    /// Orchestrator applying `policy` and recording into `metrics`.
    #[must_use]
    pub fn new(policy: CopyPolicy, metrics: Metrics) -> Self {
        Self {
            policy,
            metrics,
            sink: Arc::new(NoopProgress),
            cancel: CancelToken::new(),
        }
    }

    /// Report progress to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Observe `cancel` between volumes and between files.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute one run.
    ///
    /// Per-volume failures are recorded in the report; only request-level
    /// problems abort the run.
    ///
    /// # Errors
    ///
    /// - [`FsOpsError::InvalidInput`] for an empty source path or a name that is
    ///   not a single path component.
    /// - [`FsOpsError::NoVolumesAvailable`] when `volumes` is empty.
    /// - [`FsOpsError::SourceUnavailable`] when the source cannot be listed.
    pub fn execute(&self, request: &CopyRequest) -> FsOpsResult<RunReport> {
        validate_request(request)?;
        if request.volumes.is_empty() {
            return Err(FsOpsError::NoVolumesAvailable);
        }

        let plan = CopyPlanner::plan(&request.source_dir)?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            %run_id,
            source = %request.source_dir.display(),
            new_name = %request.new_name,
            files = plan.len(),
            volumes = request.volumes.len(),
            mode = self.policy.concurrency.as_str(),
            "copy run started"
        );
        self.sink
            .on_run_started(run_id, plan.len(), request.volumes.len());

        let targets: Vec<VolumeTarget> = request
            .volumes
            .iter()
            .enumerate()
            .map(|(position, handle)| {
                VolumeTarget::new(handle.identifier(), &request.new_name, position + 1)
            })
            .collect();

        let copier = RetryingCopier::from_policy(&self.policy).with_metrics(self.metrics.clone());
        let worker = VolumeWorker::new(&copier, self.sink.as_ref(), &self.cancel)
            .with_metrics(&self.metrics)
            .with_relabel(self.policy.relabel);

        let volumes = match self.policy.concurrency {
            ConcurrencyMode::Sequential => targets
                .iter()
                .zip(&request.volumes)
                .map(|(target, handle)| {
                    panic::catch_unwind(AssertUnwindSafe(|| {
                        worker.run(target, handle.as_ref(), &plan, &request.new_name)
                    }))
                    .unwrap_or_else(|_| {
                        aborted(target, handle.as_ref(), &plan, &request.new_name)
                    })
                })
                .collect(),
            ConcurrencyMode::Parallel => {
                run_parallel(&worker, &targets, &request.volumes, &plan, &request.new_name)
            }
        };

        let report = RunReport {
            run_id,
            source_dir: request.source_dir.clone(),
            new_name: request.new_name.clone(),
            total_files: plan.len(),
            started_at,
            finished_at: Utc::now(),
            volumes,
        };
        let succeeded = report.is_success();
        info!(%run_id, succeeded, "copy run finished");
        self.sink.on_run_finished(run_id, succeeded);
        Ok(report)
    }
}

/// One scoped thread per volume. Outcomes are gathered by input position, and a
/// worker that panics is reported as an aborted volume, as in sequential mode.
fn run_parallel(
    worker: &VolumeWorker<'_>,
    targets: &[VolumeTarget],
    handles: &[Arc<dyn VolumeHandle>],
    plan: &FilePlan,
    new_name: &str,
) -> Vec<VolumeOutcome> {
    thread::scope(|scope| {
        let running: Vec<_> = targets
            .iter()
            .zip(handles)
            .map(|(target, handle)| {
                let handle = handle.as_ref();
                scope.spawn(move || worker.run(target, handle, plan, new_name))
            })
            .collect();

        running
            .into_iter()
            .zip(targets.iter().zip(handles))
            .map(|(joined, (target, handle))| {
                joined
                    .join()
                    .unwrap_or_else(|_| aborted(target, handle.as_ref(), plan, new_name))
            })
            .collect()
    })
}

fn aborted(
    target: &VolumeTarget,
    handle: &dyn VolumeHandle,
    plan: &FilePlan,
    new_name: &str,
) -> VolumeOutcome {
    error!(volume = %target.identifier, "volume worker panicked");
    VolumeOutcome::aborted(target.clone(), handle.root().join(new_name), plan.len())
}

fn validate_request(request: &CopyRequest) -> FsOpsResult<()> {
    if request.source_dir.as_os_str().is_empty() {
        return Err(FsOpsError::invalid_input("source_dir", "empty", None));
    }
    if request.new_name.trim().is_empty() {
        return Err(FsOpsError::invalid_input("new_name", "empty", None));
    }
    let mut components = Path::new(&request.new_name).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();
    if !single_normal {
        return Err(FsOpsError::invalid_input(
            "new_name",
            "not_single_component",
            Some(request.new_name.clone()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::volume::LocalVolume;
    use anyhow::Result;
    use std::fs;

    fn policy(concurrency: ConcurrencyMode) -> CopyPolicy {
        CopyPolicy {
            max_attempts: 2,
            backoff_ms: 0,
            concurrency,
            relabel: false,
        }
    }

    fn request(source: &Path, name: &str, roots: &[&Path]) -> CopyRequest {
        CopyRequest {
            source_dir: source.to_path_buf(),
            new_name: name.to_string(),
            volumes: roots
                .iter()
                .map(|root| Arc::new(LocalVolume::new(*root)) as Arc<dyn VolumeHandle>)
                .collect(),
        }
    }

    fn expect_err(result: FsOpsResult<RunReport>) -> Result<FsOpsError> {
        match result {
            Ok(_) => anyhow::bail!("expected the run to be rejected"),
            Err(err) => Ok(err),
        }
    }

    #[test]
    fn rejects_malformed_names() -> Result<()> {
        let source = tempfile::tempdir()?;
        let root = tempfile::tempdir()?;
        let orchestrator = CopyOrchestrator::new(policy(ConcurrencyMode::Sequential), Metrics::new()?);

        for name in ["", "   ", "a/b", "..", "/abs"] {
            let err = expect_err(orchestrator.execute(&request(source.path(), name, &[root.path()])))?;
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "name {name:?}");
        }

        let err = expect_err(orchestrator.execute(&request(Path::new(""), "SHOW", &[root.path()])))?;
        assert!(matches!(
            err,
            FsOpsError::InvalidInput {
                field: "source_dir",
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn empty_volume_list_is_reported_before_touching_the_source() -> Result<()> {
        let orchestrator = CopyOrchestrator::new(policy(ConcurrencyMode::Sequential), Metrics::new()?);
        let err = expect_err(orchestrator.execute(&request(Path::new("/definitely/missing"), "SHOW", &[])))?;
        assert_eq!(err.kind(), ErrorKind::NoVolumesAvailable);
        Ok(())
    }

    #[test]
    fn parallel_and_sequential_reports_keep_input_order() -> Result<()> {
        let source = tempfile::tempdir()?;
        fs::write(source.path().join("a.mkv"), b"a")?;
        let first = tempfile::tempdir()?;
        let second = tempfile::tempdir()?;
        let third = tempfile::tempdir()?;
        let roots = [first.path(), second.path(), third.path()];

        for mode in [ConcurrencyMode::Sequential, ConcurrencyMode::Parallel] {
            let orchestrator = CopyOrchestrator::new(policy(mode), Metrics::new()?);
            let report = orchestrator.execute(&request(source.path(), "SHOW", &roots))?;
            let labels: Vec<_> = report
                .volumes
                .iter()
                .map(|volume| volume.target.label.as_str())
                .collect();
            assert_eq!(labels, vec!["SHOW_1", "SHOW_2", "SHOW_3"]);
            assert!(report.is_success());
            assert_eq!(report.total_files, 1);
        }
        Ok(())
    }
}
