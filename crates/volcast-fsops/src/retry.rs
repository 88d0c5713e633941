//! Bounded retry around single-file copies.

use std::path::Path;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};
use volcast_config::CopyPolicy;
use volcast_telemetry::Metrics;

use crate::model::{CopyOutcome, CopyStatus, SourceFile};
use crate::volume::VolumeHandle;

/// Copies one file with a fixed number of attempts and a constant backoff.
#[derive(Clone)]
pub struct RetryingCopier {
    max_attempts: u32,
    backoff: Duration,
    metrics: Option<Metrics>,
}

impl RetryingCopier {
    /// Copier making at most `max_attempts` attempts (at least one) with
    /// `backoff` between consecutive attempts.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            metrics: None,
        }
    }

    /// Copier configured from a validated policy.
    #[must_use]
    pub fn from_policy(policy: &CopyPolicy) -> Self {
        Self::new(policy.max_attempts, policy.backoff())
    }

    /// Count retried attempts in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Maximum attempts per file.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Copy `file` into `destination_dir` on `handle`.
    ///
    /// Returns on the first successful attempt. The backoff sleep blocks only
    /// the calling worker and is skipped after the final attempt.
    pub fn copy_one_file(
        &self,
        file: &SourceFile,
        destination_dir: &Path,
        handle: &dyn VolumeHandle,
    ) -> CopyOutcome {
        let volume = handle.identifier();
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match handle.copy_into(&file.path, destination_dir) {
                Ok(path) => {
                    debug!(volume, file = %file.name, attempt, path = %path.display(), "file copied");
                    return CopyOutcome {
                        file_name: file.name.clone(),
                        volume: volume.to_string(),
                        attempts: attempt,
                        status: CopyStatus::Succeeded,
                        error: None,
                    };
                }
                Err(err) => {
                    let detail = err.describe();
                    warn!(
                        volume,
                        file = %file.name,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %detail,
                        "copy attempt failed"
                    );
                    last_error = Some(detail);
                    if attempt < self.max_attempts {
                        if let Some(metrics) = &self.metrics {
                            metrics.inc_copy_retry();
                        }
                        if !self.backoff.is_zero() {
                            thread::sleep(self.backoff);
                        }
                    }
                }
            }
        }

        CopyOutcome {
            file_name: file.name.clone(),
            volume: volume.to_string(),
            attempts: self.max_attempts,
            status: CopyStatus::FailedAfterRetries,
            error: last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FsOpsError, FsOpsResult};
    use anyhow::Result;
    use std::io;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    /// Handle whose copies fail until `succeed_on` attempts have been made.
    struct CountingHandle {
        root: PathBuf,
        calls: AtomicU32,
        succeed_on: Option<u32>,
    }

    impl CountingHandle {
        fn new(succeed_on: Option<u32>) -> Self {
            Self {
                root: PathBuf::from("/media/test"),
                calls: AtomicU32::new(0),
                succeed_on,
            }
        }
    }

    impl VolumeHandle for CountingHandle {
        fn identifier(&self) -> &str {
            "/media/test"
        }

        fn root(&self) -> &Path {
            &self.root
        }

        fn ensure_directory(&self, relative_name: &str) -> FsOpsResult<PathBuf> {
            Ok(self.root.join(relative_name))
        }

        fn copy_into(&self, source_file: &Path, destination_dir: &Path) -> FsOpsResult<PathBuf> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let target = destination_dir.join(source_file.file_name().unwrap_or_default());
            if self.succeed_on.is_some_and(|succeed_on| call >= succeed_on) {
                Ok(target)
            } else {
                Err(FsOpsError::copy_failed(
                    self.identifier(),
                    target,
                    io::Error::other(format!("attempt {call} failed")),
                ))
            }
        }

        fn set_read_only(&self, _path: &Path) -> FsOpsResult<()> {
            Ok(())
        }

        fn set_label(&self, _label: &str) -> FsOpsResult<()> {
            Ok(())
        }
    }

    fn source_file() -> SourceFile {
        SourceFile {
            name: "ep01.mkv".into(),
            path: PathBuf::from("/src/ep01.mkv"),
        }
    }

    #[test]
    fn first_success_stops_retrying() {
        let handle = CountingHandle::new(Some(1));
        let copier = RetryingCopier::new(3, Duration::ZERO);
        let outcome = copier.copy_one_file(&source_file(), Path::new("/media/test/SHOW"), &handle);
        assert_eq!(outcome.status, CopyStatus::Succeeded);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(handle.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transient_failure_recovers_and_counts_retries() -> Result<()> {
        let metrics = Metrics::new()?;
        let handle = CountingHandle::new(Some(2));
        let copier = RetryingCopier::new(3, Duration::ZERO).with_metrics(metrics.clone());
        let outcome = copier.copy_one_file(&source_file(), Path::new("/media/test/SHOW"), &handle);
        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(metrics.snapshot().copy_retries, 1);
        Ok(())
    }

    #[test]
    fn exhaustion_reports_last_error() -> Result<()> {
        let metrics = Metrics::new()?;
        let handle = CountingHandle::new(None);
        let copier = RetryingCopier::new(3, Duration::ZERO).with_metrics(metrics.clone());
        let outcome = copier.copy_one_file(&source_file(), Path::new("/media/test/SHOW"), &handle);
        assert_eq!(outcome.status, CopyStatus::FailedAfterRetries);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(handle.calls.load(Ordering::SeqCst), 3);
        assert!(
            outcome
                .error
                .as_deref()
                .is_some_and(|error| error.contains("attempt 3 failed"))
        );
        // No retry is counted after the final attempt.
        assert_eq!(metrics.snapshot().copy_retries, 2);
        Ok(())
    }

    #[test]
    fn backoff_sleeps_between_attempts_only() {
        let handle = CountingHandle::new(None);
        let copier = RetryingCopier::new(2, Duration::from_millis(40));
        let started = Instant::now();
        let _ = copier.copy_one_file(&source_file(), Path::new("/media/test/SHOW"), &handle);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(40));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn zero_attempts_is_clamped_to_one() {
        let copier = RetryingCopier::new(0, Duration::ZERO);
        assert_eq!(copier.max_attempts(), 1);
    }
}
