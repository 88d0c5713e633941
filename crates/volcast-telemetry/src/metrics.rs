//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes only the counters the copy pipeline reports.

use std::sync::Arc;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

const FILE_SUCCEEDED: &str = "succeeded";
const FILE_FAILED: &str = "failed_after_retries";
const VOLUME_SUCCEEDED: &str = "succeeded";
const VOLUME_FAILED: &str = "failed";
const VOLUME_CANCELLED: &str = "cancelled";

/// Prometheus-backed metrics registry shared by one or more runs.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    files_total: IntCounterVec,
    copy_retries_total: IntCounter,
    volumes_total: IntCounterVec,
    steps_total: IntCounterVec,
}

/// Snapshot of the pipeline counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Files copied successfully.
    pub files_succeeded: u64,
    /// Files that exhausted their retry budget.
    pub files_failed: u64,
    /// Copy attempts that were retried after a failure.
    pub copy_retries: u64,
    /// Volumes that completed without failures.
    pub volumes_succeeded: u64,
    /// Volumes with at least one failure.
    pub volumes_failed: u64,
    /// Volumes interrupted by cancellation.
    pub volumes_cancelled: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the pipeline collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let files_total = IntCounterVec::new(
            Opts::new("volcast_files_total", "Files processed per volume by outcome"),
            &["outcome"],
        )
        .map_err(|source| TelemetryError::build("volcast_files_total", source))?;
        let copy_retries_total = IntCounter::with_opts(Opts::new(
            "volcast_copy_retries_total",
            "Copy attempts retried after a transient failure",
        ))
        .map_err(|source| TelemetryError::build("volcast_copy_retries_total", source))?;
        let volumes_total = IntCounterVec::new(
            Opts::new("volcast_volumes_total", "Volumes processed by outcome"),
            &["outcome"],
        )
        .map_err(|source| TelemetryError::build("volcast_volumes_total", source))?;
        let steps_total = IntCounterVec::new(
            Opts::new(
                "volcast_steps_total",
                "Per-volume pipeline steps executed by status",
            ),
            &["step", "status"],
        )
        .map_err(|source| TelemetryError::build("volcast_steps_total", source))?;

        Self::register(&registry, "volcast_files_total", files_total.clone())?;
        Self::register(
            &registry,
            "volcast_copy_retries_total",
            copy_retries_total.clone(),
        )?;
        Self::register(&registry, "volcast_volumes_total", volumes_total.clone())?;
        Self::register(&registry, "volcast_steps_total", steps_total.clone())?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                files_total,
                copy_retries_total,
                volumes_total,
                steps_total,
            }),
        })
    }

    fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
    where
        C: prometheus::core::Collector + 'static,
    {
        registry
            .register(Box::new(collector))
            .map_err(|source| TelemetryError::register(name, source))
    }

    /// Record the final outcome of one file on one volume.
    pub fn inc_file(&self, succeeded: bool) {
        let outcome = if succeeded { FILE_SUCCEEDED } else { FILE_FAILED };
        self.inner.files_total.with_label_values(&[outcome]).inc();
    }

    /// Record a retried copy attempt.
    pub fn inc_copy_retry(&self) {
        self.inner.copy_retries_total.inc();
    }

    /// Record the outcome of a whole volume.
    pub fn inc_volume(&self, succeeded: bool, cancelled: bool) {
        let outcome = if cancelled {
            VOLUME_CANCELLED
        } else if succeeded {
            VOLUME_SUCCEEDED
        } else {
            VOLUME_FAILED
        };
        self.inner.volumes_total.with_label_values(&[outcome]).inc();
    }

    /// Increment the per-volume step counter.
    pub fn inc_step(&self, step: &str, status: &str) {
        self.inner
            .steps_total
            .with_label_values(&[step, status])
            .inc();
    }

    /// Read the step counter for a `step`/`status` pair.
    #[must_use]
    pub fn step_count(&self, step: &str, status: &str) -> u64 {
        self.inner
            .steps_total
            .with_label_values(&[step, status])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded.
    pub fn render(&self) -> Result<String> {
        let metric_families = self.inner.registry.gather();
        let mut text = String::new();
        TextEncoder::new()
            .encode_utf8(&metric_families, &mut text)
            .map_err(|source| TelemetryError::Render { source })?;
        Ok(text)
    }

    /// Take a point-in-time snapshot of the pipeline counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let files = &self.inner.files_total;
        let volumes = &self.inner.volumes_total;
        MetricsSnapshot {
            files_succeeded: files.with_label_values(&[FILE_SUCCEEDED]).get(),
            files_failed: files.with_label_values(&[FILE_FAILED]).get(),
            copy_retries: self.inner.copy_retries_total.get(),
            volumes_succeeded: volumes.with_label_values(&[VOLUME_SUCCEEDED]).get(),
            volumes_failed: volumes.with_label_values(&[VOLUME_FAILED]).get(),
            volumes_cancelled: volumes.with_label_values(&[VOLUME_CANCELLED]).get(),
        }
    }
}
