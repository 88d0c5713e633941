//! Multi-volume copy pipeline.
#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! One source directory is planned once, then every target volume receives a
//! `{new_name}` directory holding the planned files, is relabelled
//! `{new_name}_{index}` and is finalised read-only. Each volume is handled by an
//! independent worker; failures are recorded per file and per volume in the
//! returned [`RunReport`] instead of aborting the run.

pub mod cancel;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod retry;
pub mod volume;
pub mod worker;

pub use cancel::CancelToken;
pub use error::{ErrorKind, FsOpsError, FsOpsResult};
pub use model::{
    CopyOutcome, CopyStatus, FilePlan, RunReport, SourceFile, StepReport, StepStatus,
    VolumeOutcome, VolumeTarget,
};
pub use orchestrator::{CopyOrchestrator, CopyRequest};
pub use planner::CopyPlanner;
pub use progress::{NoopProgress, ProgressSink};
pub use retry::RetryingCopier;
pub use volume::{LocalVolume, UnsupportedLabeler, VolumeHandle, VolumeLabeler, validate_label};
pub use worker::VolumeWorker;
