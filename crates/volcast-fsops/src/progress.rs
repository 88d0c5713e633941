//! Progress reporting hooks.

use uuid::Uuid;
use volcast_events::{Event, EventBus};

use crate::model::{CopyOutcome, VolumeOutcome, VolumeTarget};

/// Receives progress from the pipeline. Implementations must not fail; they are
/// called from worker threads and may be shared across volumes.
pub trait ProgressSink: Send + Sync {
    /// A file finished copying on `volume`.
    fn on_file_copied(&self, volume: &str, completed: usize, total: usize);

    /// A run planned its files and is about to visit the volumes.
    fn on_run_started(&self, _run_id: Uuid, _total_files: usize, _volumes: usize) {}

    /// A worker started on a volume.
    fn on_volume_started(&self, _target: &VolumeTarget) {}

    /// A file exhausted its retries on a volume.
    fn on_file_failed(&self, _outcome: &CopyOutcome) {}

    /// A worker finished a volume.
    fn on_volume_finished(&self, _outcome: &VolumeOutcome) {}

    /// Every volume has been visited.
    fn on_run_finished(&self, _run_id: Uuid, _succeeded: bool) {}
}

/// Sink that discards progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_file_copied(&self, _volume: &str, _completed: usize, _total: usize) {}
}

impl ProgressSink for EventBus {
    fn on_file_copied(&self, volume: &str, completed: usize, total: usize) {
        let _ = self.publish(Event::FileCopied {
            volume: volume.to_string(),
            completed,
            total,
        });
    }

    fn on_run_started(&self, run_id: Uuid, total_files: usize, volumes: usize) {
        let _ = self.publish(Event::RunStarted {
            run_id,
            total_files,
            volumes,
        });
    }

    fn on_volume_started(&self, target: &VolumeTarget) {
        let _ = self.publish(Event::VolumeStarted {
            volume: target.identifier.clone(),
            index: target.index,
        });
    }

    fn on_file_failed(&self, outcome: &CopyOutcome) {
        let _ = self.publish(Event::FileFailed {
            volume: outcome.volume.clone(),
            file: outcome.file_name.clone(),
            attempts: outcome.attempts,
        });
    }

    fn on_volume_finished(&self, outcome: &VolumeOutcome) {
        let _ = self.publish(Event::VolumeFinished {
            volume: outcome.target.identifier.clone(),
            succeeded: outcome.is_success(),
        });
    }

    fn on_run_finished(&self, run_id: Uuid, succeeded: bool) {
        let _ = self.publish(Event::RunFinished { run_id, succeeded });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CopyStatus;

    #[tokio::test]
    async fn event_bus_sink_publishes_tagged_events() {
        let bus = EventBus::with_capacity(16);
        let mut stream = bus.subscribe(None);
        let sink: &dyn ProgressSink = &bus;

        sink.on_volume_started(&VolumeTarget::new("/media/a", "SHOW", 1));
        sink.on_file_copied("/media/a", 1, 2);
        sink.on_file_failed(&CopyOutcome {
            file_name: "ep02.mkv".into(),
            volume: "/media/a".into(),
            attempts: 3,
            status: CopyStatus::FailedAfterRetries,
            error: Some("io".into()),
        });

        let mut kinds = Vec::new();
        for _ in 0..3 {
            if let Some(envelope) = stream.next().await {
                assert_eq!(envelope.event.volume(), Some("/media/a"));
                kinds.push(envelope.event.kind());
            }
        }
        assert_eq!(kinds, vec!["volume_started", "file_copied", "file_failed"]);
    }

    #[test]
    fn noop_sink_accepts_every_hook() {
        let sink = NoopProgress;
        sink.on_run_started(Uuid::nil(), 0, 0);
        sink.on_file_copied("/media/a", 1, 1);
        sink.on_run_finished(Uuid::nil(), true);
    }
}
