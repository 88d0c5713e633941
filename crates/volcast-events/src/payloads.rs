//! Event payload types emitted by the copy pipeline.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier assigned to each published event.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed progress events. Every per-volume event carries the volume identifier
/// so concurrent workers never produce ambiguous output.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run planned its file list and is about to visit the volumes.
    RunStarted {
        /// Identifier of the run.
        run_id: Uuid,
        /// Number of files planned for every volume.
        total_files: usize,
        /// Number of target volumes.
        volumes: usize,
    },
    /// A worker started on a volume.
    VolumeStarted {
        /// Volume identifier (mount root or device path).
        volume: String,
        /// 1-based position of the volume in the input list.
        index: usize,
    },
    /// A file was copied to a volume.
    FileCopied {
        /// Volume identifier.
        volume: String,
        /// Files completed on this volume so far.
        completed: usize,
        /// Files planned for this volume.
        total: usize,
    },
    /// A file exhausted its retry budget on a volume.
    FileFailed {
        /// Volume identifier.
        volume: String,
        /// Name of the file that failed.
        file: String,
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// A worker finished a volume.
    VolumeFinished {
        /// Volume identifier.
        volume: String,
        /// Whether every step required for success completed.
        succeeded: bool,
    },
    /// All volumes have been visited.
    RunFinished {
        /// Identifier of the run.
        run_id: Uuid,
        /// Whether every volume succeeded.
        succeeded: bool,
    },
}

impl Event {
    /// Machine-friendly discriminator for consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::VolumeStarted { .. } => "volume_started",
            Self::FileCopied { .. } => "file_copied",
            Self::FileFailed { .. } => "file_failed",
            Self::VolumeFinished { .. } => "volume_finished",
            Self::RunFinished { .. } => "run_finished",
        }
    }

    /// Volume the event refers to, when it is volume scoped.
    #[must_use]
    pub fn volume(&self) -> Option<&str> {
        match self {
            Self::VolumeStarted { volume, .. }
            | Self::FileCopied { volume, .. }
            | Self::FileFailed { volume, .. }
            | Self::VolumeFinished { volume, .. } => Some(volume),
            Self::RunStarted { .. } | Self::RunFinished { .. } => None,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier assigned by the bus.
    pub id: EventId,
    /// Publication time.
    pub timestamp: DateTime<Utc>,
    /// Event payload.
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_volume_match_payload() {
        let event = Event::FileCopied {
            volume: "/media/a".into(),
            completed: 1,
            total: 2,
        };
        assert_eq!(event.kind(), "file_copied");
        assert_eq!(event.volume(), Some("/media/a"));

        let run = Event::RunFinished {
            run_id: Uuid::nil(),
            succeeded: true,
        };
        assert_eq!(run.kind(), "run_finished");
        assert_eq!(run.volume(), None);
    }

    #[test]
    fn events_serialize_with_type_tag() -> Result<(), serde_json::Error> {
        let event = Event::VolumeStarted {
            volume: "/media/a".into(),
            index: 1,
        };
        let value = serde_json::to_value(&event)?;
        assert_eq!(value["type"], "volume_started");
        assert_eq!(value["index"], 1);
        Ok(())
    }
}
