use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress events emitted while a sync job executes.
///
/// A closed tagged union: every event serializes to a self-describing JSON
/// object with a `type` tag, which is the wire contract of the live stream.
/// The sequence for one job is `start`, `collected`, then per file a
/// `processing` followed by `file_completed` or `file_failed`, and finally a
/// single `completed` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Start {
        job_id: Uuid,
        directory_id: Uuid,
        path: String,
    },
    Collected {
        total_files: u64,
        files: Vec<String>,
    },
    Processing {
        file: String,
        index: u64,
        total: u64,
    },
    FileCompleted {
        file: String,
        outcome: FileOutcome,
        processed: u64,
        created: u64,
        updated: u64,
        failed: u64,
        total: u64,
    },
    FileFailed {
        file: String,
        error: String,
        processed: u64,
        created: u64,
        updated: u64,
        failed: u64,
        total: u64,
    },
    Completed {
        total_files: u64,
        created: u64,
        updated: u64,
        failed: u64,
        message: String,
    },
    Error {
        message: String,
    },
}

/// How a successfully embedded file landed in the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOutcome {
    Created,
    Updated,
}

impl SyncEvent {
    /// The `type` tag, used as the SSE event name
    pub fn kind(&self) -> &'static str {
        match self {
            SyncEvent::Start { .. } => "start",
            SyncEvent::Collected { .. } => "collected",
            SyncEvent::Processing { .. } => "processing",
            SyncEvent::FileCompleted { .. } => "file_completed",
            SyncEvent::FileFailed { .. } => "file_failed",
            SyncEvent::Completed { .. } => "completed",
            SyncEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncEvent::Completed { .. } | SyncEvent::Error { .. })
    }
}
