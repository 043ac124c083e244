pub mod events;
pub mod manager;
pub mod store;

#[cfg(test)]
pub mod testing;

pub use events::SyncEvent;
pub use manager::{StartedSync, SyncJobManager};
pub use store::{DirectoryStore, JobStore, SqliteDirectoryStore, SqliteJobStore};

use crate::error::FailedFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Lifecycle states of a sync job.
///
/// Transitions are monotonic: `pending → running → {completed | failed}`,
/// with `cancelled` reachable from any non-terminal state via an explicit
/// cancel. Counters only change while the job is `running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// One execution of a directory synchronization, with its lifecycle and
/// tallies. Rows are never deleted, only superseded or cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub id: Uuid,
    pub directory_id: Uuid,
    pub status: JobStatus,
    pub total_files: u64,
    pub processed_files: u64,
    pub created_files: u64,
    pub updated_files: u64,
    pub failed_files: u64,
    pub current_file: Option<String>,
    pub failed_file_paths: Vec<FailedFile>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A registered directory, referenced by sync jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directory {
    pub id: Uuid,
    pub path: PathBuf,
    pub model_name: String,
    pub task_types: Vec<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Incremental tallies written back to the job row after each file
#[derive(Debug, Clone, Default)]
pub struct JobProgress {
    pub processed_files: u64,
    pub created_files: u64,
    pub updated_files: u64,
    pub failed_files: u64,
    pub current_file: Option<String>,
    pub failed_file_paths: Vec<FailedFile>,
}
