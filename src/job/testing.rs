//! In-memory store and provider fakes for manager and HTTP tests.

use crate::embeddings::{EmbeddingProvider, EmbeddingRequest, EmbeddingUpsert};
use crate::error::{EesError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use uuid::Uuid;

use super::{Directory, DirectoryStore, JobProgress, JobStatus, JobStore, SyncJob};

#[derive(Default)]
pub struct MemDirectoryStore {
    dirs: Mutex<HashMap<Uuid, Directory>>,
}

#[async_trait]
impl DirectoryStore for MemDirectoryStore {
    async fn create(
        &self,
        path: &Path,
        model_name: &str,
        task_types: &[String],
    ) -> Result<Directory> {
        let now = Utc::now();
        let directory = Directory {
            id: Uuid::new_v4(),
            path: path.to_path_buf(),
            model_name: model_name.to_string(),
            task_types: task_types.to_vec(),
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        };
        self.dirs
            .lock()
            .unwrap()
            .insert(directory.id, directory.clone());
        Ok(directory)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Directory>> {
        Ok(self.dirs.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_path(&self, path: &Path) -> Result<Option<Directory>> {
        Ok(self
            .dirs
            .lock()
            .unwrap()
            .values()
            .find(|d| d.path == path)
            .cloned())
    }

    async fn update_last_synced_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        if let Some(dir) = self.dirs.lock().unwrap().get_mut(&id) {
            dir.last_synced_at = Some(at);
            dir.updated_at = at;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemJobStore {
    jobs: Mutex<HashMap<Uuid, SyncJob>>,
}

impl MemJobStore {
    pub fn insert(&self, job: SyncJob) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }
}

#[async_trait]
impl JobStore for MemJobStore {
    async fn create(&self, directory_id: Uuid) -> Result<SyncJob> {
        let now = Utc::now();
        let job = SyncJob {
            id: Uuid::new_v4(),
            directory_id,
            status: JobStatus::Pending,
            total_files: 0,
            processed_files: 0,
            created_files: 0,
            updated_files: 0,
            failed_files: 0,
            current_file: None,
            failed_file_paths: Vec::new(),
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.insert(job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SyncJob>> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn find_latest_for_directory(&self, directory_id: Uuid) -> Result<Option<SyncJob>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.directory_id == directory_id)
            .max_by_key(|j| j.created_at)
            .cloned())
    }

    async fn mark_running(&self, id: Uuid, total_files: u64) -> Result<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&id) {
            if job.status == JobStatus::Pending {
                job.status = JobStatus::Running;
                job.total_files = total_files;
                job.started_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn update_progress(&self, id: Uuid, progress: &JobProgress) -> Result<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&id) {
            if job.status == JobStatus::Running {
                job.processed_files = progress.processed_files;
                job.created_files = progress.created_files;
                job.updated_files = progress.updated_files;
                job.failed_files = progress.failed_files;
                job.current_file = progress.current_file.clone();
                job.failed_file_paths = progress.failed_file_paths.clone();
                job.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid) -> Result<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&id) {
            if job.status == JobStatus::Running {
                job.status = JobStatus::Completed;
                job.current_file = None;
                job.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&id) {
            if !job.status.is_terminal() {
                job.status = JobStatus::Failed;
                job.error_message = Some(error.to_string());
                job.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn cancel_incomplete(&self, directory_id: Uuid) -> Result<usize> {
        let mut cancelled = 0;
        for job in self.jobs.lock().unwrap().values_mut() {
            if job.directory_id == directory_id && !job.status.is_terminal() {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    async fn recover_orphaned(&self) -> Result<usize> {
        let mut recovered = 0;
        for job in self.jobs.lock().unwrap().values_mut() {
            if !job.status.is_terminal() {
                job.status = JobStatus::Failed;
                job.error_message = Some("interrupted by restart".to_string());
                job.completed_at = Some(Utc::now());
                recovered += 1;
            }
        }
        Ok(recovered)
    }
}

/// Embedder fake: fails any uri containing one of the configured markers,
/// and reports created=false for uris it has already seen.
#[derive(Default)]
pub struct FakeEmbedder {
    pub fail_markers: Vec<String>,
    seen: Mutex<HashSet<String>>,
}

impl FakeEmbedder {
    pub fn failing_on(markers: &[&str]) -> Self {
        Self {
            fail_markers: markers.iter().map(|s| s.to_string()).collect(),
            seen: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn create_embedding(&self, request: EmbeddingRequest<'_>) -> Result<EmbeddingUpsert> {
        if self.fail_markers.iter().any(|m| request.uri.contains(m)) {
            return Err(EesError::Embedding(format!(
                "simulated provider failure for {}",
                request.uri
            )));
        }
        let key = format!("{}::{}", request.uri, request.model_name);
        let created = self.seen.lock().unwrap().insert(key);
        Ok(EmbeddingUpsert {
            id: Uuid::new_v4().to_string(),
            uri: request.uri.to_string(),
            model_name: request.model_name.to_string(),
            created,
        })
    }
}
