use crate::collect::{collect_files, CollectOptions, CollectedFile};
use crate::embeddings::{EmbeddingProvider, EmbeddingRequest};
use crate::error::{EesError, FailedFile, Result};
use crate::process::FileProcessor;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::events::{FileOutcome, SyncEvent};
use super::{Directory, DirectoryStore, JobProgress, JobStatus, JobStore, SyncJob};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Immediate acknowledgement of an accepted sync request
#[derive(Debug, Clone, serde::Serialize)]
pub struct StartedSync {
    pub job_id: Uuid,
    pub directory_id: Uuid,
}

struct LiveJob {
    tx: broadcast::Sender<SyncEvent>,
    /// Receiver created alongside the channel, handed to the first
    /// subscriber so it observes the sequence from the very first event.
    initial: Mutex<Option<broadcast::Receiver<SyncEvent>>>,
}

/// Orchestrates directory sync jobs.
///
/// Each accepted sync runs as an independent background task that owns its
/// job row: it collects files, processes and embeds them one at a time, and
/// writes tallies back after every file. A failing file is recorded and the
/// loop moves on; only infrastructure errors (collection failure, a store
/// going away) fail the job. Cancellation is cooperative and checked between
/// files.
///
/// Starting a sync for a directory that already has an incomplete job
/// supersedes it: the old job is cancelled before the new one is created, so
/// at most one pending/running job exists per directory.
#[derive(Clone)]
pub struct SyncJobManager {
    directories: Arc<dyn DirectoryStore>,
    jobs: Arc<dyn JobStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    processor: Arc<FileProcessor>,
    collect_options: CollectOptions,
    live: Arc<Mutex<HashMap<Uuid, Arc<LiveJob>>>>,
}

impl SyncJobManager {
    pub fn new(
        directories: Arc<dyn DirectoryStore>,
        jobs: Arc<dyn JobStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        processor: FileProcessor,
        collect_options: CollectOptions,
    ) -> Self {
        Self {
            directories,
            jobs,
            embedder,
            processor: Arc::new(processor),
            collect_options,
            live: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Accept a sync request and return immediately; the work continues in a
    /// spawned task after this call returns.
    pub async fn start_sync(&self, directory_id: Uuid) -> Result<StartedSync> {
        let directory = self
            .directories
            .find_by_id(directory_id)
            .await?
            .ok_or_else(|| EesError::DirectoryNotFound(directory_id.to_string()))?;

        let superseded = self.jobs.cancel_incomplete(directory_id).await?;
        if superseded > 0 {
            log::info!(
                "Superseded {} incomplete job(s) for directory {}",
                superseded,
                directory_id
            );
        }

        let job = self.jobs.create(directory_id).await?;

        let (tx, rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        self.live.lock().unwrap().insert(
            job.id,
            Arc::new(LiveJob {
                tx: tx.clone(),
                initial: Mutex::new(Some(rx)),
            }),
        );

        let manager = self.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            manager.run_job(job_id, directory, tx).await;
        });

        Ok(StartedSync { job_id, directory_id })
    }

    /// Live event stream for a running job. Returns None once the job's task
    /// has finished; the poll API covers that case.
    pub fn subscribe(&self, job_id: Uuid) -> Option<broadcast::Receiver<SyncEvent>> {
        let live = self.live.lock().unwrap().get(&job_id).cloned()?;
        let initial = live.initial.lock().unwrap().take();
        Some(initial.unwrap_or_else(|| live.tx.subscribe()))
    }

    /// Current snapshot of one job
    pub async fn job(&self, job_id: Uuid) -> Result<Option<SyncJob>> {
        self.jobs.find_by_id(job_id).await
    }

    /// Most recent job for a directory
    pub async fn latest_job(&self, directory_id: Uuid) -> Result<Option<SyncJob>> {
        self.jobs.find_latest_for_directory(directory_id).await
    }

    /// Cancel any incomplete jobs for a directory. Idempotent; the running
    /// task notices before its next file and stops with tallies intact.
    pub async fn cancel(&self, directory_id: Uuid) -> Result<usize> {
        self.jobs.cancel_incomplete(directory_id).await
    }

    async fn run_job(self, job_id: Uuid, directory: Directory, tx: broadcast::Sender<SyncEvent>) {
        if let Err(e) = self.execute(job_id, &directory, &tx).await {
            let message = e.to_string();
            log::error!("Job {} failed: {}", job_id, message);
            if let Err(store_err) = self.jobs.mark_failed(job_id, &message).await {
                log::error!("Failed to record job {} failure: {}", job_id, store_err);
            }
            let _ = tx.send(SyncEvent::Error { message });
        }
        self.live.lock().unwrap().remove(&job_id);
    }

    /// The sync run itself. Per-file errors are absorbed into the tallies;
    /// an Err from here is an infrastructure failure that fails the job.
    async fn execute(
        &self,
        job_id: Uuid,
        directory: &Directory,
        tx: &broadcast::Sender<SyncEvent>,
    ) -> Result<()> {
        let _ = tx.send(SyncEvent::Start {
            job_id,
            directory_id: directory.id,
            path: directory.path.display().to_string(),
        });

        let root = directory.path.clone();
        let options = self.collect_options.clone();
        let files = tokio::task::spawn_blocking(move || collect_files(&root, &options))
            .await
            .map_err(|e| EesError::Config(format!("collection task panicked: {}", e)))??;

        let total = files.len() as u64;
        self.jobs.mark_running(job_id, total).await?;
        let _ = tx.send(SyncEvent::Collected {
            total_files: total,
            files: files.iter().map(|f| f.relative_path.clone()).collect(),
        });

        let mut progress = JobProgress::default();

        for (idx, file) in files.iter().enumerate() {
            // Cooperative cancellation: checked between files, never mid-file
            match self.jobs.find_by_id(job_id).await? {
                Some(job) if job.status == JobStatus::Running => {}
                Some(job) => {
                    log::info!(
                        "Job {} is {}, stopping before {}",
                        job_id,
                        job.status.as_str(),
                        file.relative_path
                    );
                    return Ok(());
                }
                None => {
                    return Err(EesError::Config(format!("job {} vanished mid-run", job_id)));
                }
            }

            let _ = tx.send(SyncEvent::Processing {
                file: file.relative_path.clone(),
                index: idx as u64 + 1,
                total,
            });

            let attempt = self.process_and_embed(directory, file).await;
            progress.processed_files += 1;
            progress.current_file = Some(file.relative_path.clone());

            let event = match attempt {
                Ok(outcome) => {
                    match outcome {
                        FileOutcome::Created => progress.created_files += 1,
                        FileOutcome::Updated => progress.updated_files += 1,
                    }
                    log::info!("✓ [{}/{}] {}", idx + 1, total, file.relative_path);
                    SyncEvent::FileCompleted {
                        file: file.relative_path.clone(),
                        outcome,
                        processed: progress.processed_files,
                        created: progress.created_files,
                        updated: progress.updated_files,
                        failed: progress.failed_files,
                        total,
                    }
                }
                Err(e) => {
                    log::warn!("✗ [{}/{}] {}: {}", idx + 1, total, file.relative_path, e);
                    progress.failed_files += 1;
                    progress.failed_file_paths.push(FailedFile {
                        path: file.relative_path.clone(),
                        error: e.to_string(),
                    });
                    SyncEvent::FileFailed {
                        file: file.relative_path.clone(),
                        error: e.to_string(),
                        processed: progress.processed_files,
                        created: progress.created_files,
                        updated: progress.updated_files,
                        failed: progress.failed_files,
                        total,
                    }
                }
            };

            self.jobs.update_progress(job_id, &progress).await?;
            let _ = tx.send(event);
        }

        // A cancel can land while the loop is not looking (or before an
        // empty directory's loop runs at all); completion is only for jobs
        // still running.
        match self.jobs.find_by_id(job_id).await? {
            Some(job) if job.status == JobStatus::Running => {}
            _ => return Ok(()),
        }

        self.directories
            .update_last_synced_at(directory.id, Utc::now())
            .await?;
        self.jobs.mark_completed(job_id).await?;

        let message = format!(
            "Synced {} files: {} created, {} updated, {} failed",
            total, progress.created_files, progress.updated_files, progress.failed_files
        );
        log::info!("Job {}: {}", job_id, message);
        let _ = tx.send(SyncEvent::Completed {
            total_files: total,
            created: progress.created_files,
            updated: progress.updated_files,
            failed: progress.failed_files,
            message,
        });

        Ok(())
    }

    /// Extract one file and upsert its content. Multi-chunk content is
    /// upserted chunk by chunk under "{path}#chunk{i}" uris; the file's
    /// created/updated classification follows the first chunk.
    async fn process_and_embed(
        &self,
        directory: &Directory,
        file: &CollectedFile,
    ) -> Result<FileOutcome> {
        let processed = self.processor.process(file, None).await?;

        let texts: Vec<&str> = match &processed.chunks {
            Some(chunks) => chunks.iter().map(String::as_str).collect(),
            None => vec![processed.content.as_str()],
        };

        let mut outcome = FileOutcome::Created;
        for (i, text) in texts.iter().copied().enumerate() {
            let uri = if texts.len() == 1 {
                processed.filename.clone()
            } else {
                format!("{}#chunk{}", processed.filename, i)
            };
            let upsert = self
                .embedder
                .create_embedding(EmbeddingRequest {
                    uri: &uri,
                    text,
                    model_name: &directory.model_name,
                    task_types: &directory.task_types,
                })
                .await?;
            if i == 0 {
                outcome = if upsert.created {
                    FileOutcome::Created
                } else {
                    FileOutcome::Updated
                };
            }
        }

        Ok(outcome)
    }
}
