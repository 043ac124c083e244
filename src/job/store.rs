use crate::db::Db;
use crate::error::{EesError, FailedFile, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use super::{Directory, JobProgress, JobStatus, SyncJob};

/// Durable record of registered directories
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn create(
        &self,
        path: &Path,
        model_name: &str,
        task_types: &[String],
    ) -> Result<Directory>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Directory>>;
    async fn find_by_path(&self, path: &Path) -> Result<Option<Directory>>;
    async fn update_last_synced_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

/// Durable record of sync jobs. Mutated only by the job manager; status
/// guards in the UPDATE statements keep the transitions monotonic even if a
/// cancel races the manager.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, directory_id: Uuid) -> Result<SyncJob>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<SyncJob>>;
    async fn find_latest_for_directory(&self, directory_id: Uuid) -> Result<Option<SyncJob>>;
    async fn mark_running(&self, id: Uuid, total_files: u64) -> Result<()>;
    async fn update_progress(&self, id: Uuid, progress: &JobProgress) -> Result<()>;
    async fn mark_completed(&self, id: Uuid) -> Result<()>;
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()>;
    /// Cancel every pending/running job for a directory. Idempotent: with
    /// nothing to cancel it returns 0.
    async fn cancel_incomplete(&self, directory_id: Uuid) -> Result<usize>;
    /// Startup reconciliation: jobs left pending/running by a crashed
    /// process are moved to failed.
    async fn recover_orphaned(&self) -> Result<usize>;
}

const JOB_COLUMNS: &str = "id, directory_id, status, total_files, processed_files, \
     created_files, updated_files, failed_files, current_file, failed_file_paths, \
     error_message, started_at, completed_at, created_at, updated_at";

fn conversion_err(index: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_uuid(index: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| conversion_err(index, e))
}

fn parse_timestamp(index: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(index, e))
}

fn parse_timestamp_opt(index: usize, s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|v| parse_timestamp(index, &v)).transpose()
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<SyncJob> {
    let id: String = row.get(0)?;
    let directory_id: String = row.get(1)?;
    let status: String = row.get(2)?;
    let failed_file_paths: String = row.get(9)?;
    let started_at: Option<String> = row.get(11)?;
    let completed_at: Option<String> = row.get(12)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    let failed_file_paths: Vec<FailedFile> =
        serde_json::from_str(&failed_file_paths).map_err(|e| conversion_err(9, e))?;

    Ok(SyncJob {
        id: parse_uuid(0, &id)?,
        directory_id: parse_uuid(1, &directory_id)?,
        status: JobStatus::parse(&status).ok_or_else(|| {
            conversion_err(
                2,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unknown job status: {}", status),
                ),
            )
        })?,
        total_files: row.get::<_, i64>(3)? as u64,
        processed_files: row.get::<_, i64>(4)? as u64,
        created_files: row.get::<_, i64>(5)? as u64,
        updated_files: row.get::<_, i64>(6)? as u64,
        failed_files: row.get::<_, i64>(7)? as u64,
        current_file: row.get(8)?,
        failed_file_paths,
        error_message: row.get(10)?,
        started_at: parse_timestamp_opt(11, started_at)?,
        completed_at: parse_timestamp_opt(12, completed_at)?,
        created_at: parse_timestamp(13, &created_at)?,
        updated_at: parse_timestamp(14, &updated_at)?,
    })
}

fn directory_from_row(row: &Row<'_>) -> rusqlite::Result<Directory> {
    let id: String = row.get(0)?;
    let path: String = row.get(1)?;
    let task_types: String = row.get(3)?;
    let last_synced_at: Option<String> = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(Directory {
        id: parse_uuid(0, &id)?,
        path: PathBuf::from(path),
        model_name: row.get(2)?,
        task_types: serde_json::from_str(&task_types).map_err(|e| conversion_err(3, e))?,
        last_synced_at: parse_timestamp_opt(4, last_synced_at)?,
        created_at: parse_timestamp(5, &created_at)?,
        updated_at: parse_timestamp(6, &updated_at)?,
    })
}

/// SQLite-backed directory store
pub struct SqliteDirectoryStore {
    db: Arc<Db>,
}

impl SqliteDirectoryStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DirectoryStore for SqliteDirectoryStore {
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

        let row = directory.clone();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO directories (id, path, model_name, task_types, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        row.id.to_string(),
                        row.path.to_string_lossy().to_string(),
                        row.model_name,
                        serde_json::to_string(&row.task_types)
                            .map_err(|e| EesError::Config(e.to_string()))?,
                        row.created_at.to_rfc3339(),
                        row.updated_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(directory)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Directory>> {
        let id = id.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, path, model_name, task_types, last_synced_at, created_at, updated_at
                     FROM directories WHERE id = ?1",
                )?;
                let mut rows = stmt.query_map(params![id], directory_from_row)?;
                match rows.next() {
                    Some(row) => Ok(Some(row?)),
                    None => Ok(None),
                }
            })
            .await
    }

    async fn find_by_path(&self, path: &Path) -> Result<Option<Directory>> {
        let path = path.to_string_lossy().to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, path, model_name, task_types, last_synced_at, created_at, updated_at
                     FROM directories WHERE path = ?1",
                )?;
                let mut rows = stmt.query_map(params![path], directory_from_row)?;
                match rows.next() {
                    Some(row) => Ok(Some(row?)),
                    None => Ok(None),
                }
            })
            .await
    }

    async fn update_last_synced_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let id = id.to_string();
        let at = at.to_rfc3339();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE directories SET last_synced_at = ?1, updated_at = ?1 WHERE id = ?2",
                    params![at, id],
                )?;
                Ok(())
            })
            .await
    }
}

/// SQLite-backed job store
pub struct SqliteJobStore {
    db: Arc<Db>,
}

impl SqliteJobStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
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

        let id = job.id.to_string();
        let dir_id = directory_id.to_string();
        let created = now.to_rfc3339();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO sync_jobs (id, directory_id, status, created_at, updated_at)
                     VALUES (?1, ?2, 'pending', ?3, ?3)",
                    params![id, dir_id, created],
                )?;
                Ok(())
            })
            .await?;

        Ok(job)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<SyncJob>> {
        let id = id.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM sync_jobs WHERE id = ?1",
                    JOB_COLUMNS
                ))?;
                let mut rows = stmt.query_map(params![id], job_from_row)?;
                match rows.next() {
                    Some(row) => Ok(Some(row?)),
                    None => Ok(None),
                }
            })
            .await
    }

    async fn find_latest_for_directory(&self, directory_id: Uuid) -> Result<Option<SyncJob>> {
        let dir_id = directory_id.to_string();
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM sync_jobs WHERE directory_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    JOB_COLUMNS
                ))?;
                let mut rows = stmt.query_map(params![dir_id], job_from_row)?;
                match rows.next() {
                    Some(row) => Ok(Some(row?)),
                    None => Ok(None),
                }
            })
            .await
    }

    async fn mark_running(&self, id: Uuid, total_files: u64) -> Result<()> {
        let id = id.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE sync_jobs
                     SET status = 'running', total_files = ?1, started_at = ?2, updated_at = ?2
                     WHERE id = ?3 AND status = 'pending'",
                    params![total_files as i64, now, id],
                )?;
                Ok(())
            })
            .await
    }

    async fn update_progress(&self, id: Uuid, progress: &JobProgress) -> Result<()> {
        let id = id.to_string();
        let now = Utc::now().to_rfc3339();
        let failed_json = serde_json::to_string(&progress.failed_file_paths)
            .map_err(|e| EesError::Config(e.to_string()))?;
        let progress = JobProgress {
            failed_file_paths: Vec::new(),
            ..progress.clone()
        };
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE sync_jobs
                     SET processed_files = ?1, created_files = ?2, updated_files = ?3,
                         failed_files = ?4, current_file = ?5, failed_file_paths = ?6,
                         updated_at = ?7
                     WHERE id = ?8 AND status = 'running'",
                    params![
                        progress.processed_files as i64,
                        progress.created_files as i64,
                        progress.updated_files as i64,
                        progress.failed_files as i64,
                        progress.current_file,
                        failed_json,
                        now,
                        id,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn mark_completed(&self, id: Uuid) -> Result<()> {
        let id = id.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE sync_jobs
                     SET status = 'completed', current_file = NULL, completed_at = ?1, updated_at = ?1
                     WHERE id = ?2 AND status = 'running'",
                    params![now, id],
                )?;
                Ok(())
            })
            .await
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        let id = id.to_string();
        let error = error.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .with_connection(move |conn| {
                conn.execute(
                    "UPDATE sync_jobs
                     SET status = 'failed', error_message = ?1, completed_at = ?2, updated_at = ?2
                     WHERE id = ?3 AND status IN ('pending', 'running')",
                    params![error, now, id],
                )?;
                Ok(())
            })
            .await
    }

    async fn cancel_incomplete(&self, directory_id: Uuid) -> Result<usize> {
        let dir_id = directory_id.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .with_connection(move |conn| {
                let affected = conn.execute(
                    "UPDATE sync_jobs
                     SET status = 'cancelled', completed_at = ?1, updated_at = ?1
                     WHERE directory_id = ?2 AND status IN ('pending', 'running')",
                    params![now, dir_id],
                )?;
                Ok(affected)
            })
            .await
    }

    async fn recover_orphaned(&self) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        self.db
            .with_connection(move |conn| {
                let affected = conn.execute(
                    "UPDATE sync_jobs
                     SET status = 'failed', error_message = 'interrupted by restart',
                         completed_at = ?1, updated_at = ?1
                     WHERE status IN ('pending', 'running')",
                    params![now],
                )?;
                Ok(affected)
            })
            .await
    }
}
