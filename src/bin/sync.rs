use anyhow::Result;
use clap::Parser;
use ees::collect::CollectOptions;
use ees::db::{migrate, Db};
use ees::embeddings::HttpEmbeddingProvider;
use ees::job::{DirectoryStore, JobStore, SqliteDirectoryStore, SqliteJobStore, SyncJobManager};
use ees::process::FileProcessor;
use ees::{Config, SyncEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "sync")]
#[command(about = "Run one directory sync to completion")]
struct Args {
    /// Directory to synchronize (registered on first use)
    #[arg(short, long)]
    path: PathBuf,

    /// Embedding model for this directory (used when registering)
    #[arg(short, long, default_value = "embed-v2")]
    model: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    )
    .init();

    let args = Args::parse();

    let config = Config::load()?;
    log::info!("Database path: {}", config.db_path().display());

    let db = Arc::new(Db::new(config.db_path()));
    let migrations_dir = Path::new("migrations");
    db.with_connection(move |conn| migrate::run_migrations(conn, migrations_dir))
        .await?;

    let directories = Arc::new(SqliteDirectoryStore::new(Arc::clone(&db)));
    let jobs = Arc::new(SqliteJobStore::new(Arc::clone(&db)));

    let orphaned = jobs.recover_orphaned().await?;
    if orphaned > 0 {
        log::warn!("Recovered {} orphaned job(s) from a previous run", orphaned);
    }

    let root = args.path.canonicalize().map_err(|e| {
        anyhow::anyhow!("Cannot resolve {}: {}", args.path.display(), e)
    })?;

    let directory = match directories.find_by_path(&root).await? {
        Some(dir) => dir,
        None => {
            let dir = directories
                .create(&root, &args.model, &config.embeddings.task_types)
                .await?;
            log::info!("Registered directory {} as {}", root.display(), dir.id);
            dir
        }
    };

    let api_key = std::env::var(&config.embeddings.api_key_env).map_err(|_| {
        anyhow::anyhow!(
            "Environment variable {} not set. Set it in your .env file or as an environment variable.",
            config.embeddings.api_key_env
        )
    })?;
    let embedder = Arc::new(HttpEmbeddingProvider::new(
        config.embeddings.api_url.clone(),
        api_key,
    ));

    let manager = SyncJobManager::new(
        directories,
        jobs,
        embedder,
        FileProcessor::new(config.processing.clone()),
        CollectOptions {
            additional_ignore_patterns: config.collect.ignore_patterns.clone(),
            max_depth: config.collect.max_depth,
        },
    );

    let start = Instant::now();
    let started = manager.start_sync(directory.id).await?;
    log::info!("Sync job {} started for {}", started.job_id, root.display());

    let mut rx = manager
        .subscribe(started.job_id)
        .ok_or_else(|| anyhow::anyhow!("job finished before the stream could attach"))?;

    let mut failed = false;
    loop {
        match rx.recv().await {
            Ok(SyncEvent::Collected { total_files, .. }) => {
                log::info!("Found {} file(s) to sync", total_files);
            }
            Ok(SyncEvent::Processing { file, index, total }) => {
                log::info!("[{}/{}] Processing: {}", index, total, file);
            }
            Ok(SyncEvent::FileFailed { file, error, .. }) => {
                log::error!("✗ {}: {}", file, error);
            }
            Ok(SyncEvent::Completed { total_files, created, updated, failed: failed_files, .. }) => {
                log::info!("=== Sync Complete ===");
                log::info!("Files discovered: {}", total_files);
                log::info!("  Created: {}", created);
                log::info!("  Updated: {}", updated);
                log::info!("  Failed: {}", failed_files);
                log::info!("Time: {:?}", start.elapsed());
                if failed_files > 0 {
                    log::warn!("Some files failed to sync. Check logs above for details.");
                }
                break;
            }
            Ok(SyncEvent::Error { message }) => {
                log::error!("Sync failed: {}", message);
                failed = true;
                break;
            }
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                log::warn!("Progress stream lagged, skipped {} event(s)", n);
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }

    if failed {
        anyhow::bail!("sync did not complete");
    }
    Ok(())
}
