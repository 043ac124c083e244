use anyhow::Result;
use ees::collect::CollectOptions;
use ees::db::{migrate, Db};
use ees::embeddings::HttpEmbeddingProvider;
use ees::http::SyncHttpServer;
use ees::job::{SqliteDirectoryStore, SqliteJobStore, JobStore, SyncJobManager};
use ees::process::FileProcessor;
use ees::Config;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info"),
    )
    .init();

    log::info!("Starting EES sync server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Database path: {}", config.db_path().display());
    log::info!("Embedding endpoint: {}", config.embeddings.api_url);

    let db = Arc::new(Db::new(config.db_path()));
    let migrations_dir = Path::new("migrations");
    db.with_connection(move |conn| migrate::run_migrations(conn, migrations_dir))
        .await?;
    log::info!("Database initialized");

    let directories = Arc::new(SqliteDirectoryStore::new(Arc::clone(&db)));
    let jobs = Arc::new(SqliteJobStore::new(Arc::clone(&db)));

    // Reconcile jobs left behind by a crashed process before accepting work
    let orphaned = jobs.recover_orphaned().await?;
    if orphaned > 0 {
        log::warn!("Recovered {} orphaned job(s) from a previous run", orphaned);
    }

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

    let manager = Arc::new(SyncJobManager::new(
        directories,
        jobs,
        embedder,
        FileProcessor::new(config.processing.clone()),
        CollectOptions {
            additional_ignore_patterns: config.collect.ignore_patterns.clone(),
            max_depth: config.collect.max_depth,
        },
    ));

    let server = SyncHttpServer::new(manager, config.http_server.allowed_origins.clone());
    server.run(config.http_server.port).await?;

    Ok(())
}
