use crate::error::EesError;
use crate::job::events::SyncEvent;
use crate::job::{JobStatus, SyncJob, SyncJobManager};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// HTTP server exposing the sync surface: start a sync, poll job snapshots,
/// follow the live SSE stream, cancel incomplete jobs.
pub struct SyncHttpServer {
    manager: Arc<SyncJobManager>,
    allowed_origins: Vec<String>,
}

impl SyncHttpServer {
    pub fn new(manager: Arc<SyncJobManager>, allowed_origins: Vec<String>) -> Self {
        Self {
            manager,
            allowed_origins,
        }
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> crate::error::Result<()> {
        let app = self.router();

        let addr = format!("127.0.0.1:{}", port);
        log::info!("Starting EES sync server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| {
                EesError::Io(std::io::Error::new(
                    std::io::ErrorKind::AddrInUse,
                    format!("Failed to bind to {}: {}", addr, e),
                ))
            })?;

        axum::serve(listener, app).await.map_err(|e| {
            EesError::Io(std::io::Error::other(format!("HTTP server error: {}", e)))
        })?;

        Ok(())
    }

    /// Build the axum router
    pub fn router(&self) -> Router {
        // With no origins configured, allow any (local development); an
        // explicit list restricts preflight to exactly those origins.
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/api/directories/:id/sync", post(start_sync))
            .route("/api/directories/:id/sync/latest", get(latest_job))
            .route("/api/directories/:id/sync/stream", get(stream_sync))
            .route("/api/directories/:id/sync/cancel", post(cancel_sync))
            .route("/api/sync/jobs/:id", get(job_snapshot))
            .route("/health", get(handle_health))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
            .with_state(AppState {
                manager: Arc::clone(&self.manager),
            })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    manager: Arc<SyncJobManager>,
}

fn error_response(err: EesError) -> Response {
    let status = match &err {
        EesError::DirectoryNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("Request failed: {}", err);
    }
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

/// Start a sync and return the job handle immediately
async fn start_sync(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.manager.start_sync(id).await {
        Ok(started) => (StatusCode::ACCEPTED, Json(started)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Current snapshot of one job
async fn job_snapshot(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.manager.job(id).await {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("job not found: {}", id) })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Most recent job for a directory
async fn latest_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.manager.latest_job(id).await {
        Ok(Some(job)) => Json(job).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no sync jobs for directory: {}", id) })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Cancel incomplete jobs for a directory; idempotent
async fn cancel_sync(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.manager.cancel(id).await {
        Ok(cancelled) => Json(serde_json::json!({ "cancelled": cancelled })).into_response(),
        Err(e) => error_response(e),
    }
}

/// Start a sync and stream its progress events as SSE.
///
/// Each record carries the event kind as the SSE event name and the
/// serialized payload as data. The stream terminates after the final
/// `completed`/`error` event. A consumer that disconnects does not affect
/// the job; it can resume observing through the poll endpoints.
async fn stream_sync(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let started = match state.manager.start_sync(id).await {
        Ok(started) => started,
        Err(e) => return error_response(e),
    };

    let events: BoxStream<'static, std::result::Result<Event, Infallible>> =
        match state.manager.subscribe(started.job_id) {
            Some(rx) => BroadcastStream::new(rx)
                .filter_map(|item| futures_util::future::ready(item.ok()))
                .scan(false, |done, event| {
                    if *done {
                        return futures_util::future::ready(None);
                    }
                    *done = event.is_terminal();
                    futures_util::future::ready(Some(event))
                })
                .map(|event| Ok(sse_event(&event)))
                .boxed(),
            None => {
                // The job finished before we could attach; send its terminal
                // state as a single event.
                let event = match state.manager.job(started.job_id).await {
                    Ok(Some(job)) => terminal_event(&job),
                    Ok(None) => SyncEvent::Error {
                        message: format!("job not found: {}", started.job_id),
                    },
                    Err(e) => SyncEvent::Error { message: e.to_string() },
                };
                stream::once(futures_util::future::ready(Ok(sse_event(&event)))).boxed()
            }
        };

    Sse::new(events)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("ping"),
        )
        .into_response()
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn sse_event(event: &SyncEvent) -> Event {
    Event::default()
        .event(event.kind())
        .data(serde_json::to_string(event).unwrap_or_default())
}

/// Terminal event reconstructed from a job snapshot, for subscribers that
/// attach after the run has already finished.
fn terminal_event(job: &SyncJob) -> SyncEvent {
    match job.status {
        JobStatus::Completed => SyncEvent::Completed {
            total_files: job.total_files,
            created: job.created_files,
            updated: job.updated_files,
            failed: job.failed_files,
            message: format!(
                "Synced {} files: {} created, {} updated, {} failed",
                job.total_files, job.created_files, job.updated_files, job.failed_files
            ),
        },
        JobStatus::Failed => SyncEvent::Error {
            message: job
                .error_message
                .clone()
                .unwrap_or_else(|| "sync failed".to_string()),
        },
        JobStatus::Cancelled => SyncEvent::Error {
            message: "sync cancelled".to_string(),
        },
        // Non-terminal snapshots only reach here on a lost live channel;
        // report the situation rather than inventing progress.
        JobStatus::Pending | JobStatus::Running => SyncEvent::Error {
            message: "live stream unavailable for running job".to_string(),
        },
    }
}
