//! `fixpix-worker` -- batch-process image files from the command line.
//!
//! Usage: `fixpix-worker <image>...`
//!
//! Each result is written next to its input as `<stem>.fixpix.<ext>`.
//! Ctrl-C stops after the image currently being processed; pressed while
//! inputs are still being read, it cancels the whole batch. The exit code
//! is non-zero if any input did not produce an output.
//!
//! # Environment variables
//!
//! | Variable                      | Default                 | Description                    |
//! |-------------------------------|-------------------------|--------------------------------|
//! | `FIXPIX_AI_URL`               | `http://localhost:8001` | AI inference server            |
//! | `FIXPIX_API_URL`              | `http://localhost:8000` | Project backend                |
//! | `FIXPIX_REQUEST_TIMEOUT_SECS` | unset                   | Per-request timeout            |
//! | `FIXPIX_SETTINGS`             | `{}`                    | Settings JSON (camelCase keys) |

use std::path::PathBuf;
use std::sync::Arc;

use fixpix_events::bus::{EventBus, StudioEvent};
use fixpix_inference::http::HttpClient;
use fixpix_pipeline::batch::BatchQueue;
use fixpix_pipeline::orchestrator::EditPipeline;
use fixpix_worker::config::WorkerConfig;
use fixpix_worker::runner;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fixpix_worker=info,fixpix_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let inputs: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if inputs.is_empty() {
        tracing::error!("Usage: fixpix-worker <image>...");
        std::process::exit(2);
    }

    let config = WorkerConfig::from_env()?;
    tracing::info!(
        ai_url = %config.client.ai_base_url,
        files = inputs.len(),
        "Starting fixpix-worker",
    );

    let client = Arc::new(HttpClient::new(config.client.clone())?);
    let events = Arc::new(EventBus::default());
    let pipeline = Arc::new(EditPipeline::new(client, Arc::clone(&events)));
    let queue = Arc::new(BatchQueue::new(pipeline, Arc::clone(&events)));

    tokio::spawn(log_progress(Arc::clone(&events)));
    tokio::spawn({
        let queue = Arc::clone(&queue);
        async move {
            shutdown_signal().await;
            queue.cancel_processing().await;
        }
    });

    let summary = runner::run(&queue, &inputs, &config.settings).await?;

    tracing::info!(
        written = summary.written.len(),
        failed = summary.failed.len(),
        skipped = summary.skipped.len(),
        cancelled = summary.cancelled.len(),
        "Worker finished",
    );
    for (path, message) in &summary.failed {
        tracing::error!(path = %path.display(), error = %message, "Processing failed");
    }

    if !summary.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Log batch progress until the bus closes.
async fn log_progress(events: Arc<EventBus>) {
    let mut rx = events.subscribe();
    loop {
        match rx.recv().await {
            Ok(published) => {
                match published.event {
                    StudioEvent::BatchProgress(p) => {
                        tracing::info!(
                            completed = p.completed,
                            total = p.total,
                            percentage = p.percentage,
                            "Batch progress",
                        );
                    }
                    StudioEvent::QueueItemUpdated { item_id, status } => {
                        tracing::debug!(item_id = %item_id, status = status.label(), "Item updated");
                    }
                    _ => {}
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Progress logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Wait for Ctrl-C (or SIGTERM on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), cancelling remaining files");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, cancelling remaining files");
        }
    }
}
