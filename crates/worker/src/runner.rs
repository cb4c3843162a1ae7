//! Queue files from disk, process them, and write the results next to
//! their inputs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use fixpix_core::batch::QueueStatus;
use fixpix_core::settings::Settings;
use fixpix_core::types::WorkingImage;
use fixpix_core::upload::{extension_for, validate_image_file};
use fixpix_pipeline::batch::BatchQueue;

/// What happened to each input of a [`run`].
#[derive(Debug, Default)]
pub struct RunSummary {
    pub written: Vec<PathBuf>,
    /// Inputs rejected before queueing, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
    /// Inputs whose pipeline run failed, with the message.
    pub failed: Vec<(PathBuf, String)>,
    pub cancelled: Vec<PathBuf>,
}

impl RunSummary {
    /// `true` when every input produced an output file.
    pub fn is_success(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty() && self.cancelled.is_empty()
    }
}

/// `photo.jpg` with a PNG result becomes `photo.fixpix.png`.
pub fn output_path(input: &Path, result: &[u8]) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}.fixpix.{}", extension_for(result)))
}

/// Process `inputs` through `queue` with `settings`.
///
/// Unreadable or invalid files are skipped. Failures of individual items
/// are reported in the summary; only I/O errors while writing results
/// abort the run.
pub async fn run(
    queue: &BatchQueue,
    inputs: &[PathBuf],
    settings: &Settings,
) -> anyhow::Result<RunSummary> {
    let mut summary = RunSummary::default();
    let mut files = Vec::with_capacity(inputs.len());
    let mut names = Vec::with_capacity(inputs.len());

    for path in inputs {
        let name = path.display().to_string();
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %name, error = %e, "Skipping unreadable file");
                summary.skipped.push((path.clone(), e.to_string()));
                continue;
            }
        };
        if let Err(e) = validate_image_file(&name, &bytes) {
            tracing::warn!(path = %name, error = %e, "Skipping invalid file");
            summary.skipped.push((path.clone(), e.to_string()));
            continue;
        }
        names.push(path.clone());
        files.push((name, WorkingImage::new(bytes)));
    }

    let ids = queue.add_to_queue(files).await;
    let paths: HashMap<_, _> = ids.into_iter().zip(names).collect();
    tracing::info!(queued = paths.len(), skipped = summary.skipped.len(), "Files queued");

    queue.process_queue(settings).await;
    let counts = queue.counts().await;
    tracing::debug!(
        total = counts.total(),
        completed = counts.completed,
        failed = counts.failed,
        "Queue settled",
    );

    for item in queue.snapshot().await {
        let Some(path) = paths.get(&item.id) else {
            continue;
        };
        match (item.status, item.result) {
            (QueueStatus::Completed, Some(result)) => {
                let out = output_path(path, result.as_bytes());
                tokio::fs::write(&out, result.as_bytes())
                    .await
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                tracing::info!(output = %out.display(), bytes = result.len(), "Result written");
                summary.written.push(out);
            }
            (QueueStatus::Cancelled | QueueStatus::Pending, _) => {
                summary.cancelled.push(path.clone());
            }
            (_, _) => {
                let message = item.error.unwrap_or_else(|| "no result".to_string());
                summary.failed.push((path.clone(), message));
            }
        }
    }

    Ok(summary)
}
