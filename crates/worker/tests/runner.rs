//! Integration tests for the worker's file runner.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fixpix_core::generation::GenerationStyle;
use fixpix_core::project::Project;
use fixpix_core::settings::Settings;
use fixpix_core::types::WorkingImage;
use fixpix_events::bus::EventBus;
use fixpix_inference::client::{AccessToken, FaceRestoreParams, GenerationAccepted, InferenceClient};
use fixpix_inference::error::InferenceError;
use fixpix_pipeline::batch::BatchQueue;
use fixpix_pipeline::orchestrator::EditPipeline;
use fixpix_worker::runner;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Colorizes by appending a byte; fails when the input contains `FAIL`.
struct AppendingClient;

#[async_trait]
impl InferenceClient for AppendingClient {
    async fn restore_face(
        &self,
        image: &WorkingImage,
        _params: &FaceRestoreParams,
    ) -> Result<WorkingImage, InferenceError> {
        Ok(image.clone())
    }

    async fn super_resolution(
        &self,
        image: &WorkingImage,
        _scale: u32,
    ) -> Result<WorkingImage, InferenceError> {
        Ok(image.clone())
    }

    async fn colorize(
        &self,
        image: &WorkingImage,
        _render_factor: u32,
    ) -> Result<WorkingImage, InferenceError> {
        if image.as_bytes().windows(4).any(|w| w == b"FAIL") {
            return Err(InferenceError::Api {
                status: 500,
                body: String::new(),
            });
        }
        let mut out = image.as_bytes().to_vec();
        out.push(b'C');
        Ok(WorkingImage::new(out))
    }

    async fn segment(&self, image: &WorkingImage) -> Result<WorkingImage, InferenceError> {
        Ok(image.clone())
    }

    async fn inpaint(
        &self,
        image: &WorkingImage,
        _mask: &WorkingImage,
    ) -> Result<WorkingImage, InferenceError> {
        Ok(image.clone())
    }

    async fn start_generation(
        &self,
        _prompt: &str,
        _style: GenerationStyle,
        _token: &AccessToken,
    ) -> Result<GenerationAccepted, InferenceError> {
        Err(InferenceError::Unreachable("not used".into()))
    }

    async fn poll_generation_status(
        &self,
        _project_id: i64,
        _token: &AccessToken,
    ) -> Result<Project, InferenceError> {
        Err(InferenceError::Unreachable("not used".into()))
    }
}

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("fixpix-worker-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

fn queue() -> BatchQueue {
    let events = Arc::new(EventBus::default());
    let pipeline = Arc::new(EditPipeline::new(Arc::new(AppendingClient), events.clone()));
    BatchQueue::new(pipeline, events)
}

fn colorize() -> Settings {
    Settings {
        colorize: true,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Test: results are written next to their inputs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn writes_results_next_to_inputs() {
    let dir = scratch_dir();
    let input = dir.join("photo.png");
    std::fs::write(&input, PNG_BYTES).unwrap();

    let summary = runner::run(&queue(), &[input], &colorize()).await.unwrap();

    assert!(summary.is_success());
    let expected = dir.join("photo.fixpix.png");
    assert_eq!(summary.written, vec![expected.clone()]);

    let mut bytes = PNG_BYTES.to_vec();
    bytes.push(b'C');
    assert_eq!(std::fs::read(expected).unwrap(), bytes);

    std::fs::remove_dir_all(dir).ok();
}

// ---------------------------------------------------------------------------
// Test: invalid, missing and failing inputs are reported, not fatal
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bad_inputs_are_reported() {
    let dir = scratch_dir();
    let good = dir.join("good.png");
    let text = dir.join("notes.txt");
    let failing = dir.join("broken.png");
    let missing = dir.join("missing.png");
    std::fs::write(&good, PNG_BYTES).unwrap();
    std::fs::write(&text, b"plain text").unwrap();
    let mut broken = PNG_BYTES.to_vec();
    broken.extend_from_slice(b"FAIL");
    std::fs::write(&failing, broken).unwrap();

    let summary = runner::run(
        &queue(),
        &[good, text.clone(), failing.clone(), missing.clone()],
        &colorize(),
    )
    .await
    .unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.written.len(), 1);

    let skipped: Vec<&PathBuf> = summary.skipped.iter().map(|(p, _)| p).collect();
    assert_eq!(skipped, vec![&text, &missing]);

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, failing);
    assert_eq!(summary.failed[0].1, "Processing Error: Colorization failed");
    assert!(!dir.join("broken.fixpix.png").exists());

    std::fs::remove_dir_all(dir).ok();
}

// ---------------------------------------------------------------------------
// Test: a shutdown requested while inputs are being read still cancels
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_before_processing_writes_nothing() {
    let dir = scratch_dir();
    let first = dir.join("first.png");
    let second = dir.join("second.png");
    std::fs::write(&first, PNG_BYTES).unwrap();
    std::fs::write(&second, PNG_BYTES).unwrap();

    let queue = queue();
    queue.cancel_processing().await;
    let summary = runner::run(&queue, &[first.clone(), second.clone()], &colorize())
        .await
        .unwrap();

    assert!(!summary.is_success());
    assert!(summary.written.is_empty());
    assert_eq!(summary.cancelled, vec![first, second]);
    assert!(!dir.join("first.fixpix.png").exists());

    std::fs::remove_dir_all(dir).ok();
}
