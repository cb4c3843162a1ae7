//! Single-image edit pipeline.
//!
//! [`EditPipeline::run`] sends the working image through the enabled
//! stages in a fixed order, feeding each stage's output to the next. At
//! most one run is in flight per pipeline; a trigger that arrives while a
//! run holds the lock is dropped with [`SkipReason::AlreadyRunning`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fixpix_core::settings::{Settings, SettingsPatch};
use fixpix_core::types::WorkingImage;
use fixpix_events::bus::{EventBus, StudioEvent};
use fixpix_inference::client::{FaceRestoreParams, InferenceClient, COLORIZE_RENDER_FACTOR};
use fixpix_inference::error::InferenceError;
use tokio::sync::RwLock;

use crate::error::PipelineError;
use crate::guard::FlagGuard;
use crate::stage::Stage;

// ---------------------------------------------------------------------------
// Run inputs and outcomes
// ---------------------------------------------------------------------------

/// Per-call adjustments that are not recorded in the settings history.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    /// Merged over the caller's settings for this run only.
    pub settings: SettingsPatch,
    /// Inpainting mask. Enables the object removal stage.
    pub mask: Option<WorkingImage>,
}

impl RunOverrides {
    pub fn with_mask(mask: WorkingImage) -> Self {
        Self {
            mask: Some(mask),
            ..Default::default()
        }
    }
}

/// Why a run did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoImage,
    AlreadyRunning,
}

/// Result of a run that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// All enabled stages succeeded; this image is now the processed output.
    Completed(WorkingImage),
    Skipped(SkipReason),
}

impl RunOutcome {
    pub fn image(&self) -> Option<&WorkingImage> {
        match self {
            Self::Completed(image) => Some(image),
            Self::Skipped(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// EditPipeline
// ---------------------------------------------------------------------------

pub struct EditPipeline {
    client: Arc<dyn InferenceClient>,
    events: Arc<EventBus>,
    running: AtomicBool,
    processed: RwLock<Option<WorkingImage>>,
}

impl EditPipeline {
    pub fn new(client: Arc<dyn InferenceClient>, events: Arc<EventBus>) -> Self {
        Self {
            client,
            events,
            running: AtomicBool::new(false),
            processed: RwLock::new(None),
        }
    }

    /// `true` while a run holds the lock.
    pub fn is_processing(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The last successfully published output.
    pub async fn processed(&self) -> Option<WorkingImage> {
        self.processed.read().await.clone()
    }

    /// Replace the published output without running any stage, e.g. when a
    /// saved project is loaded or a new image is uploaded.
    pub async fn set_processed(&self, image: Option<WorkingImage>) {
        *self.processed.write().await = image;
    }

    /// Run the enabled stages over `source`.
    ///
    /// Failures leave the previously published output untouched and are
    /// also published as [`StudioEvent::ProcessingFailed`].
    pub async fn run(
        &self,
        source: Option<&WorkingImage>,
        settings: &Settings,
        overrides: RunOverrides,
    ) -> Result<RunOutcome, PipelineError> {
        let Some(source) = source else {
            tracing::debug!("No working image, skipping pipeline run");
            return Ok(RunOutcome::Skipped(SkipReason::NoImage));
        };

        // Acquired before the first await so concurrent triggers see it.
        let Some(_guard) = FlagGuard::acquire(&self.running) else {
            tracing::debug!("Pipeline already running, dropping trigger");
            return Ok(RunOutcome::Skipped(SkipReason::AlreadyRunning));
        };

        let effective = settings.merged(&overrides.settings);
        let plan = Stage::plan(&effective, overrides.mask.is_some());
        tracing::info!(stages = plan.len(), bytes = source.len(), "Pipeline run started");
        self.events.publish(StudioEvent::ProcessingStarted);

        match self
            .execute(&plan, source.clone(), &effective, overrides.mask.as_ref())
            .await
        {
            Ok(image) => {
                *self.processed.write().await = Some(image.clone());
                tracing::info!(bytes = image.len(), "Pipeline run completed");
                self.events.publish(StudioEvent::ProcessingSucceeded { bytes: image.len() });
                Ok(RunOutcome::Completed(image))
            }
            Err(e) => {
                tracing::warn!(stage = %e.stage(), error = %e, "Pipeline run failed");
                self.events.publish(StudioEvent::ProcessingFailed {
                    message: e.user_message(),
                    unreachable: e.is_unreachable(),
                });
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        plan: &[Stage],
        mut current: WorkingImage,
        settings: &Settings,
        mask: Option<&WorkingImage>,
    ) -> Result<WorkingImage, PipelineError> {
        for &stage in plan {
            tracing::debug!(stage = %stage, "Running stage");
            current = self
                .run_stage(stage, &current, settings, mask)
                .await
                .map_err(|e| PipelineError::at_stage(stage, e))?;
        }
        Ok(current)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        image: &WorkingImage,
        settings: &Settings,
        mask: Option<&WorkingImage>,
    ) -> Result<WorkingImage, InferenceError> {
        match stage {
            Stage::FaceRestoration => {
                self.client
                    .restore_face(image, &FaceRestoreParams::default())
                    .await
            }
            Stage::SuperResolution => {
                self.client
                    .super_resolution(image, settings.upscale_x)
                    .await
            }
            Stage::Colorization => self.client.colorize(image, COLORIZE_RENDER_FACTOR).await,
            Stage::BackgroundRemoval => self.client.segment(image).await,
            Stage::ObjectRemoval => match mask {
                Some(mask) => self.client.inpaint(image, mask).await,
                None => Ok(image.clone()),
            },
        }
    }
}
