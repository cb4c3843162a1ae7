//! The editor session: one user's working image, project, settings history
//! and generation state, wired to the pipeline and the backends.

use std::sync::Arc;

use fixpix_core::batch::BatchProgress;
use fixpix_core::error::CoreError;
use fixpix_core::generation::GenerationStyle;
use fixpix_core::history::{HistoryEntry, SettingsHistory};
use fixpix_core::project::{GenerationLimits, Project};
use fixpix_core::settings::{Settings, SettingsPatch};
use fixpix_core::types::WorkingImage;
use fixpix_core::upload::validate_image_file;
use fixpix_events::bus::{EventBus, StudioEvent};
use fixpix_inference::client::{AccessToken, InferenceClient, ProjectClient};
use fixpix_inference::error::InferenceError;
use tokio::sync::RwLock;

use crate::batch::BatchQueue;
use crate::error::{GenerationError, PipelineError};
use crate::generation::{GenerationPoller, GenerationState, PollerConfig};
use crate::orchestrator::{EditPipeline, RunOutcome, RunOverrides};

pub struct EditorSession {
    pipeline: Arc<EditPipeline>,
    batch: BatchQueue,
    generator: GenerationPoller,
    projects: Arc<dyn ProjectClient>,
    events: Arc<EventBus>,
    history: RwLock<SettingsHistory>,
    original: RwLock<Option<WorkingImage>>,
    project: RwLock<Option<Project>>,
    auth: RwLock<Option<AccessToken>>,
}

impl EditorSession {
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        projects: Arc<dyn ProjectClient>,
        events: Arc<EventBus>,
        poller: PollerConfig,
    ) -> Self {
        let pipeline = Arc::new(EditPipeline::new(Arc::clone(&inference), Arc::clone(&events)));
        // The batch queue gets its own pipeline so it never contends with
        // interactive runs for the single-flight lock.
        let batch_pipeline = Arc::new(EditPipeline::new(Arc::clone(&inference), Arc::clone(&events)));

        Self {
            pipeline,
            batch: BatchQueue::new(batch_pipeline, Arc::clone(&events)),
            generator: GenerationPoller::new(
                inference,
                Arc::clone(&projects),
                Arc::clone(&events),
                poller,
            ),
            projects,
            events,
            history: RwLock::new(SettingsHistory::default()),
            original: RwLock::new(None),
            project: RwLock::new(None),
            auth: RwLock::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn pipeline(&self) -> &EditPipeline {
        &self.pipeline
    }

    pub fn batch(&self) -> &BatchQueue {
        &self.batch
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub async fn set_auth(&self, token: Option<AccessToken>) {
        *self.auth.write().await = token;
    }

    pub async fn original(&self) -> Option<WorkingImage> {
        self.original.read().await.clone()
    }

    pub async fn processed(&self) -> Option<WorkingImage> {
        self.pipeline.processed().await
    }

    pub async fn current_project(&self) -> Option<Project> {
        self.project.read().await.clone()
    }

    pub fn is_processing(&self) -> bool {
        self.pipeline.is_processing()
    }

    // -----------------------------------------------------------------------
    // Settings history
    // -----------------------------------------------------------------------

    pub async fn settings(&self) -> Settings {
        self.history.read().await.current().clone()
    }

    pub async fn history_entries(&self) -> Vec<HistoryEntry<Settings>> {
        self.history.read().await.entries().to_vec()
    }

    pub async fn history_index(&self) -> usize {
        self.history.read().await.index()
    }

    pub async fn can_undo(&self) -> bool {
        self.history.read().await.can_undo()
    }

    pub async fn can_redo(&self) -> bool {
        self.history.read().await.can_redo()
    }

    /// Merge `patch` into the current settings and record the result.
    pub async fn update_settings(&self, patch: &SettingsPatch) {
        let mut history = self.history.write().await;
        let next = history.current().merged(patch);
        history.set(next);
        self.publish_history(&history);
    }

    /// Set one setting by its camelCase key.
    pub async fn set_setting(
        &self,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), CoreError> {
        let patch = SettingsPatch::from_key_value(key, value)?;
        self.update_settings(&patch).await;
        Ok(())
    }

    pub async fn undo(&self) -> bool {
        let moved = {
            let mut history = self.history.write().await;
            let moved = history.undo().is_some();
            if moved {
                self.publish_history(&history);
            }
            moved
        };
        if moved {
            self.rerun_after_history_move().await;
        }
        moved
    }

    pub async fn redo(&self) -> bool {
        let moved = {
            let mut history = self.history.write().await;
            let moved = history.redo().is_some();
            if moved {
                self.publish_history(&history);
            }
            moved
        };
        if moved {
            self.rerun_after_history_move().await;
        }
        moved
    }

    /// Move to history entry `index`. Out-of-range indices do nothing.
    pub async fn jump_to_history(&self, index: usize) -> bool {
        let moved = {
            let mut history = self.history.write().await;
            let before = history.index();
            let moved = history.jump_to(index).is_some() && history.index() != before;
            if moved {
                self.publish_history(&history);
            }
            moved
        };
        if moved {
            self.rerun_after_history_move().await;
        }
        moved
    }

    // -----------------------------------------------------------------------
    // Images and projects
    // -----------------------------------------------------------------------

    /// Start editing a new local image.
    ///
    /// The file is validated first; an invalid file changes nothing. A
    /// failed backend upload is logged and editing continues without a
    /// project.
    pub async fn upload_image(
        &self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<Option<Project>, CoreError> {
        let format = validate_image_file(name, &bytes)?;
        let image = WorkingImage::new(bytes);
        tracing::info!(name, ?format, bytes = image.len(), "Image selected");

        *self.original.write().await = Some(image.clone());
        *self.project.write().await = None;
        self.pipeline.set_processed(None).await;
        self.push_settings(Settings::default()).await;

        let token = self.auth.read().await.clone();
        match self.projects.upload_image(name, &image, token.as_ref()).await {
            Ok(project) => {
                tracing::info!(project_id = project.id, "Image uploaded");
                *self.project.write().await = Some(project.clone());
                Ok(Some(project))
            }
            Err(e) => {
                if e.status() == Some(401) {
                    tracing::warn!("Upload rejected, session expired");
                } else {
                    tracing::warn!(error = %e, "Upload failed, continuing locally");
                }
                Ok(None)
            }
        }
    }

    /// Open a saved project: fetch its images, then restore its settings.
    ///
    /// Nothing changes unless every referenced image was fetched.
    pub async fn load_project(&self, project: Project) -> Result<(), InferenceError> {
        let original = self.fetch_optional(project.original_image.as_deref()).await?;
        let processed = self.fetch_optional(project.processed_image.as_deref()).await?;

        let settings = Settings::from_stored(project.settings.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(project_id = project.id, error = %e, "Stored settings unreadable, using defaults");
            Settings::default()
        });

        tracing::info!(project_id = project.id, "Project loaded");
        *self.original.write().await = original;
        self.pipeline.set_processed(processed).await;
        *self.project.write().await = Some(project);
        self.push_settings(settings).await;
        Ok(())
    }

    /// Projects visible to the current user. Failures yield an empty list.
    pub async fn fetch_projects(&self) -> Vec<Project> {
        let token = self.auth.read().await.clone();
        match self.projects.list_projects(token.as_ref()).await {
            Ok(projects) => projects,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch projects");
                Vec::new()
            }
        }
    }

    /// Run the pipeline on the original image with the current settings.
    pub async fn process_image(
        &self,
        overrides: RunOverrides,
    ) -> Result<RunOutcome, PipelineError> {
        let original = self.original().await;
        let settings = self.settings().await;
        self.pipeline.run(original.as_ref(), &settings, overrides).await
    }

    /// Process every pending batch item with the current settings.
    pub async fn process_batch(&self) -> Option<BatchProgress> {
        let settings = self.settings().await;
        self.batch.process_queue(&settings).await
    }

    // -----------------------------------------------------------------------
    // Generation
    // -----------------------------------------------------------------------

    /// Generate a new image from a prompt and make it the current project.
    pub async fn generate_image(
        &self,
        prompt: &str,
        style: GenerationStyle,
    ) -> Result<Project, GenerationError> {
        let token = self.auth.read().await.clone();

        if GenerationPoller::validate(prompt, token.as_ref()).is_ok() {
            *self.original.write().await = None;
            *self.project.write().await = None;
            self.pipeline.set_processed(None).await;
        }

        let project = self.generator.generate(prompt, style, token.as_ref()).await?;

        let processed = match self.fetch_optional(project.processed_image.as_deref()).await {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(project_id = project.id, error = %e, "Generated image could not be fetched");
                None
            }
        };
        self.pipeline.set_processed(processed).await;
        *self.project.write().await = Some(project.clone());
        Ok(project)
    }

    pub async fn generation_state(&self) -> GenerationState {
        self.generator.state().await
    }

    pub async fn fetch_generation_limits(&self) -> Option<GenerationLimits> {
        let token = self.auth.read().await.clone();
        self.generator.fetch_limits(token.as_ref()).await
    }

    // ---- private helpers ----

    async fn push_settings(&self, settings: Settings) {
        let mut history = self.history.write().await;
        history.set(settings);
        self.publish_history(&history);
    }

    fn publish_history(&self, history: &SettingsHistory) {
        self.events.publish(StudioEvent::SettingsChanged {
            index: history.index(),
            len: history.len(),
            can_undo: history.can_undo(),
            can_redo: history.can_redo(),
        });
    }

    async fn rerun_after_history_move(&self) {
        if self.project.read().await.is_none() || self.pipeline.is_processing() {
            return;
        }
        // Failures are already published by the pipeline.
        if let Err(e) = self.process_image(RunOverrides::default()).await {
            tracing::debug!(error = %e, "Re-run after history move failed");
        }
    }

    async fn fetch_optional(&self, url: Option<&str>) -> Result<Option<WorkingImage>, InferenceError> {
        match url {
            Some(url) if !url.is_empty() => self.projects.fetch_image(url).await.map(Some),
            _ => Ok(None),
        }
    }
}
