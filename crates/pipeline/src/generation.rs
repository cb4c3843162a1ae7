//! Text-to-image generation: start a job, then poll it to a terminal state.
//!
//! The poller owns a small observable state (generating flag, status line,
//! last error, cached quota) that mirrors every step on the [`EventBus`].
//! The status line is cleared a short delay after each resolution unless a
//! newer generation has started in the meantime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fixpix_core::error::CoreError;
use fixpix_core::generation::{
    elapsed_status_message, normalize_prompt, GenerationJobStatus, GenerationStyle,
    DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_STATUS_CLEAR_DELAY_MS,
    MSG_COMPLETE, MSG_GENERATING, MSG_STARTING,
};
use fixpix_core::project::{GenerationLimits, Project};
use fixpix_events::bus::{EventBus, StudioEvent};
use fixpix_inference::client::{AccessToken, InferenceClient, ProjectClient};
use tokio::sync::RwLock;

use crate::error::GenerationError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// Non-terminal polls allowed before the job is reported as timed out.
    pub max_attempts: u32,
    pub status_clear_delay: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            status_clear_delay: Duration::from_millis(DEFAULT_STATUS_CLEAR_DELAY_MS),
        }
    }
}

impl PollerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `GENERATION_POLL_INTERVAL_MS` | `1000`  |
    /// | `GENERATION_MAX_ATTEMPTS`     | `300`   |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();

        let poll_interval = match std::env::var("GENERATION_POLL_INTERVAL_MS") {
            Ok(raw) => Duration::from_millis(parse_env("GENERATION_POLL_INTERVAL_MS", &raw)?),
            Err(_) => defaults.poll_interval,
        };
        let max_attempts = match std::env::var("GENERATION_MAX_ATTEMPTS") {
            Ok(raw) => parse_env("GENERATION_MAX_ATTEMPTS", &raw)?,
            Err(_) => defaults.max_attempts,
        };

        Ok(Self {
            poll_interval,
            max_attempts,
            ..defaults
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, CoreError> {
    raw.trim()
        .parse()
        .map_err(|_| CoreError::Validation(format!("{name} must be a whole number, got '{raw}'")))
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Observable generation state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationState {
    pub is_generating: bool,
    /// Progress line; empty when idle.
    pub status: String,
    pub error: Option<String>,
    pub limits: Option<GenerationLimits>,
}

struct Shared {
    state: RwLock<GenerationState>,
    /// Bumped on every started generation; guards the delayed status clear.
    epoch: AtomicU64,
    events: Arc<EventBus>,
}

impl Shared {
    async fn set_status(&self, message: impl Into<String>) {
        let message = message.into();
        self.state.write().await.status = message.clone();
        self.events.publish(StudioEvent::GenerationStatus { message });
    }
}

// ---------------------------------------------------------------------------
// GenerationPoller
// ---------------------------------------------------------------------------

pub struct GenerationPoller {
    inference: Arc<dyn InferenceClient>,
    projects: Arc<dyn ProjectClient>,
    config: PollerConfig,
    shared: Arc<Shared>,
}

impl GenerationPoller {
    pub fn new(
        inference: Arc<dyn InferenceClient>,
        projects: Arc<dyn ProjectClient>,
        events: Arc<EventBus>,
        config: PollerConfig,
    ) -> Self {
        Self {
            inference,
            projects,
            config,
            shared: Arc::new(Shared {
                state: RwLock::new(GenerationState::default()),
                epoch: AtomicU64::new(0),
                events,
            }),
        }
    }

    pub async fn state(&self) -> GenerationState {
        self.shared.state.read().await.clone()
    }

    /// Check the request locally before anything goes over the wire.
    pub fn validate<'p, 't>(
        prompt: &'p str,
        token: Option<&'t AccessToken>,
    ) -> Result<(&'p str, &'t AccessToken), GenerationError> {
        let prompt = normalize_prompt(prompt).ok_or(GenerationError::EmptyPrompt)?;
        let token = token.ok_or(GenerationError::Unauthenticated)?;
        Ok((prompt, token))
    }

    /// Start a generation and poll it to completion.
    ///
    /// Every outcome is also recorded in [`state`](Self::state): the error
    /// message on failure, the status line and refreshed quota on success.
    /// Each call ends with exactly one [`StudioEvent::GenerationFinished`],
    /// including calls rejected before any request is sent.
    pub async fn generate(
        &self,
        prompt: &str,
        style: GenerationStyle,
        token: Option<&AccessToken>,
    ) -> Result<Project, GenerationError> {
        let (prompt, token) = match Self::validate(prompt, token) {
            Ok(checked) => checked,
            Err(e) => {
                let message = e.to_string();
                self.shared.state.write().await.error = Some(message.clone());
                self.shared.events.publish(StudioEvent::GenerationFinished {
                    project_id: None,
                    error: Some(message),
                });
                return Err(e);
            }
        };

        let epoch = self.shared.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        {
            let mut state = self.shared.state.write().await;
            state.is_generating = true;
            state.error = None;
        }
        self.shared.set_status(MSG_STARTING).await;
        tracing::info!(style = %style, "Generation requested");

        let result = self.run_job(prompt, style, token).await;

        match &result {
            Ok(project) => {
                tracing::info!(project_id = project.id, "Generation completed");
                self.shared.set_status(MSG_COMPLETE).await;
                self.fetch_limits(Some(token)).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Generation failed");
                self.shared.state.write().await.error = Some(e.to_string());
            }
        }
        self.shared.state.write().await.is_generating = false;
        self.shared.events.publish(StudioEvent::GenerationFinished {
            project_id: result.as_ref().ok().map(|p| p.id),
            error: result.as_ref().err().map(|e| e.to_string()),
        });
        self.schedule_status_clear(epoch);

        result
    }

    /// Refresh the cached quota. Failures are logged and leave the cache
    /// as it was.
    pub async fn fetch_limits(&self, token: Option<&AccessToken>) -> Option<GenerationLimits> {
        let token = token?;
        match self.projects.generation_limits(token).await {
            Ok(limits) => {
                self.shared.state.write().await.limits = Some(limits.clone());
                Some(limits)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch generation limits");
                None
            }
        }
    }

    // ---- private helpers ----

    async fn run_job(
        &self,
        prompt: &str,
        style: GenerationStyle,
        token: &AccessToken,
    ) -> Result<Project, GenerationError> {
        let accepted = self
            .inference
            .start_generation(prompt, style, token)
            .await
            .map_err(GenerationError::from_start)?;

        tracing::debug!(project_id = accepted.project_id, "Generation accepted");
        if let Some(remaining) = accepted.remaining {
            if let Some(limits) = self.shared.state.write().await.limits.as_mut() {
                limits.remaining = Some(remaining);
            }
        }

        self.shared.set_status(MSG_GENERATING).await;
        self.poll_until_done(accepted.project_id, token).await
    }

    async fn poll_until_done(
        &self,
        project_id: i64,
        token: &AccessToken,
    ) -> Result<Project, GenerationError> {
        let mut attempts: u32 = 0;
        loop {
            let project = self
                .inference
                .poll_generation_status(project_id, token)
                .await
                .map_err(GenerationError::from_poll)?;

            match GenerationJobStatus::parse(project.status.as_deref()) {
                GenerationJobStatus::Completed => return Ok(project),
                GenerationJobStatus::Failed => return Err(GenerationError::Failed),
                GenerationJobStatus::Pending | GenerationJobStatus::Processing => {
                    attempts += 1;
                    if attempts > self.config.max_attempts {
                        return Err(GenerationError::TimedOut);
                    }
                    self.shared
                        .set_status(elapsed_status_message(attempts))
                        .await;
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    fn schedule_status_clear(&self, epoch: u64) {
        let shared = Arc::clone(&self.shared);
        let delay = self.config.status_clear_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if shared.epoch.load(Ordering::Acquire) == epoch {
                shared.set_status(String::new()).await;
            }
        });
    }
}
