use fixpix_inference::error::InferenceError;

use crate::stage::Stage;

/// Message shown when the AI server cannot be reached at all.
pub const UNREACHABLE_MESSAGE: &str =
    "AI Server is not reachable. Please make sure the AI backend is running.";

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The inference server could not be reached while running `stage`.
    #[error("{stage} failed")]
    Unreachable {
        stage: Stage,
        #[source]
        source: InferenceError,
    },

    /// The inference server answered but `stage` did not produce an image.
    #[error("{stage} failed")]
    StageFailed {
        stage: Stage,
        #[source]
        source: InferenceError,
    },
}

impl PipelineError {
    pub(crate) fn at_stage(stage: Stage, source: InferenceError) -> Self {
        if source.is_unreachable() {
            Self::Unreachable { stage, source }
        } else {
            Self::StageFailed { stage, source }
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Unreachable { stage, .. } | Self::StageFailed { stage, .. } => *stage,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// The message to surface to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Unreachable { .. } => UNREACHABLE_MESSAGE.to_string(),
            Self::StageFailed { .. } => format!("Processing Error: {self}"),
        }
    }
}

/// Why a generation produced no project.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Please enter a prompt")]
    EmptyPrompt,

    #[error("Please log in to use AI generation")]
    Unauthenticated,

    #[error("Session expired. Please log in again.")]
    SessionExpired,

    #[error("{}", daily_limit_message(.limit))]
    DailyLimitReached { limit: Option<u32> },

    /// 400 from the start request, with the server's message when given.
    #[error("{0}")]
    InvalidPrompt(String),

    /// Any other non-2xx from the start request.
    #[error("{0}")]
    Rejected(String),

    #[error("Generation failed. Please try a different prompt.")]
    Failed,

    #[error("Generation timed out. Please try again.")]
    TimedOut,

    /// Non-2xx while polling.
    #[error("Failed to check status")]
    StatusCheck(#[source] InferenceError),

    /// The backend could not be reached or answered garbage.
    #[error("{0}")]
    Transport(#[source] InferenceError),
}

fn daily_limit_message(limit: &Option<u32>) -> String {
    match limit {
        Some(n) => format!("Daily limit reached ({n} generations). Try again tomorrow."),
        None => "Daily limit reached. Try again tomorrow.".to_string(),
    }
}

impl GenerationError {
    /// Map a failed start request to its user-facing error.
    pub(crate) fn from_start(err: InferenceError) -> Self {
        let Some(status) = err.status() else {
            return Self::Transport(err);
        };
        let body = err.body_json();
        let server_message = body
            .as_ref()
            .and_then(|b| b.get("error"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        match status {
            401 => Self::SessionExpired,
            429 => Self::DailyLimitReached {
                limit: body
                    .as_ref()
                    .and_then(|b| b.get("daily_limit"))
                    .and_then(|v| v.as_u64())
                    .and_then(|v| u32::try_from(v).ok()),
            },
            400 => Self::InvalidPrompt(server_message.unwrap_or_else(|| "Invalid prompt".into())),
            _ => Self::Rejected(server_message.unwrap_or_else(|| "Generation failed".into())),
        }
    }

    /// Map a failed poll request.
    pub(crate) fn from_poll(err: InferenceError) -> Self {
        if err.status().is_some() {
            Self::StatusCheck(err)
        } else {
            Self::Transport(err)
        }
    }
}
