//! Text-to-image generation constants, statuses and user-facing messages.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Polling defaults
// ---------------------------------------------------------------------------

/// Delay between two status polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Non-terminal polls allowed before the job is reported as timed out
/// (5 minutes at the default interval).
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 300;

/// How long the final status message stays visible before it is cleared.
pub const DEFAULT_STATUS_CLEAR_DELAY_MS: u64 = 2_000;

// ---------------------------------------------------------------------------
// Status messages
// ---------------------------------------------------------------------------

pub const MSG_STARTING: &str = "Starting generation...";
pub const MSG_GENERATING: &str = "Generating image... This may take 2-3 minutes.";
pub const MSG_COMPLETE: &str = "Generation complete!";

// ---------------------------------------------------------------------------
// Style
// ---------------------------------------------------------------------------

/// Rendering style requested for a generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStyle {
    #[default]
    Photorealistic,
    Artistic,
    Anime,
}

impl GenerationStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Photorealistic => "photorealistic",
            Self::Artistic => "artistic",
            Self::Anime => "anime",
        }
    }
}

impl fmt::Display for GenerationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Status of a generation job as reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationJobStatus {
    /// Parse the backend's status string. Anything that is neither
    /// `completed` nor `failed` keeps the job polling.
    pub fn parse(status: Option<&str>) -> Self {
        match status {
            Some("completed") => Self::Completed,
            Some("failed") => Self::Failed,
            Some("pending") => Self::Pending,
            _ => Self::Processing,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Status line shown while polling, after `attempts` non-terminal polls.
///
/// Each attempt is one poll interval; the minutes part is omitted while
/// under a minute, e.g. `"Generating image... (1m 5s elapsed)"`.
pub fn elapsed_status_message(attempts: u32) -> String {
    let minutes = attempts / 60;
    let seconds = attempts % 60;
    let minutes_part = if minutes > 0 {
        format!("{minutes}m ")
    } else {
        String::new()
    };
    format!("Generating image... ({minutes_part}{seconds}s elapsed)")
}

/// Trim a prompt, returning `None` when nothing is left.
pub fn normalize_prompt(prompt: &str) -> Option<&str> {
    let trimmed = prompt.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
