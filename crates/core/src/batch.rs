//! Batch queue statuses and progress accounting.
//!
//! The async queue processor lives in `fixpix-pipeline`; this module holds
//! the pure pieces it and its callers share.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Queue status
// ---------------------------------------------------------------------------

/// Lifecycle status of a single queued image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting to be processed.
    Pending,
    /// Currently running through the edit pipeline.
    Processing,
    /// Finished with a result image.
    Completed,
    /// The pipeline run failed.
    Error,
    /// The batch was cancelled before this item started.
    Cancelled,
}

impl QueueStatus {
    /// Human-readable label for display.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Completed => "Done",
            Self::Error => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Items in these states count toward the "failed" total and go back
    /// to `Pending` on retry.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Error | Self::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Running progress of one `process_queue` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Items resolved so far in this run (succeeded or failed).
    pub completed: usize,
    /// Items that were pending when the run started.
    pub total: usize,
    /// `completed / total` as a rounded percentage; `0` when `total` is 0.
    pub percentage: u8,
}

impl BatchProgress {
    pub fn new(completed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            let pct = (completed.min(total) as f64 * 100.0 / total as f64).round();
            pct as u8
        };
        Self {
            completed,
            total,
            percentage,
        }
    }
}

// ---------------------------------------------------------------------------
// Counts
// ---------------------------------------------------------------------------

/// Per-status tallies of a queue, for summary displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    /// `Error` plus `Cancelled`.
    pub failed: usize,
}

impl QueueCounts {
    /// Tally an iterator of statuses.
    pub fn tally(statuses: impl IntoIterator<Item = QueueStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                QueueStatus::Pending => counts.pending += 1,
                QueueStatus::Processing => counts.processing += 1,
                QueueStatus::Completed => counts.completed += 1,
                QueueStatus::Error | QueueStatus::Cancelled => counts.failed += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed
    }
}
