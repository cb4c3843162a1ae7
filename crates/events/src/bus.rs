//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`StudioEvent`]s. It is
//! designed to be shared via `Arc<EventBus>` between the editor session,
//! the pipeline orchestrator, the batch queue and the generation poller.

use chrono::{DateTime, Utc};
use fixpix_core::batch::{BatchProgress, QueueStatus};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// StudioEvent
// ---------------------------------------------------------------------------

/// A state change in one of the editing components.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudioEvent {
    /// The settings history pointer moved or a new entry was recorded.
    SettingsChanged {
        index: usize,
        len: usize,
        can_undo: bool,
        can_redo: bool,
    },

    /// A pipeline run acquired the lock and is starting.
    ProcessingStarted,

    /// A pipeline run published a new processed image.
    ProcessingSucceeded {
        /// Size of the processed image in bytes.
        bytes: usize,
    },

    /// A pipeline run aborted.
    ProcessingFailed {
        /// User-facing message.
        message: String,
        /// `true` when the inference server could not be reached at all.
        unreachable: bool,
    },

    /// A queue item changed status.
    QueueItemUpdated { item_id: Uuid, status: QueueStatus },

    /// Batch progress after an item resolved.
    BatchProgress(BatchProgress),

    /// A `process_queue` call returned.
    BatchFinished {
        progress: BatchProgress,
        cancelled: bool,
    },

    /// The generation status line changed. Empty means cleared.
    GenerationStatus { message: String },

    /// A generation resolved, with either a project or an error.
    GenerationFinished {
        project_id: Option<i64>,
        error: Option<String>,
    },
}

/// A [`StudioEvent`] stamped with the time it was published.
#[derive(Debug, Clone, Serialize)]
pub struct Published {
    pub event: StudioEvent,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use fixpix_events::bus::{EventBus, StudioEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(StudioEvent::ProcessingStarted);
/// ```
pub struct EventBus {
    sender: broadcast::Sender<Published>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: StudioEvent) {
        // A send error only means there are zero receivers.
        let _ = self.sender.send(Published {
            event,
            timestamp: Utc::now(),
        });
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Published> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Drain every event currently buffered in `rx` without waiting.
pub fn drain(rx: &mut broadcast::Receiver<Published>) -> Vec<StudioEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(published) => events.push(published.event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
