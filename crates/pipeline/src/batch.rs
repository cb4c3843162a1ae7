//! FIFO batch queue over a dedicated [`EditPipeline`].
//!
//! Items are processed strictly one at a time in insertion order. A run
//! can be cancelled cooperatively: the token is checked before each item,
//! the in-flight item always finishes, and whatever the run left pending is
//! marked [`QueueStatus::Cancelled`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fixpix_core::batch::{BatchProgress, QueueCounts, QueueStatus};
use fixpix_core::settings::Settings;
use fixpix_core::types::WorkingImage;
use fixpix_events::bus::{EventBus, StudioEvent};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::guard::FlagGuard;
use crate::orchestrator::{EditPipeline, RunOutcome, RunOverrides, SkipReason};

/// One queued image.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: Uuid,
    pub name: String,
    pub source: WorkingImage,
    pub status: QueueStatus,
    pub result: Option<WorkingImage>,
    pub error: Option<String>,
}

impl QueueItem {
    fn new(name: String, source: WorkingImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            source,
            status: QueueStatus::Pending,
            result: None,
            error: None,
        }
    }
}

pub struct BatchQueue {
    pipeline: Arc<EditPipeline>,
    events: Arc<EventBus>,
    items: RwLock<Vec<QueueItem>>,
    processing: AtomicBool,
    cancel: Mutex<CancellationToken>,
    progress: RwLock<BatchProgress>,
}

impl BatchQueue {
    /// `pipeline` should not be shared with the interactive editor, or its
    /// single-flight lock would make the two drop each other's runs.
    pub fn new(pipeline: Arc<EditPipeline>, events: Arc<EventBus>) -> Self {
        Self {
            pipeline,
            events,
            items: RwLock::new(Vec::new()),
            processing: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            progress: RwLock::new(BatchProgress::default()),
        }
    }

    // -----------------------------------------------------------------------
    // Queue edits
    // -----------------------------------------------------------------------

    /// Append one pending item per file. Does not start processing.
    pub async fn add_to_queue(
        &self,
        files: impl IntoIterator<Item = (String, WorkingImage)>,
    ) -> Vec<Uuid> {
        let mut items = self.items.write().await;
        let added: Vec<QueueItem> = files
            .into_iter()
            .map(|(name, image)| QueueItem::new(name, image))
            .collect();
        let ids = added.iter().map(|i| i.id).collect::<Vec<_>>();
        items.extend(added);
        tracing::debug!(added = ids.len(), queued = items.len(), "Files queued");
        ids
    }

    /// Remove an item. Callers must not remove the item being processed.
    pub async fn remove_from_queue(&self, id: Uuid) -> bool {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|i| i.id != id);
        items.len() != before
    }

    pub async fn clear_queue(&self) {
        self.items.write().await.clear();
        *self.progress.write().await = BatchProgress::default();
    }

    pub async fn clear_completed(&self) {
        self.items
            .write()
            .await
            .retain(|i| i.status != QueueStatus::Completed);
    }

    /// Reset failed and cancelled items to pending. Returns how many moved.
    pub async fn retry_failed(&self) -> usize {
        let mut retried = Vec::new();
        {
            let mut items = self.items.write().await;
            for item in items.iter_mut().filter(|i| i.status.is_retryable()) {
                item.status = QueueStatus::Pending;
                item.error = None;
                retried.push(item.id);
            }
        }
        for id in &retried {
            self.publish_status(*id, QueueStatus::Pending);
        }
        retried.len()
    }

    // -----------------------------------------------------------------------
    // Processing
    // -----------------------------------------------------------------------

    /// Process every item pending at call time, in queue order.
    ///
    /// Returns `None` without doing anything if a run is already active.
    pub async fn process_queue(&self, settings: &Settings) -> Option<BatchProgress> {
        // The flag and the token are taken under one lock so a concurrent
        // cancel always lands on the token this run checks.
        let (_guard, token) = {
            let cancel = self.cancel.lock().await;
            let Some(guard) = FlagGuard::acquire(&self.processing) else {
                tracing::debug!("Batch already processing, ignoring request");
                return None;
            };
            (guard, cancel.clone())
        };
        if token.is_cancelled() {
            tracing::info!("Batch cancelled before the run started");
        }

        let pending: Vec<Uuid> = self
            .items
            .read()
            .await
            .iter()
            .filter(|i| i.status == QueueStatus::Pending)
            .map(|i| i.id)
            .collect();

        let mut total = pending.len();
        let mut completed = 0;
        self.set_progress(BatchProgress::new(completed, total)).await;
        tracing::info!(total, "Batch run started");

        for (position, id) in pending.iter().enumerate() {
            if token.is_cancelled() {
                let left = self.cancel_pending(&pending[position..]).await;
                tracing::info!(completed, cancelled = left, "Batch run cancelled");
                break;
            }

            let Some(source) = self.begin_item(*id).await else {
                // Removed or edited since the run started.
                total = total.saturating_sub(1);
                self.set_progress(BatchProgress::new(completed, total)).await;
                continue;
            };

            let outcome = self
                .pipeline
                .run(Some(&source), settings, RunOverrides::default())
                .await;

            match outcome {
                Ok(RunOutcome::Completed(image)) => {
                    self.finish_item(*id, QueueStatus::Completed, Some(image), None)
                        .await;
                }
                Ok(RunOutcome::Skipped(reason)) => {
                    let message = match reason {
                        SkipReason::AlreadyRunning => "Pipeline is busy",
                        SkipReason::NoImage => "No image",
                    };
                    self.finish_item(*id, QueueStatus::Error, None, Some(message.into()))
                        .await;
                }
                Err(e) => {
                    tracing::warn!(item_id = %id, error = %e, "Batch item failed");
                    self.finish_item(*id, QueueStatus::Error, None, Some(e.user_message()))
                        .await;
                }
            }

            completed += 1;
            self.set_progress(BatchProgress::new(completed, total)).await;
        }

        let cancelled = {
            let mut cancel = self.cancel.lock().await;
            let cancelled = cancel.is_cancelled();
            *cancel = CancellationToken::new();
            cancelled
        };
        let progress = self.progress().await;
        self.events
            .publish(StudioEvent::BatchFinished { progress, cancelled });
        tracing::info!(
            completed = progress.completed,
            total = progress.total,
            cancelled,
            "Batch run finished"
        );
        Some(progress)
    }

    /// Request cooperative cancellation of the active run, or of the next
    /// one if none is active yet.
    pub async fn cancel_processing(&self) {
        let cancel = self.cancel.lock().await;
        tracing::info!(active = self.is_processing(), "Batch cancellation requested");
        cancel.cancel();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub async fn progress(&self) -> BatchProgress {
        *self.progress.read().await
    }

    pub async fn snapshot(&self) -> Vec<QueueItem> {
        self.items.read().await.clone()
    }

    pub async fn counts(&self) -> QueueCounts {
        QueueCounts::tally(self.items.read().await.iter().map(|i| i.status))
    }

    pub async fn get(&self, id: Uuid) -> Option<QueueItem> {
        self.items.read().await.iter().find(|i| i.id == id).cloned()
    }

    // ---- private helpers ----

    /// Mark a still-pending item as processing and hand back its source.
    async fn begin_item(&self, id: Uuid) -> Option<WorkingImage> {
        let source = {
            let mut items = self.items.write().await;
            let item = items
                .iter_mut()
                .find(|i| i.id == id && i.status == QueueStatus::Pending)?;
            item.status = QueueStatus::Processing;
            item.source.clone()
        };
        self.publish_status(id, QueueStatus::Processing);
        Some(source)
    }

    async fn finish_item(
        &self,
        id: Uuid,
        status: QueueStatus,
        result: Option<WorkingImage>,
        error: Option<String>,
    ) {
        {
            let mut items = self.items.write().await;
            if let Some(item) = items.iter_mut().find(|i| i.id == id) {
                item.status = status;
                item.result = result;
                item.error = error;
            }
        }
        self.publish_status(id, status);
    }

    async fn cancel_pending(&self, ids: &[Uuid]) -> usize {
        let mut cancelled = Vec::new();
        {
            let mut items = self.items.write().await;
            for item in items
                .iter_mut()
                .filter(|i| i.status == QueueStatus::Pending && ids.contains(&i.id))
            {
                item.status = QueueStatus::Cancelled;
                cancelled.push(item.id);
            }
        }
        for id in &cancelled {
            self.publish_status(*id, QueueStatus::Cancelled);
        }
        cancelled.len()
    }

    async fn set_progress(&self, progress: BatchProgress) {
        *self.progress.write().await = progress;
        self.events.publish(StudioEvent::BatchProgress(progress));
    }

    fn publish_status(&self, item_id: Uuid, status: QueueStatus) {
        self.events
            .publish(StudioEvent::QueueItemUpdated { item_id, status });
    }
}
