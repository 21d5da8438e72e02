//! Persistence batcher.
//!
//! Decides, per content update, whether to write to the store now or to
//! coalesce into a debounced write:
//!
//! - completion, the first write of a message, and a change of at least
//!   `batch_threshold` characters are written immediately
//! - anything else replaces the pending debounced write, so only the latest
//!   content of a burst is persisted
//!
//! Writes for one message never overlap.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;

use crate::config::BatcherConfig;
use crate::error::StoreError;
use crate::models::MessageMetadata;
use crate::traits::{DocumentStore, Scheduler, TimerHandle, UpdateMessageArgs};

/// One content update for a durable message.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageUpdate {
    pub message_id: String,
    pub content: String,
    pub metadata: Option<MessageMetadata>,
    pub is_complete: bool,
}

/// Destination of batched writes.
#[async_trait]
pub trait MessageWriter: Send + Sync {
    async fn write(&self, update: MessageUpdate) -> Result<(), StoreError>;
}

/// Writes through `updateMessageContent`.
pub struct StoreWriter(pub Arc<dyn DocumentStore>);

#[async_trait]
impl MessageWriter for StoreWriter {
    async fn write(&self, update: MessageUpdate) -> Result<(), StoreError> {
        self.0
            .update_message_content(UpdateMessageArgs {
                message_id: update.message_id,
                content: update.content,
                is_complete: Some(update.is_complete),
                metadata: update.metadata,
            })
            .await
    }
}

#[derive(Default)]
struct BatchState {
    last_written: Option<String>,
    pending: Option<TimerHandle>,
    /// Bumped on every update and reset; a debounced write only runs if it
    /// is still the latest.
    generation: u64,
    /// Failure of a debounced write, returned by the next non-final update.
    deferred_error: Option<StoreError>,
}

struct Shared {
    writer: Arc<dyn MessageWriter>,
    state: Mutex<BatchState>,
    write_gate: tokio::sync::Mutex<()>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BatchState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn write(&self, update: MessageUpdate, generation: Option<u64>) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;
        if let Some(expected) = generation {
            if self.lock().generation != expected {
                return Ok(());
            }
        }

        let content = update.content.clone();
        let message_id = update.message_id.clone();
        self.writer.write(update).await?;
        tracing::trace!(%message_id, content_len = content.len(), "content persisted");
        self.lock().last_written = Some(content);
        Ok(())
    }
}

/// Rate-limits content writes for the message currently streaming.
#[derive(Clone)]
pub struct PersistenceBatcher {
    shared: Arc<Shared>,
    scheduler: Arc<dyn Scheduler>,
    config: BatcherConfig,
}

impl PersistenceBatcher {
    pub fn new(
        writer: Arc<dyn MessageWriter>,
        scheduler: Arc<dyn Scheduler>,
        config: BatcherConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                writer,
                state: Mutex::new(BatchState::default()),
                write_gate: tokio::sync::Mutex::new(()),
            }),
            scheduler,
            config,
        }
    }

    /// Batcher writing to `store`.
    pub fn for_store(
        store: Arc<dyn DocumentStore>,
        scheduler: Arc<dyn Scheduler>,
        config: BatcherConfig,
    ) -> Self {
        Self::new(Arc::new(StoreWriter(store)), scheduler, config)
    }

    /// Submit the latest cumulative content.
    ///
    /// Immediate writes are awaited and their failure returned. A debounced
    /// write has no caller to report to; its failure is returned by the next
    /// non-final call instead.
    pub async fn update_message(&self, update: MessageUpdate) -> Result<(), StoreError> {
        let deferred = {
            let mut state = self.shared.lock();
            if let Some(pending) = state.pending.take() {
                pending.cancel();
            }
            state.generation += 1;

            let write_now = update.is_complete
                || match state.last_written.as_deref() {
                    None | Some("") => true,
                    Some(previous) => char_delta(previous, &update.content) >= self.config.batch_threshold,
                };

            if !write_now {
                tracing::trace!(
                    message_id = %update.message_id,
                    content_len = update.content.len(),
                    "debouncing content write"
                );
                let generation = state.generation;
                state.pending = Some(self.schedule_write(update, generation));
                return state.deferred_error.take().map_or(Ok(()), Err);
            }

            if update.is_complete {
                state.deferred_error = None;
                None
            } else {
                state.deferred_error.take()
            }
        };

        tracing::debug!(
            message_id = %update.message_id,
            content_len = update.content.len(),
            is_complete = update.is_complete,
            "writing content immediately"
        );
        self.shared.write(update, None).await?;
        deferred.map_or(Ok(()), Err)
    }

    /// Drop any pending write and forget what was written. Call before each
    /// new message; safe to call repeatedly.
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        if let Some(pending) = state.pending.take() {
            pending.cancel();
        }
        state.generation += 1;
        state.last_written = None;
        state.deferred_error = None;
    }

    /// Content of the last successful write.
    pub fn last_written(&self) -> Option<String> {
        self.shared.lock().last_written.clone()
    }

    /// Whether a debounced write is waiting.
    pub fn has_pending(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    fn schedule_write(&self, update: MessageUpdate, generation: u64) -> TimerHandle {
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);
        self.scheduler.schedule(
            self.config.debounce(),
            Box::pin(async move {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                {
                    let mut state = shared.lock();
                    if state.generation != generation {
                        return;
                    }
                    state.pending = None;
                }

                let message_id = update.message_id.clone();
                if let Err(err) = shared.write(update, Some(generation)).await {
                    tracing::warn!(%message_id, error = %err, "debounced content write failed");
                    shared.lock().deferred_error = Some(err);
                }
            }),
        )
    }
}

fn char_delta(previous: &str, next: &str) -> usize {
    previous.chars().count().abs_diff(next.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::ManualScheduler;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingWriter {
        writes: Mutex<Vec<MessageUpdate>>,
        fail_with: Mutex<Option<StoreError>>,
    }

    impl RecordingWriter {
        fn contents(&self) -> Vec<String> {
            self.writes.lock().unwrap().iter().map(|u| u.content.clone()).collect()
        }
    }

    #[async_trait]
    impl MessageWriter for RecordingWriter {
        async fn write(&self, update: MessageUpdate) -> Result<(), StoreError> {
            if let Some(err) = self.fail_with.lock().unwrap().take() {
                return Err(err);
            }
            self.writes.lock().unwrap().push(update);
            Ok(())
        }
    }

    fn update(content: &str, is_complete: bool) -> MessageUpdate {
        MessageUpdate {
            message_id: "m1".to_string(),
            content: content.to_string(),
            metadata: None,
            is_complete,
        }
    }

    fn batcher() -> (PersistenceBatcher, Arc<RecordingWriter>, ManualScheduler) {
        let writer = Arc::new(RecordingWriter::default());
        let scheduler = ManualScheduler::new();
        let batcher = PersistenceBatcher::new(
            writer.clone(),
            Arc::new(scheduler.clone()),
            BatcherConfig::default(),
        );
        (batcher, writer, scheduler)
    }

    #[tokio::test]
    async fn test_first_write_is_immediate() {
        let (batcher, writer, scheduler) = batcher();
        batcher.update_message(update("H", false)).await.unwrap();
        assert_eq!(writer.contents(), vec!["H"]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test]
    async fn test_small_updates_coalesce_into_one_write() {
        let (batcher, writer, scheduler) = batcher();
        batcher.update_message(update("x", false)).await.unwrap();

        batcher.update_message(update("xa", false)).await.unwrap();
        batcher.update_message(update("xab", false)).await.unwrap();
        batcher.update_message(update("xabc", false)).await.unwrap();
        assert_eq!(writer.contents(), vec!["x"]);
        assert_eq!(scheduler.pending(), 1);

        scheduler.advance(Duration::from_millis(100)).await;
        assert_eq!(writer.contents(), vec!["x", "xabc"]);
        assert_eq!(batcher.last_written().as_deref(), Some("xabc"));
    }

    #[tokio::test]
    async fn test_large_delta_writes_immediately() {
        let (batcher, writer, _scheduler) = batcher();
        batcher.update_message(update("x", false)).await.unwrap();
        let big = format!("x{}", "y".repeat(50));
        batcher.update_message(update(&big, false)).await.unwrap();
        assert_eq!(writer.contents(), vec!["x".to_string(), big]);
    }

    #[tokio::test]
    async fn test_completion_supersedes_pending_write() {
        let (batcher, writer, scheduler) = batcher();
        batcher.update_message(update("x", false)).await.unwrap();
        batcher.update_message(update("xy", false)).await.unwrap();
        assert!(batcher.has_pending());

        batcher.update_message(update("xyz", true)).await.unwrap();
        assert!(!batcher.has_pending());
        scheduler.run_until_idle().await;

        let writes = writer.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].content, "xyz");
        assert!(writes[1].is_complete);
    }

    #[tokio::test]
    async fn test_reset_cancels_pending_and_forgets_last_written() {
        let (batcher, writer, scheduler) = batcher();
        batcher.update_message(update("x", false)).await.unwrap();
        batcher.update_message(update("xy", false)).await.unwrap();
        batcher.reset();
        batcher.reset();
        scheduler.run_until_idle().await;
        assert_eq!(writer.contents(), vec!["x"]);
        assert_eq!(batcher.last_written(), None);

        // next message starts with an immediate write again
        batcher.update_message(update("a", false)).await.unwrap();
        assert_eq!(writer.contents(), vec!["x", "a"]);
    }

    #[tokio::test]
    async fn test_immediate_failure_is_returned() {
        let (batcher, writer, _scheduler) = batcher();
        *writer.fail_with.lock().unwrap() = Some(StoreError::Unavailable {
            message: "offline".to_string(),
        });
        let result = batcher.update_message(update("x", true)).await;
        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
        assert_eq!(batcher.last_written(), None);
    }

    #[tokio::test]
    async fn test_debounced_failure_surfaces_on_next_update() {
        let (batcher, writer, scheduler) = batcher();
        batcher.update_message(update("x", false)).await.unwrap();
        batcher.update_message(update("xy", false)).await.unwrap();
        *writer.fail_with.lock().unwrap() = Some(StoreError::Unavailable {
            message: "offline".to_string(),
        });
        scheduler.advance(Duration::from_millis(100)).await;

        let result = batcher.update_message(update("xyz", false)).await;
        assert!(matches!(result, Err(StoreError::Unavailable { .. })));
        // reported once
        scheduler.run_until_idle().await;
        assert!(batcher.update_message(update("xyzw", false)).await.is_ok());
    }
}
