//! Remote live-query wiring.

use std::sync::Arc;

use futures_util::StreamExt;

use super::reconcile::{prune_confirmed, prune_settled};
use super::Core;
use crate::error::StoreError;
use crate::models::Message;

impl Core {
    /// Subscribe to `chat_id` and forward its snapshots into the view,
    /// replacing any earlier subscription.
    pub(super) async fn attach_subscription(self: &Arc<Self>, chat_id: &str) -> Result<(), StoreError> {
        let mut snapshots = self.store.subscribe_messages(chat_id).await?;
        let core = Arc::downgrade(self);
        let chat = chat_id.to_string();

        let mut view = self.lock_view();
        view.detach();
        let epoch = view.subscription_epoch;
        view.subscription = Some(tokio::spawn(async move {
            while let Some(snapshot) = snapshots.next().await {
                let Some(core) = core.upgrade() else {
                    break;
                };
                if !core.apply_snapshot(epoch, snapshot) {
                    break;
                }
            }
            tracing::debug!(chat_id = %chat, "message subscription ended");
        }));
        Ok(())
    }

    /// Returns `false` once the subscription has been replaced.
    fn apply_snapshot(&self, epoch: u64, snapshot: Vec<Message>) -> bool {
        let mut view = self.lock_view();
        if view.subscription_epoch != epoch {
            return false;
        }
        tracing::trace!(messages = snapshot.len(), "remote snapshot");

        let view = &mut *view;
        view.remote = snapshot;
        prune_confirmed(&mut view.optimistic, &view.remote);
        prune_settled(&mut view.settled, &view.remote);
        self.publish(view, false);
        true
    }
}
