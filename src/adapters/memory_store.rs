//! In-process [`DocumentStore`] with live queries over `tokio::sync::watch`.
//!
//! Backs the CLI and the tests. Failures can be injected per operation and
//! every mutation is recorded in order.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::models::{Chat, Message, MessageId, MessageMetadata};
use crate::traits::{
    Clock, CreateChatArgs, CreateMessageArgs, DocumentStore, SnapshotStream, UpdateMessageArgs,
};

use super::SystemClock;

/// Store operation, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateChat,
    CreateMessage,
    UpdateMessageContent,
    UpdateChatTitle,
    Subscribe,
}

/// A mutation as the store received it.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    CreateChat(CreateChatArgs),
    CreateMessage(CreateMessageArgs),
    UpdateMessageContent(UpdateMessageArgs),
    UpdateChatTitle { chat_id: String, title: String },
}

#[derive(Default)]
struct StoreState {
    next_id: u64,
    chats: HashMap<String, Chat>,
    messages: HashMap<String, Vec<Message>>,
    /// message id -> chat id
    owners: HashMap<String, String>,
    channels: HashMap<String, watch::Sender<Vec<Message>>>,
    fail_next: HashMap<StoreOp, VecDeque<StoreError>>,
    fail_always: HashMap<StoreOp, StoreError>,
    mutations: Vec<Mutation>,
    /// Chats whose subscribers are not notified of changes.
    frozen: Vec<String>,
}

impl StoreState {
    fn take_failure(&mut self, op: StoreOp) -> Result<(), StoreError> {
        if let Some(err) = self.fail_next.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(err);
        }
        match self.fail_always.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_{}", prefix, self.next_id)
    }

    fn channel(&mut self, chat_id: &str) -> &watch::Sender<Vec<Message>> {
        let current = self.messages.get(chat_id).cloned().unwrap_or_default();
        self.channels
            .entry(chat_id.to_string())
            .or_insert_with(|| watch::channel(current).0)
    }

    fn publish(&mut self, chat_id: &str) {
        if self.frozen.iter().any(|c| c == chat_id) {
            return;
        }
        let snapshot = self.messages.get(chat_id).cloned().unwrap_or_default();
        if let Some(tx) = self.channels.get(chat_id) {
            tx.send_replace(snapshot);
        }
    }
}

/// Reactive in-memory document store.
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Use `clock` for `updatedAt` stamps.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next call of `op` with `err`. Queued failures are used in order.
    pub fn fail_next(&self, op: StoreOp, err: StoreError) {
        self.lock().fail_next.entry(op).or_default().push_back(err);
    }

    /// Fail every call of `op` with `err` until [`clear_failures`](Self::clear_failures).
    pub fn fail_always(&self, op: StoreOp, err: StoreError) {
        self.lock().fail_always.insert(op, err);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.fail_next.clear();
        state.fail_always.clear();
    }

    /// Stop notifying subscribers of `chat_id`, simulating a lagging replica.
    pub fn freeze(&self, chat_id: &str) {
        self.lock().frozen.push(chat_id.to_string());
    }

    /// Resume notifications for `chat_id` and publish the current list.
    pub fn thaw(&self, chat_id: &str) {
        let mut state = self.lock();
        state.frozen.retain(|c| c != chat_id);
        state.publish(chat_id);
    }

    /// Push an arbitrary snapshot to subscribers of `chat_id` without
    /// touching stored data.
    pub fn inject_snapshot(&self, chat_id: &str, messages: Vec<Message>) {
        let mut state = self.lock();
        state.channel(chat_id).send_replace(messages);
    }

    /// Seed a chat directly, bypassing mutation recording.
    pub fn insert_chat(&self, chat: Chat) {
        let mut state = self.lock();
        state.messages.entry(chat.id.clone()).or_default();
        state.chats.insert(chat.id.clone(), chat);
    }

    /// Seed a durable message directly, bypassing mutation recording.
    pub fn insert_message(&self, chat_id: &str, message: Message) {
        let mut state = self.lock();
        state
            .owners
            .insert(message.id.as_str().to_string(), chat_id.to_string());
        let list = state.messages.entry(chat_id.to_string()).or_default();
        list.push(message);
        list.sort_by_key(|m| m.created_at);
        state.publish(chat_id);
    }

    pub fn chat(&self, chat_id: &str) -> Option<Chat> {
        self.lock().chats.get(chat_id).cloned()
    }

    pub fn chats(&self) -> Vec<Chat> {
        let mut chats: Vec<Chat> = self.lock().chats.values().cloned().collect();
        chats.sort_by_key(|c| c.created_at);
        chats
    }

    pub fn messages(&self, chat_id: &str) -> Vec<Message> {
        self.lock().messages.get(chat_id).cloned().unwrap_or_default()
    }

    pub fn message(&self, message_id: &str) -> Option<Message> {
        let state = self.lock();
        let chat_id = state.owners.get(message_id)?;
        state
            .messages
            .get(chat_id)?
            .iter()
            .find(|m| m.id.as_str() == message_id)
            .cloned()
    }

    /// Every mutation received so far, oldest first.
    pub fn mutations(&self) -> Vec<Mutation> {
        self.lock().mutations.clone()
    }

    /// Content of every `updateMessageContent` call, oldest first.
    pub fn content_writes(&self) -> Vec<String> {
        self.lock()
            .mutations
            .iter()
            .filter_map(|m| match m {
                Mutation::UpdateMessageContent(args) => Some(args.content.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn create_chat(&self, args: CreateChatArgs) -> Result<String, StoreError> {
        let now = self.clock.now_millis();
        let mut state = self.lock();
        state.mutations.push(Mutation::CreateChat(args.clone()));
        state.take_failure(StoreOp::CreateChat)?;

        let id = state.allocate_id("chat");
        state.chats.insert(
            id.clone(),
            Chat {
                id: id.clone(),
                title: args.title,
                user_id: args.user_id,
                provider: args.provider,
                model: Some(args.model),
                created_at: now,
                updated_at: now,
                is_archived: false,
                is_pinned: false,
            },
        );
        state.messages.insert(id.clone(), Vec::new());
        tracing::debug!(chat_id = %id, "chat created");
        Ok(id)
    }

    async fn create_message(&self, args: CreateMessageArgs) -> Result<String, StoreError> {
        let mut state = self.lock();
        state.mutations.push(Mutation::CreateMessage(args.clone()));
        state.take_failure(StoreOp::CreateMessage)?;

        let Some(chat) = state.chats.get_mut(&args.chat_id) else {
            return Err(StoreError::NotFound {
                kind: "chat",
                id: args.chat_id,
            });
        };
        chat.updated_at = args.created_at;

        let id = state.allocate_id("msg");
        let message = Message {
            id: MessageId::Durable(id.clone()),
            chat_id: Some(args.chat_id.clone()),
            role: args.role,
            content: args.content,
            is_complete: args.is_complete,
            created_at: args.created_at,
            updated_at: args.created_at,
            provider: args.provider,
            model: args.model,
            metadata: None,
            client_token: Some(args.client_token),
        };
        state.owners.insert(id.clone(), args.chat_id.clone());
        let list = state.messages.entry(args.chat_id.clone()).or_default();
        // Stable: later inserts with an equal timestamp stay after earlier ones.
        let position = list.partition_point(|m| m.created_at <= message.created_at);
        list.insert(position, message);
        state.publish(&args.chat_id);
        Ok(id)
    }

    async fn update_message_content(&self, args: UpdateMessageArgs) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut state = self.lock();
        state.mutations.push(Mutation::UpdateMessageContent(args.clone()));
        state.take_failure(StoreOp::UpdateMessageContent)?;

        let not_found = || StoreError::NotFound {
            kind: "message",
            id: args.message_id.clone(),
        };
        let chat_id = state.owners.get(&args.message_id).cloned().ok_or_else(not_found)?;
        let message = state
            .messages
            .get_mut(&chat_id)
            .and_then(|list| list.iter_mut().find(|m| m.id.as_str() == args.message_id))
            .ok_or_else(not_found)?;

        message.content = args.content.clone();
        message.updated_at = now;
        if let Some(is_complete) = args.is_complete {
            message.is_complete = is_complete;
        }
        if let Some(metadata) = &args.metadata {
            message
                .metadata
                .get_or_insert_with(MessageMetadata::default)
                .merge(metadata);
        }
        state.publish(&chat_id);
        Ok(())
    }

    async fn update_chat_title(&self, chat_id: &str, title: &str) -> Result<(), StoreError> {
        let now = self.clock.now_millis();
        let mut state = self.lock();
        state.mutations.push(Mutation::UpdateChatTitle {
            chat_id: chat_id.to_string(),
            title: title.to_string(),
        });
        state.take_failure(StoreOp::UpdateChatTitle)?;

        let chat = state.chats.get_mut(chat_id).ok_or_else(|| StoreError::NotFound {
            kind: "chat",
            id: chat_id.to_string(),
        })?;
        chat.title = title.to_string();
        chat.updated_at = now;
        Ok(())
    }

    async fn subscribe_messages(&self, chat_id: &str) -> Result<SnapshotStream, StoreError> {
        let mut state = self.lock();
        state.take_failure(StoreOp::Subscribe)?;
        if !state.chats.contains_key(chat_id) {
            return Err(StoreError::NotFound {
                kind: "chat",
                id: chat_id.to_string(),
            });
        }

        let mut rx = state.channel(chat_id).subscribe();
        rx.mark_changed();
        let snapshots = stream::unfold(rx, |mut rx| async move {
            rx.changed().await.ok()?;
            let snapshot = rx.borrow_and_update().clone();
            Some((snapshot, rx))
        });
        Ok(Box::pin(snapshots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::ManualClock;
    use crate::models::MessageRole;
    use futures_util::StreamExt;

    fn store() -> InMemoryStore {
        InMemoryStore::with_clock(Arc::new(ManualClock::at(10_000)))
    }

    fn chat_args() -> CreateChatArgs {
        CreateChatArgs {
            title: "Hello".to_string(),
            user_id: "u1".to_string(),
            provider: "google".to_string(),
            model: "gemini-1.5-flash".to_string(),
        }
    }

    fn message_args(chat_id: &str, role: MessageRole, created_at: i64, token: &str) -> CreateMessageArgs {
        CreateMessageArgs {
            chat_id: chat_id.to_string(),
            role,
            content: String::new(),
            is_complete: false,
            provider: None,
            model: None,
            client_token: token.to_string(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_create_message_echoes_token_and_orders_by_created_at() {
        let store = store();
        let chat_id = store.create_chat(chat_args()).await.unwrap();
        store
            .create_message(message_args(&chat_id, MessageRole::Assistant, 200, "b"))
            .await
            .unwrap();
        store
            .create_message(message_args(&chat_id, MessageRole::User, 100, "a"))
            .await
            .unwrap();

        let messages = store.messages(&chat_id);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].client_token.as_deref(), Some("a"));
        assert_eq!(messages[1].client_token.as_deref(), Some("b"));
        assert!(!messages[0].id.is_local());
    }

    #[tokio::test]
    async fn test_create_message_in_unknown_chat_fails() {
        let store = store();
        let result = store
            .create_message(message_args("nope", MessageRole::User, 1, "t"))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { kind: "chat", .. })));
    }

    #[tokio::test]
    async fn test_update_merges_metadata() {
        let store = store();
        let chat_id = store.create_chat(chat_args()).await.unwrap();
        let id = store
            .create_message(message_args(&chat_id, MessageRole::Assistant, 1, "t"))
            .await
            .unwrap();

        store
            .update_message_content(UpdateMessageArgs {
                message_id: id.clone(),
                content: "partial".to_string(),
                is_complete: None,
                metadata: Some(MessageMetadata::with_reasoning("hmm")),
            })
            .await
            .unwrap();
        store
            .update_message_content(UpdateMessageArgs {
                message_id: id.clone(),
                content: "done".to_string(),
                is_complete: Some(true),
                metadata: Some(MessageMetadata {
                    finish_reason: Some("stop".to_string()),
                    ..Default::default()
                }),
            })
            .await
            .unwrap();

        let message = store.message(&id).unwrap();
        assert_eq!(message.content, "done");
        assert!(message.is_complete);
        assert_eq!(message.updated_at, 10_000);
        assert_eq!(message.reasoning(), Some("hmm"));
        assert_eq!(
            message.metadata.unwrap().finish_reason.as_deref(),
            Some("stop")
        );
        assert_eq!(store.content_writes(), vec!["partial", "done"]);
    }

    #[tokio::test]
    async fn test_fail_next_is_consumed_once() {
        let store = store();
        store.fail_next(
            StoreOp::CreateChat,
            StoreError::Unavailable {
                message: "offline".to_string(),
            },
        );
        assert!(store.create_chat(chat_args()).await.is_err());
        assert!(store.create_chat(chat_args()).await.is_ok());
        assert_eq!(store.mutations().len(), 2);
    }

    #[tokio::test]
    async fn test_subscription_delivers_current_then_changes() {
        let store = store();
        let chat_id = store.create_chat(chat_args()).await.unwrap();
        let mut snapshots = store.subscribe_messages(&chat_id).await.unwrap();

        assert!(snapshots.next().await.unwrap().is_empty());

        store
            .create_message(message_args(&chat_id, MessageRole::User, 1, "t"))
            .await
            .unwrap();
        assert_eq!(snapshots.next().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_frozen_chat_withholds_snapshots() {
        let store = store();
        let chat_id = store.create_chat(chat_args()).await.unwrap();
        let mut snapshots = store.subscribe_messages(&chat_id).await.unwrap();
        assert!(snapshots.next().await.unwrap().is_empty());

        store.freeze(&chat_id);
        store
            .create_message(message_args(&chat_id, MessageRole::User, 1, "t"))
            .await
            .unwrap();
        store.thaw(&chat_id);

        assert_eq!(snapshots.next().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_chat_title() {
        let store = store();
        let chat_id = store.create_chat(chat_args()).await.unwrap();
        store.update_chat_title(&chat_id, "Greetings").await.unwrap();
        assert_eq!(store.chat(&chat_id).unwrap().title, "Greetings");
        assert!(store.update_chat_title("missing", "x").await.is_err());
    }
}
