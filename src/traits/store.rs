//! Document store contract: mutations plus a live per-chat message query.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::StoreError;
use crate::models::{Message, MessageMetadata, MessageRole};

/// Live query results. Each item is the full ordered message list of the chat.
///
/// Dropping the stream unsubscribes.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Vec<Message>> + Send>>;

/// Arguments of `createChat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateChatArgs {
    pub title: String,
    pub user_id: String,
    pub provider: String,
    pub model: String,
}

/// Arguments of `createMessage`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMessageArgs {
    pub chat_id: String,
    pub role: MessageRole,
    pub content: String,
    pub is_complete: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Echoed verbatim on the durable row.
    pub client_token: String,
    pub created_at: i64,
}

/// Arguments of `updateMessageContent`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateMessageArgs {
    pub message_id: String,
    pub content: String,
    /// `None` leaves the stored flag untouched.
    pub is_complete: Option<bool>,
    /// Merged into the stored metadata.
    pub metadata: Option<MessageMetadata>,
}

/// Remote reactive document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a conversation and return its durable id.
    async fn create_chat(&self, args: CreateChatArgs) -> Result<String, StoreError>;

    /// Create a message row and return its durable id.
    async fn create_message(&self, args: CreateMessageArgs) -> Result<String, StoreError>;

    async fn update_message_content(&self, args: UpdateMessageArgs) -> Result<(), StoreError>;

    async fn update_chat_title(&self, chat_id: &str, title: &str) -> Result<(), StoreError>;

    /// Subscribe to the ordered message list of `chat_id`.
    ///
    /// The current list is delivered first, then again after every change.
    async fn subscribe_messages(&self, chat_id: &str) -> Result<SnapshotStream, StoreError>;
}
