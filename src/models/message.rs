use std::fmt;

use serde::{Deserialize, Serialize};

/// Content shown for an assistant message before its first token arrives.
pub const ASSISTANT_PLACEHOLDER: &str = "...";

/// Identity of a message: provisional (client-only) or assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MessageId {
    /// Generated locally at submit time; never sent to the store as an id.
    Local(String),
    /// Assigned by the document store when the create mutation resolved.
    Durable(String),
}

impl MessageId {
    pub fn is_local(&self) -> bool {
        matches!(self, MessageId::Local(_))
    }

    /// The durable id, if the store has assigned one.
    pub fn durable(&self) -> Option<&str> {
        match self {
            MessageId::Durable(id) => Some(id),
            MessageId::Local(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageId::Local(id) | MessageId::Durable(id) => id,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Local(id) => write!(f, "local:{}", id),
            MessageId::Durable(id) => write!(f, "{}", id),
        }
    }
}

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    /// Ordering among messages sharing a `created_at` timestamp.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            MessageRole::System => 0,
            MessageRole::User => 1,
            MessageRole::Assistant => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

/// Secondary data attached to a message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u32>,
}

impl MessageMetadata {
    pub fn with_reasoning(reasoning: impl Into<String>) -> Self {
        Self {
            reasoning: Some(reasoning.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Overlay the fields set in `other` onto `self`.
    pub fn merge(&mut self, other: &MessageMetadata) {
        if other.reasoning.is_some() {
            self.reasoning = other.reasoning.clone();
        }
        if other.finish_reason.is_some() {
            self.finish_reason = other.finish_reason.clone();
        }
        if other.processing_time_ms.is_some() {
            self.processing_time_ms = other.processing_time_ms;
        }
        if other.token_count.is_some() {
            self.token_count = other.token_count;
        }
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    /// Owning chat; `None` for provisional messages of a chat not created yet.
    #[serde(default)]
    pub chat_id: Option<String>,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub is_complete: bool,
    /// Milliseconds since the epoch.
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
    /// Token supplied by the client at creation and echoed verbatim by the store.
    #[serde(default)]
    pub client_token: Option<String>,
}

impl Message {
    /// Optimistic user message shown before the store confirms it.
    pub fn provisional_user(token: &str, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: MessageId::Local(token.to_string()),
            chat_id: None,
            role: MessageRole::User,
            content: content.into(),
            is_complete: true,
            created_at: timestamp,
            updated_at: timestamp,
            provider: None,
            model: None,
            metadata: None,
            client_token: Some(token.to_string()),
        }
    }

    /// Optimistic assistant placeholder for a generation that has not started streaming.
    pub fn provisional_assistant(
        token: &str,
        timestamp: i64,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::Local(token.to_string()),
            chat_id: None,
            role: MessageRole::Assistant,
            content: ASSISTANT_PLACEHOLDER.to_string(),
            is_complete: false,
            created_at: timestamp,
            updated_at: timestamp,
            provider: Some(provider.into()),
            model: Some(model.into()),
            metadata: None,
            client_token: Some(token.to_string()),
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.id.is_local()
    }

    pub fn durable_id(&self) -> Option<&str> {
        self.id.durable()
    }

    pub fn reasoning(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.reasoning.as_deref())
    }

    /// Whether `self` and `other` are the same logical message.
    ///
    /// Matches on durable id, then on the echoed client token. Rows without a
    /// token on either side fall back to `(created_at, role)` equality.
    pub fn same_logical(&self, other: &Message) -> bool {
        if let (Some(a), Some(b)) = (self.durable_id(), other.durable_id()) {
            if a == b {
                return true;
            }
        }
        match (&self.client_token, &other.client_token) {
            (Some(a), Some(b)) => a == b,
            _ => self.created_at == other.created_at && self.role == other.role,
        }
    }
}
