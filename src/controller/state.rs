//! Controller state machine types and observable events.

use std::fmt;

use crate::error::ChatError;
use crate::models::{Message, MessageId, MessageMetadata, MessageRole, ASSISTANT_PLACEHOLDER};

/// Content of an assistant message whose generation failed.
pub const GENERATION_ERROR_MESSAGE: &str =
    "Sorry, something went wrong while generating a response. Please try again.";

/// Lifecycle of one generation in the current conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// Nothing in flight; the display is the remote list.
    #[default]
    Idle,
    /// Provisional messages shown; chat and placeholder rows being created.
    Submitting,
    /// Durable assistant row known; stream parts being forwarded.
    Streaming,
    /// Stream ended; final content being written.
    Finalizing,
}

impl ControllerState {
    /// Whether a generation holds the conversation.
    pub fn is_busy(&self) -> bool {
        !matches!(self, ControllerState::Idle)
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ControllerState::Idle => "idle",
            ControllerState::Submitting => "submitting",
            ControllerState::Streaming => "streaming",
            ControllerState::Finalizing => "finalizing",
        };
        f.write_str(label)
    }
}

/// Notifications for UI layers.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    StateChanged(ControllerState),
    /// The merged display list changed.
    DisplayChanged(Vec<Message>),
    ChatCreated { chat_id: String },
    TitleUpdated { chat_id: String, title: String },
}

/// Why a submit was refused without any state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyInput,
    NotAuthenticated,
    GenerationInProgress,
}

/// Result of [`ChatController::submit`](super::ChatController::submit).
#[derive(Debug)]
pub enum SubmitOutcome {
    Rejected(RejectReason),
    /// The assistant message was written complete.
    Completed { message_id: String },
    /// The turn ended early. Stream failures leave an error message in the
    /// transcript; create failures leave no trace.
    Failed(ChatError),
}

impl SubmitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SubmitOutcome::Completed { .. })
    }
}

/// Bookkeeping for the assistant message currently being generated.
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    pub token: String,
    pub durable_id: Option<String>,
    pub chat_id: Option<String>,
    /// Prefix shown by the typing simulator
    pub revealed: String,
    pub reasoning: Option<String>,
    pub created_at: i64,
    pub provider: String,
    pub model: String,
}

impl InFlight {
    pub fn new(token: String, created_at: i64, provider: String, model: String) -> Self {
        Self {
            token,
            durable_id: None,
            chat_id: None,
            revealed: String::new(),
            reasoning: None,
            created_at,
            provider,
            model,
        }
    }

    fn id(&self) -> MessageId {
        match &self.durable_id {
            Some(id) => MessageId::Durable(id.clone()),
            None => MessageId::Local(self.token.clone()),
        }
    }

    /// The message as currently displayed.
    pub fn to_message(&self) -> Message {
        let content = if self.revealed.is_empty() {
            ASSISTANT_PLACEHOLDER.to_string()
        } else {
            self.revealed.clone()
        };
        self.with_content(content, false, self.reasoning.clone().map(MessageMetadata::with_reasoning))
    }

    /// The message with its final content.
    pub fn finalized(&self, content: String, metadata: Option<MessageMetadata>) -> Message {
        self.with_content(content, true, metadata)
    }

    fn with_content(
        &self,
        content: String,
        is_complete: bool,
        metadata: Option<MessageMetadata>,
    ) -> Message {
        Message {
            id: self.id(),
            chat_id: self.chat_id.clone(),
            role: MessageRole::Assistant,
            content,
            is_complete,
            created_at: self.created_at,
            updated_at: self.created_at,
            provider: Some(self.provider.clone()),
            model: Some(self.model.clone()),
            metadata,
            client_token: Some(self.token.clone()),
        }
    }
}
