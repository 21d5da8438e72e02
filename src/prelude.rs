//! Prelude module for convenient imports.
//!
//! ```ignore
//! use parlance::prelude::*;
//! ```
//!
//! This will import:
//! - The controller and its events (ChatController, ChatEvent, SubmitOutcome)
//! - Model types (Message, MessageId, MessageRole)
//! - Configuration (ClientConfig)
//! - Errors (ChatError, ChatResult)
//! - The trait seams and their production adapters

// Controller
pub use crate::controller::{
    ChatController, ChatEvent, ControllerState, RejectReason, SubmitOutcome,
};

// Model types
pub use crate::models::{Chat, Message, MessageId, MessageMetadata, MessageRole};

// Configuration
pub use crate::config::{BatcherConfig, ClientConfig, TypingConfig, TypingMode};

// Errors
pub use crate::error::{ChatError, ChatResult};

// Seams
pub use crate::traits::{Clock, DocumentStore, HttpClient, IdentityProvider, Scheduler};

// Adapters
pub use crate::adapters::{
    InMemoryStore, ReqwestHttpClient, StaticIdentity, SystemClock, TokioScheduler,
};
