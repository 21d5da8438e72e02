//! Common test utilities for integration tests.
//!
//! Builds a [`ChatController`] wired to an [`InMemoryStore`], a
//! [`MockHttpClient`], a [`ManualScheduler`] and a [`ManualClock`], and
//! provides helpers for writing data-stream bodies.
//!
//! # Example
//!
//! ```ignore
//! let h = Harness::new();
//! h.http.set_stream(CHAT_URL, &[&text_part("Hi")]);
//! h.controller.submit("Hello").await;
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use tokio::sync::mpsc;

use parlance::adapters::mock::{ManualClock, ManualScheduler, MockHttpClient};
use parlance::adapters::{InMemoryStore, StaticIdentity};
use parlance::config::ClientConfig;
use parlance::controller::{ChatController, ChatEvent};
use parlance::models::{Chat, Message, MessageId, MessageRole};

pub const CHAT_URL: &str = "http://localhost:8081/api/chat";
pub const TITLE_URL: &str = "http://localhost:8081/api/gettitle";
pub const USER_ID: &str = "user-1";
/// Wall-clock start of every harness clock.
pub const START_MS: i64 = 1_700_000_000_000;

/// A controller and handles on all of its collaborators.
pub struct Harness {
    pub controller: ChatController,
    pub store: InMemoryStore,
    pub http: MockHttpClient,
    pub scheduler: ManualScheduler,
    pub clock: ManualClock,
    pub events: mpsc::UnboundedReceiver<ChatEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(ClientConfig::default(), StaticIdentity::signed_in(USER_ID))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::build(config, StaticIdentity::signed_in(USER_ID))
    }

    pub fn signed_out() -> Self {
        Self::build(ClientConfig::default(), StaticIdentity::signed_out())
    }

    fn build(config: ClientConfig, identity: StaticIdentity) -> Self {
        let clock = ManualClock::at(START_MS);
        let store = InMemoryStore::with_clock(Arc::new(clock.clone()));
        let http = MockHttpClient::new();
        let scheduler = ManualScheduler::new();
        let (tx, events) = mpsc::unbounded_channel();

        let controller = ChatController::builder(
            Arc::new(store.clone()),
            Arc::new(http.clone()),
            Arc::new(identity),
        )
        .with_config(config)
        .with_scheduler(Arc::new(scheduler.clone()))
        .with_clock(Arc::new(clock.clone()))
        .with_events(tx)
        .build()
        .expect("valid test config");

        Self {
            controller,
            store,
            http,
            scheduler,
            clock,
            events,
        }
    }

    /// Every event received so far.
    pub fn drain_events(&mut self) -> Vec<ChatEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Seed `chat_id` with one completed exchange and return its messages.
    pub fn seed_chat(&self, chat_id: &str) -> Vec<Message> {
        self.store.insert_chat(Chat {
            id: chat_id.to_string(),
            title: "Earlier".to_string(),
            user_id: USER_ID.to_string(),
            provider: "google".to_string(),
            model: None,
            created_at: START_MS - 10_000,
            updated_at: START_MS - 10_000,
            is_archived: false,
            is_pinned: false,
        });
        let question = durable_message("seed_q", chat_id, MessageRole::User, "Ping?", START_MS - 9_000);
        let answer = durable_message("seed_a", chat_id, MessageRole::Assistant, "Pong.", START_MS - 9_000);
        self.store.insert_message(chat_id, question.clone());
        self.store.insert_message(chat_id, answer.clone());
        vec![question, answer]
    }
}

pub fn durable_message(id: &str, chat_id: &str, role: MessageRole, content: &str, created_at: i64) -> Message {
    Message {
        id: MessageId::Durable(id.to_string()),
        chat_id: Some(chat_id.to_string()),
        role,
        content: content.to_string(),
        is_complete: true,
        created_at,
        updated_at: created_at,
        provider: None,
        model: None,
        metadata: None,
        client_token: None,
    }
}

/// `0:` text part line.
pub fn text_part(text: &str) -> String {
    format!("0:{}\n", serde_json::Value::String(text.to_string()))
}

/// `g:` reasoning part line.
pub fn reasoning_part(text: &str) -> String {
    format!("g:{}\n", serde_json::Value::String(text.to_string()))
}

/// `3:` error part line.
pub fn error_part(message: &str) -> String {
    format!("3:{}\n", serde_json::Value::String(message.to_string()))
}

/// `d:` finish part line.
pub fn finish_part(reason: &str) -> String {
    format!("d:{{\"finishReason\":\"{}\"}}\n", reason)
}

/// Let spawned tasks (subscription forwarders, title updates) run.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Yield until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
