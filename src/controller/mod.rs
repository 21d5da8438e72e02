//! Reconciliation controller.
//!
//! Ties a submit to chat creation, durable placeholder rows, the inference
//! stream, the typing simulator and the persistence batcher, and keeps the
//! display list consistent with the remote live query.
//!
//! # Locking
//!
//! The typing simulator calls back into the controller while holding its own
//! lock, so the controller never calls the simulator while holding the view
//! lock. Neither lock is held across an await.

mod reconcile;
mod remote;
mod state;
mod turn;

pub use reconcile::{merge_display, prune_confirmed, prune_settled};
pub use state::{ChatEvent, ControllerState, RejectReason, SubmitOutcome, GENERATION_ERROR_MESSAGE};

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::adapters::{SystemClock, TokioScheduler};
use crate::batcher::PersistenceBatcher;
use crate::config::ClientConfig;
use crate::error::ChatResult;
use crate::inference::InferenceClient;
use crate::models::Message;
use crate::title::TitleGenerator;
use crate::traits::{Clock, DocumentStore, HttpClient, IdentityProvider, Scheduler};
use crate::typing::TypingSimulator;

use state::InFlight;

/// Everything the controller renders from.
#[derive(Default)]
struct ViewState {
    state: ControllerState,
    chat_id: Option<String>,
    /// Latest remote snapshot
    remote: Vec<Message>,
    /// Provisional user messages not yet in `remote`
    optimistic: Vec<Message>,
    in_flight: Option<InFlight>,
    /// Final local copies waiting for the remote row to report complete
    settled: Vec<Message>,
    subscription: Option<JoinHandle<()>>,
    subscription_epoch: u64,
}

impl ViewState {
    fn display(&self) -> Vec<Message> {
        let mut overlays = self.settled.clone();
        if let Some(in_flight) = &self.in_flight {
            overlays.push(in_flight.to_message());
        }
        merge_display(&self.remote, &self.optimistic, &overlays)
    }

    fn detach(&mut self) {
        self.subscription_epoch += 1;
        if let Some(handle) = self.subscription.take() {
            handle.abort();
        }
    }
}

struct Core {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    inference: InferenceClient,
    titles: TitleGenerator,
    config: ClientConfig,
    batcher: PersistenceBatcher,
    simulator: TypingSimulator,
    events: Option<UnboundedSender<ChatEvent>>,
    view: Mutex<ViewState>,
}

impl Core {
    fn lock_view(&self) -> MutexGuard<'_, ViewState> {
        self.view.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: ChatEvent) {
        if let Some(events) = &self.events {
            // A closed receiver just means nobody is watching.
            let _ = events.send(event);
        }
    }

    /// Send the current display (and state, if it changed). Called with the
    /// view lock held so events keep the order of the changes.
    fn publish(&self, view: &ViewState, state_changed: bool) {
        if self.events.is_none() {
            return;
        }
        if state_changed {
            self.emit(ChatEvent::StateChanged(view.state));
        }
        self.emit(ChatEvent::DisplayChanged(view.display()));
    }

    /// Apply `change` to the view and publish the result.
    fn update_view<R>(&self, change: impl FnOnce(&mut ViewState) -> R) -> R {
        let mut view = self.lock_view();
        let before = view.state;
        let result = change(&mut view);
        let state_changed = view.state != before;
        self.publish(&view, state_changed);
        result
    }

    /// Reveal-loop callback.
    fn on_reveal(&self, revealed: &str) {
        let mut view = self.lock_view();
        let Some(in_flight) = view.in_flight.as_mut() else {
            return;
        };
        if in_flight.revealed == revealed {
            return;
        }
        in_flight.revealed = revealed.to_string();
        self.publish(&view, false);
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        let view = self.view.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        view.detach();
    }
}

/// Controller for one conversation view. Cheap to clone.
#[derive(Clone)]
pub struct ChatController {
    core: Arc<Core>,
}

impl ChatController {
    pub fn builder(
        store: Arc<dyn DocumentStore>,
        http: Arc<dyn HttpClient>,
        identity: Arc<dyn IdentityProvider>,
    ) -> ChatControllerBuilder {
        ChatControllerBuilder {
            store,
            http,
            identity,
            config: ClientConfig::default(),
            scheduler: None,
            clock: None,
            events: None,
        }
    }

    /// Submit `input` as the next user message and run the generation to
    /// completion.
    ///
    /// Refused without any state change when the input is blank, nobody is
    /// signed in, or a generation is already in flight.
    pub async fn submit(&self, input: &str) -> SubmitOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SubmitOutcome::Rejected(RejectReason::EmptyInput);
        }
        let Some(user) = self.core.identity.current_user() else {
            tracing::debug!("submit refused: not signed in");
            return SubmitOutcome::Rejected(RejectReason::NotAuthenticated);
        };
        self.core.run_turn(text.to_string(), user).await
    }

    /// Switch the view to an existing conversation.
    ///
    /// Returns `false` (and changes nothing) while a generation is in flight.
    pub async fn open_chat(&self, chat_id: &str) -> ChatResult<bool> {
        let switched = self.core.update_view(|view| {
            if view.state.is_busy() {
                return false;
            }
            view.detach();
            view.chat_id = Some(chat_id.to_string());
            view.remote.clear();
            view.optimistic.clear();
            view.settled.clear();
            true
        });
        if !switched {
            return Ok(false);
        }
        self.core.attach_subscription(chat_id).await?;
        tracing::debug!(%chat_id, "opened chat");
        Ok(true)
    }

    /// Start a fresh conversation; the chat is created on the first submit.
    ///
    /// Returns `false` while a generation is in flight.
    pub fn new_chat(&self) -> bool {
        self.core.update_view(|view| {
            if view.state.is_busy() {
                return false;
            }
            view.detach();
            view.chat_id = None;
            view.remote.clear();
            view.optimistic.clear();
            view.settled.clear();
            true
        })
    }

    /// Merged list the user should see.
    pub fn display_messages(&self) -> Vec<Message> {
        self.core.lock_view().display()
    }

    pub fn state(&self) -> ControllerState {
        self.core.lock_view().state
    }

    pub fn chat_id(&self) -> Option<String> {
        self.core.lock_view().chat_id.clone()
    }

    /// Provider and model used for new generations.
    pub fn provider_and_model(&self) -> (String, String) {
        (
            self.core.config.provider.clone(),
            self.core.config.resolved_model(),
        )
    }
}

/// Builder for [`ChatController`].
pub struct ChatControllerBuilder {
    store: Arc<dyn DocumentStore>,
    http: Arc<dyn HttpClient>,
    identity: Arc<dyn IdentityProvider>,
    config: ClientConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
    clock: Option<Arc<dyn Clock>>,
    events: Option<UnboundedSender<ChatEvent>>,
}

impl ChatControllerBuilder {
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Timer source for the reveal loop and debounced writes.
    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Clock for message timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<ChatEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> ChatResult<ChatController> {
        let config = self.config.validate()?;
        let scheduler = self
            .scheduler
            .unwrap_or_else(|| Arc::new(TokioScheduler::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let inference = InferenceClient::new(
            self.http.clone(),
            config.chat_url(),
            config.stream_protocol,
        );
        let titles = TitleGenerator::new(self.http, config.title_url(), config.title_max_chars);
        let batcher =
            PersistenceBatcher::for_store(self.store.clone(), scheduler.clone(), config.batcher.clone());

        let core = Arc::new_cyclic(|weak: &Weak<Core>| {
            let weak = weak.clone();
            let simulator = TypingSimulator::new(config.typing.clone(), scheduler.clone(), move |revealed| {
                if let Some(core) = weak.upgrade() {
                    core.on_reveal(revealed);
                }
            });
            Core {
                store: self.store,
                identity: self.identity,
                clock,
                inference,
                titles,
                config,
                batcher,
                simulator,
                events: self.events,
                view: Mutex::new(ViewState::default()),
            }
        });
        Ok(ChatController { core })
    }
}
