//! One submit: provisional rows, durable rows, stream, finalization.

use std::sync::Arc;

use futures_util::StreamExt;
use uuid::Uuid;

use super::state::{ControllerState, InFlight, RejectReason, SubmitOutcome, GENERATION_ERROR_MESSAGE};
use super::Core;
use crate::batcher::MessageUpdate;
use crate::error::{ChatError, LogErrorExt, StoreError, StreamError};
use crate::models::{provider, ChatRequest, Message, MessageMetadata, MessageRole, RequestMessage};
use crate::stream::{ExtractedContent, ReasoningExtractor, StreamPart};
use crate::traits::{CreateChatArgs, CreateMessageArgs, UserIdentity};

use super::ChatEvent;

/// Values fixed when the turn starts.
struct Turn {
    text: String,
    chat_id: Option<String>,
    history: Vec<RequestMessage>,
    created_at: i64,
    user_token: String,
    assistant_token: String,
    provider: String,
    model: String,
}

impl Core {
    pub(super) async fn run_turn(self: &Arc<Self>, text: String, user: UserIdentity) -> SubmitOutcome {
        let Some(turn) = self.begin_turn(text) else {
            tracing::debug!("submit refused: generation in progress");
            return SubmitOutcome::Rejected(RejectReason::GenerationInProgress);
        };

        let chat_id = match turn.chat_id.clone() {
            Some(chat_id) => chat_id,
            None => match self.create_chat(&turn, &user).await {
                Ok(chat_id) => chat_id,
                Err(err) => return self.abort_submission(err.into()),
            },
        };

        let capability = provider::capability(&turn.provider, &turn.model);
        let request = ChatRequest::new(turn.history.clone(), &turn.provider, &turn.model)
            .with_reasoning(capability.supports_reasoning);

        let (placeholders, opened) = tokio::join!(
            self.create_placeholders(&chat_id, &turn),
            self.inference.open_stream(&request)
        );
        let message_id = match placeholders {
            Ok(message_id) => message_id,
            Err(err) => return self.abort_submission(err.into()),
        };

        self.batcher.reset();
        self.simulator.stop();
        self.update_view(|view| {
            if let Some(in_flight) = view.in_flight.as_mut() {
                in_flight.durable_id = Some(message_id.clone());
                in_flight.chat_id = Some(chat_id.clone());
            }
            view.state = ControllerState::Streaming;
        });
        tracing::debug!(%chat_id, %message_id, "streaming started");

        let mut parts = match opened {
            Ok(parts) => parts,
            Err(err) => return self.fail_generation(&message_id, err.into()).await,
        };

        let extractor = ReasoningExtractor::for_capability(&capability);
        let mut raw = String::new();
        let mut structured = String::new();
        let mut finish_reason = None;
        let mut shown = ExtractedContent::default();

        while let Some(part) = parts.next().await {
            match part {
                Ok(StreamPart::Text(delta)) => raw.push_str(&delta),
                Ok(StreamPart::Reasoning(delta)) => structured.push_str(&delta),
                Ok(StreamPart::Finish { reason }) => {
                    finish_reason = reason;
                    continue;
                }
                Ok(StreamPart::Error(message)) => {
                    let err = StreamError::Provider { message };
                    return self.fail_generation(&message_id, err.into()).await;
                }
                Err(err) => return self.fail_generation(&message_id, err.into()).await,
            }

            let extracted = extractor.extract(&raw, &structured);
            if extracted == shown || (extracted.content.is_empty() && extracted.reasoning.is_none()) {
                continue;
            }
            shown = extracted;
            self.forward(&message_id, &shown).await;
        }

        let extracted = extractor.extract_final(&raw, &structured);
        let metadata = MessageMetadata {
            reasoning: extracted.reasoning,
            finish_reason,
            processing_time_ms: Some(self.clock.now_millis() - turn.created_at),
            token_count: None,
        };
        self.finalize(&message_id, extracted.content, Some(metadata)).await
    }

    /// Claim the conversation and show the provisional rows.
    fn begin_turn(&self, text: String) -> Option<Turn> {
        self.update_view(|view| {
            if view.state.is_busy() {
                return None;
            }

            let mut history: Vec<RequestMessage> = view
                .display()
                .iter()
                .filter(|m| {
                    m.is_complete && !m.content.is_empty() && m.content != GENERATION_ERROR_MESSAGE
                })
                .map(RequestMessage::from)
                .collect();
            history.push(RequestMessage::new(MessageRole::User, text.clone()));

            let turn = Turn {
                chat_id: view.chat_id.clone(),
                history,
                created_at: self.clock.now_millis(),
                user_token: Uuid::new_v4().to_string(),
                assistant_token: Uuid::new_v4().to_string(),
                provider: self.config.provider.clone(),
                model: self.config.resolved_model(),
                text,
            };

            let mut user_message = Message::provisional_user(&turn.user_token, turn.text.clone(), turn.created_at);
            user_message.chat_id = turn.chat_id.clone();
            view.optimistic.push(user_message);

            let mut in_flight = InFlight::new(
                turn.assistant_token.clone(),
                turn.created_at,
                turn.provider.clone(),
                turn.model.clone(),
            );
            in_flight.chat_id = turn.chat_id.clone();
            view.in_flight = Some(in_flight);
            view.state = ControllerState::Submitting;
            Some(turn)
        })
    }

    async fn create_chat(self: &Arc<Self>, turn: &Turn, user: &UserIdentity) -> Result<String, StoreError> {
        let chat_id = self
            .store
            .create_chat(CreateChatArgs {
                title: self.titles.fallback(&turn.text),
                user_id: user.user_id.clone(),
                provider: turn.provider.clone(),
                model: turn.model.clone(),
            })
            .await?;
        tracing::info!(%chat_id, user_id = %user.user_id, "chat created");

        self.update_view(|view| {
            view.chat_id = Some(chat_id.clone());
            for message in view.optimistic.iter_mut() {
                message.chat_id = Some(chat_id.clone());
            }
            if let Some(in_flight) = view.in_flight.as_mut() {
                in_flight.chat_id = Some(chat_id.clone());
            }
        });
        self.emit(ChatEvent::ChatCreated {
            chat_id: chat_id.clone(),
        });

        self.attach_subscription(&chat_id)
            .await
            .log_warn("subscribe_messages");
        self.spawn_title(chat_id.clone(), turn);
        Ok(chat_id)
    }

    /// Replace the truncated title with a generated one, off the main flow.
    fn spawn_title(&self, chat_id: String, turn: &Turn) {
        let store = self.store.clone();
        let titles = self.titles.clone();
        let events = self.events.clone();
        let text = turn.text.clone();
        let provider = turn.provider.clone();
        let model = turn.model.clone();

        tokio::spawn(async move {
            let title = titles.generate(&text, &provider, &model).await;
            if title == titles.fallback(&text) {
                return;
            }
            if store
                .update_chat_title(&chat_id, &title)
                .await
                .log_warn("update_chat_title")
                .is_none()
            {
                return;
            }
            tracing::debug!(%chat_id, %title, "chat title updated");
            if let Some(events) = events {
                let _ = events.send(ChatEvent::TitleUpdated { chat_id, title });
            }
        });
    }

    /// Durable user row, then the empty assistant row. Returns the assistant id.
    async fn create_placeholders(&self, chat_id: &str, turn: &Turn) -> Result<String, StoreError> {
        self.store
            .create_message(CreateMessageArgs {
                chat_id: chat_id.to_string(),
                role: MessageRole::User,
                content: turn.text.clone(),
                is_complete: true,
                provider: None,
                model: None,
                client_token: turn.user_token.clone(),
                created_at: turn.created_at,
            })
            .await?;

        self.store
            .create_message(CreateMessageArgs {
                chat_id: chat_id.to_string(),
                role: MessageRole::Assistant,
                content: String::new(),
                is_complete: false,
                provider: Some(turn.provider.clone()),
                model: Some(turn.model.clone()),
                client_token: turn.assistant_token.clone(),
                created_at: turn.created_at,
            })
            .await
    }

    /// Hand the latest extracted content to the reveal loop and the batcher.
    async fn forward(&self, message_id: &str, shown: &ExtractedContent) {
        self.update_view(|view| {
            if let Some(in_flight) = view.in_flight.as_mut() {
                in_flight.reasoning = shown.reasoning.clone();
            }
        });
        self.simulator.update_content(&shown.content);

        self.batcher
            .update_message(MessageUpdate {
                message_id: message_id.to_string(),
                content: shown.content.clone(),
                metadata: shown.reasoning.clone().map(MessageMetadata::with_reasoning),
                is_complete: false,
            })
            .await
            .log_warn("update_message_content");
    }

    /// Write the final content and return to idle.
    async fn finalize(
        &self,
        message_id: &str,
        content: String,
        metadata: Option<MessageMetadata>,
    ) -> SubmitOutcome {
        self.simulator.stop();
        self.update_view(|view| {
            view.state = ControllerState::Finalizing;
            if let Some(in_flight) = view.in_flight.take() {
                view.settled.push(in_flight.finalized(content.clone(), metadata.clone()));
            }
        });

        let written = self
            .batcher
            .update_message(MessageUpdate {
                message_id: message_id.to_string(),
                content,
                metadata,
                is_complete: true,
            })
            .await;
        self.batcher.reset();
        self.update_view(|view| view.state = ControllerState::Idle);

        match written {
            Ok(()) => {
                tracing::debug!(%message_id, "generation complete");
                SubmitOutcome::Completed {
                    message_id: message_id.to_string(),
                }
            }
            Err(err) => {
                tracing::error!(%message_id, error = %err, "final content write failed");
                SubmitOutcome::Failed(err.into())
            }
        }
    }

    /// Finalize the assistant row with the error text.
    async fn fail_generation(&self, message_id: &str, err: ChatError) -> SubmitOutcome {
        tracing::error!(
            %message_id,
            error_code = err.error_code(),
            category = %err.category(),
            error = %err,
            "generation failed"
        );

        // Best effort: the local copy already shows the error.
        if let SubmitOutcome::Failed(write_err) = self
            .finalize(message_id, GENERATION_ERROR_MESSAGE.to_string(), None)
            .await
        {
            tracing::warn!(%message_id, error = %write_err, "error text not persisted");
        }
        SubmitOutcome::Failed(err)
    }

    /// Undo the provisional rows after a create failure.
    fn abort_submission(&self, err: ChatError) -> SubmitOutcome {
        tracing::error!(error_code = err.error_code(), error = %err, "submission failed");
        self.update_view(|view| {
            view.optimistic.clear();
            view.in_flight = None;
            view.state = ControllerState::Idle;
        });
        SubmitOutcome::Failed(err)
    }
}
