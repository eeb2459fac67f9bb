use super::cancel::GenerationTicket;
use super::consumer::{consume_stream, ConsumerOutcome, ConsumerSink};
use super::state::{GenerationHandle, Session, SessionInner};
use crate::error::FailedTurn;
use crate::state::versions::{derive_versions, DraftEffect};
use crate::types::{GenerationRequest, Message};
use std::sync::{Arc, Weak};
use uuid::Uuid;

pub const STOPPED_SUFFIX: &str = "\n\n[Generation stopped]";

impl Session {
    /// Appends `content` as a user turn and starts generating a reply.
    /// Returns `None` when the content is blank or a generation is already streaming.
    pub fn send_message(&self, content: &str) -> Option<GenerationHandle> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        let is_dirty = self.inner.draft.is_dirty();
        let (ticket, effects) = {
            let _code_push = self.inner.code_push.lock();
            let mut state = self.inner.state.lock();
            if state.is_streaming {
                tracing::debug!(conversation_id = %self.inner.conversation_id, "send ignored while streaming");
                return None;
            }
            state.trigger_guard.note_user_send();
            state
                .messages
                .push(Message::user(&self.inner.conversation_id, content));
            state.last_error = None;
            state.failed_turn = None;
            let ticket = state.begin_streaming();
            let effects = state.reconcile_versions(self.inner.excerpt_chars, is_dirty);
            (ticket, effects)
        };
        self.inner.dispatch(&effects);

        Some(self.spawn_consumer(ticket, content.to_string(), false))
    }

    /// Generates a reply for a user turn that is already the last entry of the log.
    pub fn trigger_generation(&self, content: &str) -> Option<GenerationHandle> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        let ticket = {
            let _code_push = self.inner.code_push.lock();
            let mut state = self.inner.state.lock();
            if state.is_streaming {
                tracing::debug!(conversation_id = %self.inner.conversation_id, "trigger ignored while streaming");
                return None;
            }
            state.last_error = None;
            state.failed_turn = None;
            state.begin_streaming()
        };

        Some(self.spawn_consumer(ticket, content.to_string(), true))
    }

    /// Resumes an unanswered user turn left at the end of a freshly loaded log.
    /// Fires at most once per session and never after an explicit send.
    pub fn maybe_auto_generate(&self) -> Option<GenerationHandle> {
        let content = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;
            state
                .trigger_guard
                .check(&state.messages, state.is_streaming)
        }?;

        tracing::info!(conversation_id = %self.inner.conversation_id, "resuming unanswered user turn");
        self.trigger_generation(&content)
    }

    /// Cancels the live generation and keeps what has streamed so far as a stopped reply.
    pub fn stop_streaming(&self) {
        let is_dirty = self.inner.draft.is_dirty();
        let effects = {
            let _code_push = self.inner.code_push.lock();
            let mut state = self.inner.state.lock();
            if !state.is_streaming {
                return;
            }
            state.cancellation.cancel_active();
            let content = format!("{}{STOPPED_SUFFIX}", state.streaming_content);
            let message = Message::assistant(
                format!("cancelled-{}", Uuid::new_v4()),
                &self.inner.conversation_id,
                content,
            );
            tracing::info!(conversation_id = %self.inner.conversation_id, "generation stopped");
            state.commit(message);
            state.reconcile_versions(self.inner.excerpt_chars, is_dirty)
        };
        self.inner.dispatch(&effects);
    }

    /// Replaces the whole log, e.g. with the history loaded for this conversation.
    pub fn load_messages(&self, messages: Vec<Message>) {
        let is_dirty = self.inner.draft.is_dirty();
        let effects = {
            let mut state = self.inner.state.lock();
            state.messages = messages;
            let loaded_versions = derive_versions(&state.messages, self.inner.excerpt_chars).len();
            state.selector.rebase(loaded_versions);
            state.reconcile_versions(self.inner.excerpt_chars, is_dirty)
        };
        self.inner.dispatch(&effects);
    }

    pub fn clear_error(&self) {
        let mut state = self.inner.state.lock();
        state.last_error = None;
        state.failed_turn = None;
    }

    /// Resubmits the content of the last failed turn, exactly as it was sent.
    pub fn retry_failed_message(&self) -> Option<GenerationHandle> {
        let failed = {
            let mut state = self.inner.state.lock();
            state.last_error = None;
            state.failed_turn.take()
        }?;

        tracing::info!(conversation_id = %self.inner.conversation_id, kind = ?failed.kind, "retrying failed turn");
        self.send_message(&failed.content)
    }

    pub fn clear_conversation(&self) {
        let is_dirty = self.inner.draft.is_dirty();
        let effects = {
            let mut state = self.inner.state.lock();
            state.messages.clear();
            state.failed_turn = None;
            state.reconcile_versions(self.inner.excerpt_chars, is_dirty)
        };
        self.inner.dispatch(&effects);
    }

    /// Moves the preview pointer; `None` returns to the current code. Never touches the draft.
    pub fn select_version(&self, version_id: Option<&str>) {
        self.inner
            .state
            .lock()
            .selector
            .select(version_id.map(str::to_string));
    }

    /// Pushes a version's code into the working draft. Returns false for an unknown id.
    pub fn apply_version(&self, version_id: &str) -> bool {
        let effects = {
            let mut state = self.inner.state.lock();
            let versions = derive_versions(&state.messages, self.inner.excerpt_chars);
            state.selector.apply(&versions, version_id)
        };
        self.inner.dispatch(&effects);
        !effects.is_empty()
    }

    /// Re-runs the auto-apply policy, e.g. after the editor's dirty flag changed.
    pub fn refresh_versions(&self) {
        let is_dirty = self.inner.draft.is_dirty();
        let effects = self
            .inner
            .state
            .lock()
            .reconcile_versions(self.inner.excerpt_chars, is_dirty);
        self.inner.dispatch(&effects);
    }

    /// Tears the session down: the live generation, if any, is cancelled and discarded.
    pub fn close(&self) {
        let _code_push = self.inner.code_push.lock();
        let mut state = self.inner.state.lock();
        if state.cancellation.cancel_active() {
            tracing::debug!(conversation_id = %self.inner.conversation_id, "session closed; generation cancelled");
        }
        state.end_streaming();
    }

    fn spawn_consumer(
        &self,
        ticket: GenerationTicket,
        content: String,
        continue_generation: bool,
    ) -> GenerationHandle {
        let request = GenerationRequest {
            conversation_id: self.inner.conversation_id.clone(),
            content,
            current_code: self.inner.draft.current_code(),
            continue_generation,
        };
        let generation_id = ticket.id();
        let backend = Arc::clone(&self.inner.backend);
        let reassemble = self.inner.reassemble_split_records;
        let sink = SessionSink(Arc::downgrade(&self.inner));

        tracing::info!(
            conversation_id = %request.conversation_id,
            generation = generation_id,
            continue_generation,
            "starting generation"
        );

        let task = tokio::spawn(async move {
            let outcome =
                consume_stream(&sink, backend.as_ref(), &ticket, &request, reassemble).await;
            if let Some(inner) = sink.0.upgrade() {
                inner.finish_generation(&ticket, outcome, request.content);
            }
        });

        GenerationHandle {
            generation_id,
            task,
        }
    }
}

impl SessionInner {
    /// Commits a consumer's result, unless a newer generation or a stop has superseded it.
    fn finish_generation(&self, ticket: &GenerationTicket, outcome: ConsumerOutcome, content: String) {
        if let ConsumerOutcome::Cancelled = outcome {
            tracing::debug!(generation = ticket.id(), "generation cancelled");
            return;
        }

        let is_dirty = self.draft.is_dirty();
        let mut state = self.state.lock();
        if !state.cancellation.release(ticket) {
            tracing::debug!(generation = ticket.id(), "discarding superseded generation");
            return;
        }

        let effects: Vec<DraftEffect> = match outcome {
            ConsumerOutcome::Completed(message) => {
                tracing::info!(
                    generation = ticket.id(),
                    message_id = %message.id,
                    content_len = message.content.len(),
                    has_code = message.code_snapshot.is_some(),
                    "generation complete"
                );
                state.commit(message);
                state.reconcile_versions(self.excerpt_chars, is_dirty)
            }
            ConsumerOutcome::Failed(error) => {
                tracing::warn!(generation = ticket.id(), kind = ?error.kind(), %error, "generation failed");
                state.end_streaming();
                state.last_error = Some(error.to_string());
                state.failed_turn = Some(FailedTurn {
                    content,
                    kind: error.kind(),
                });
                Vec::new()
            }
            ConsumerOutcome::Cancelled => Vec::new(),
        };
        drop(state);
        self.dispatch(&effects);
    }
}

struct SessionSink(Weak<SessionInner>);

impl ConsumerSink for SessionSink {
    fn append_fragment(&self, ticket: &GenerationTicket, fragment: &str) -> bool {
        let Some(inner) = self.0.upgrade() else {
            return false;
        };
        let mut state = inner.state.lock();
        if !state.cancellation.is_current(ticket) {
            return false;
        }
        state.streaming_content.push_str(fragment);
        true
    }

    fn code_ready(&self, ticket: &GenerationTicket, code: &str) -> bool {
        let Some(inner) = self.0.upgrade() else {
            return false;
        };
        let _code_push = inner.code_push.lock();
        if !inner.state.lock().cancellation.is_current(ticket) {
            return false;
        }
        inner.hooks.code_updated(code);
        true
    }
}
