use super::cancel::{CancellationCoordinator, GenerationTicket};
use super::trigger::AutoTriggerGuard;
use crate::api::GenerationBackend;
use crate::config::{Config, DEFAULT_EXCERPT_CHARS};
use crate::error::FailedTurn;
use crate::state::draft::DraftSource;
use crate::state::versions::{
    derive_versions, CodeVersion, DraftEffect, DraftHooks, NoDraftHooks, VersionSelector,
};
use crate::types::Message;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};

/// Read-only copy of the session fields, taken under one lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub messages: Vec<Message>,
    pub is_streaming: bool,
    pub streaming_content: String,
    pub last_error: Option<String>,
    pub failed_turn: Option<FailedTurn>,
    /// Id of the generation currently bound to a cancellation token.
    pub active_generation: Option<u64>,
    pub auto_trigger_disabled: bool,
    pub user_send_pending: bool,
}

pub(super) struct SessionState {
    pub(super) messages: Vec<Message>,
    pub(super) is_streaming: bool,
    pub(super) streaming_content: String,
    pub(super) last_error: Option<String>,
    pub(super) failed_turn: Option<FailedTurn>,
    pub(super) cancellation: CancellationCoordinator,
    pub(super) trigger_guard: AutoTriggerGuard,
    pub(super) selector: VersionSelector,
}

impl SessionState {
    fn new(selector: VersionSelector) -> Self {
        Self {
            messages: Vec::new(),
            is_streaming: false,
            streaming_content: String::new(),
            last_error: None,
            failed_turn: None,
            cancellation: CancellationCoordinator::default(),
            trigger_guard: AutoTriggerGuard::default(),
            selector,
        }
    }

    /// Enters streaming with an empty buffer under a freshly bound ticket.
    pub(super) fn begin_streaming(&mut self) -> GenerationTicket {
        let ticket = self.cancellation.begin();
        self.is_streaming = true;
        self.streaming_content.clear();
        ticket
    }

    pub(super) fn end_streaming(&mut self) {
        self.is_streaming = false;
        self.streaming_content.clear();
    }

    /// Appends a finished assistant turn and leaves streaming. Nothing is appended
    /// when the id is already in the log or the last user turn already has a reply.
    pub(super) fn commit(&mut self, message: Message) {
        if self.messages.iter().any(|existing| existing.id == message.id) {
            tracing::debug!(message_id = %message.id, "assistant message already committed");
        } else if self.last_user_turn_answered() {
            tracing::debug!(message_id = %message.id, "last user turn already answered");
        } else {
            self.messages.push(message);
        }
        self.end_streaming();
    }

    fn last_user_turn_answered(&self) -> bool {
        let after_user = self
            .messages
            .iter()
            .rposition(Message::is_user)
            .map_or(0, |index| index + 1);
        self.messages[after_user..].iter().any(Message::is_assistant)
    }

    /// Derive, then decide: the version list is rebuilt from the log before the
    /// auto-apply policy sees it.
    pub(super) fn reconcile_versions(
        &mut self,
        excerpt_chars: usize,
        is_dirty: bool,
    ) -> Vec<DraftEffect> {
        let versions = derive_versions(&self.messages, excerpt_chars);
        self.selector.evaluate(&versions, is_dirty)
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            messages: self.messages.clone(),
            is_streaming: self.is_streaming,
            streaming_content: self.streaming_content.clone(),
            last_error: self.last_error.clone(),
            failed_turn: self.failed_turn.clone(),
            active_generation: self.cancellation.active_id(),
            auto_trigger_disabled: self.trigger_guard.is_disabled(),
            user_send_pending: self.trigger_guard.user_sent_pending(),
        }
    }
}

pub(super) struct SessionInner {
    pub(super) conversation_id: String,
    pub(super) backend: Arc<dyn GenerationBackend>,
    pub(super) draft: Arc<dyn DraftSource>,
    pub(super) hooks: Arc<dyn DraftHooks>,
    pub(super) excerpt_chars: usize,
    pub(super) reassemble_split_records: bool,
    pub(super) state: Mutex<SessionState>,
    /// Held from a consumer's ticket check through its `code_updated` call, and
    /// while a generation is cancelled. Always taken before `state`.
    pub(super) code_push: Mutex<()>,
}

impl SessionInner {
    pub(super) fn dispatch(&self, effects: &[DraftEffect]) {
        for effect in effects {
            effect.dispatch(self.hooks.as_ref());
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if self.state.get_mut().cancellation.cancel_active() {
            tracing::debug!(conversation_id = %self.conversation_id, "session dropped; generation cancelled");
        }
    }
}

/// Chat session bound to one conversation. Cloning yields another handle to the same session.
///
/// Operations that start a generation spawn the stream consumer on the
/// current tokio runtime and must be called from within one.
#[derive(Clone)]
pub struct Session {
    pub(super) inner: Arc<SessionInner>,
}

impl Session {
    pub fn builder(
        conversation_id: impl Into<String>,
        backend: Arc<dyn GenerationBackend>,
    ) -> SessionBuilder {
        SessionBuilder {
            conversation_id: conversation_id.into(),
            backend,
            draft: None,
            hooks: None,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            reassemble_split_records: false,
            initial_version_id: None,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.inner.conversation_id
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.lock().snapshot()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.lock().messages.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.state.lock().is_streaming
    }

    pub fn streaming_content(&self) -> String {
        self.inner.state.lock().streaming_content.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.lock().last_error.clone()
    }

    pub fn failed_turn(&self) -> Option<FailedTurn> {
        self.inner.state.lock().failed_turn.clone()
    }

    pub fn versions(&self) -> Vec<CodeVersion> {
        derive_versions(&self.inner.state.lock().messages, self.inner.excerpt_chars)
    }

    pub fn latest_version(&self) -> Option<CodeVersion> {
        self.versions().pop()
    }

    pub fn selected_version_id(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .selector
            .selected_version_id()
            .map(str::to_string)
    }

    pub fn active_version_id(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .selector
            .active_version_id()
            .map(str::to_string)
    }

    pub fn is_active_version(&self, version_id: &str) -> bool {
        self.inner
            .state
            .lock()
            .selector
            .is_active_version(version_id)
    }

    /// Code of the previewed version, else the editor's current code.
    pub fn preview_code(&self) -> Option<String> {
        let current = self.inner.draft.current_code();
        let state = self.inner.state.lock();
        let versions = derive_versions(&state.messages, self.inner.excerpt_chars);
        state
            .selector
            .preview_code(&versions, current.as_deref())
            .map(str::to_string)
    }
}

pub struct SessionBuilder {
    conversation_id: String,
    backend: Arc<dyn GenerationBackend>,
    draft: Option<Arc<dyn DraftSource>>,
    hooks: Option<Arc<dyn DraftHooks>>,
    excerpt_chars: usize,
    reassemble_split_records: bool,
    initial_version_id: Option<String>,
}

impl SessionBuilder {
    pub fn config(mut self, config: &Config) -> Self {
        self.excerpt_chars = config.excerpt_chars;
        self.reassemble_split_records = config.reassemble_split_records;
        self
    }

    pub fn draft_source(mut self, draft: Arc<dyn DraftSource>) -> Self {
        self.draft = Some(draft);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn DraftHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn initial_version(mut self, version_id: Option<String>) -> Self {
        self.initial_version_id = version_id;
        self
    }

    pub fn build(self) -> Session {
        let selector = match self.initial_version_id {
            Some(version_id) => VersionSelector::with_initial_version(version_id),
            None => VersionSelector::new(),
        };

        Session {
            inner: Arc::new(SessionInner {
                conversation_id: self.conversation_id,
                backend: self.backend,
                draft: self.draft.unwrap_or_else(|| Arc::new(CleanDraft)),
                hooks: self.hooks.unwrap_or_else(|| Arc::new(NoDraftHooks)),
                excerpt_chars: self.excerpt_chars,
                reassemble_split_records: self.reassemble_split_records,
                state: Mutex::new(SessionState::new(selector)),
                code_push: Mutex::new(()),
            }),
        }
    }
}

/// Draft source used when no editor is attached: no code, never dirty.
struct CleanDraft;

impl DraftSource for CleanDraft {
    fn current_code(&self) -> Option<String> {
        None
    }

    fn is_dirty(&self) -> bool {
        false
    }
}

/// Handle to one spawned stream consumer.
pub struct GenerationHandle {
    pub(super) generation_id: u64,
    pub(super) task: JoinHandle<()>,
}

impl GenerationHandle {
    pub fn generation_id(&self) -> u64 {
        self.generation_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits until the consumer has resolved and its result has been committed.
    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }
}
