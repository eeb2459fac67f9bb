use crate::types::Message;

/// Decides whether a freshly loaded conversation that ends in an unanswered
/// user turn should resume generation on its own.
#[derive(Debug, Default, Clone)]
pub struct AutoTriggerGuard {
    user_sent: bool,
    disabled: bool,
}

impl AutoTriggerGuard {
    /// Records an explicit user send; the next trigger check is swallowed and
    /// the trigger never fires afterwards.
    pub fn note_user_send(&mut self) {
        self.user_sent = true;
        self.disabled = true;
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn user_sent_pending(&self) -> bool {
        self.user_sent
    }

    /// Content to resume, if the trigger fires now. Firing disables the guard.
    pub fn check(&mut self, messages: &[Message], is_streaming: bool) -> Option<String> {
        if self.user_sent {
            self.user_sent = false;
            return None;
        }
        if self.disabled || is_streaming {
            return None;
        }

        let last = messages.last()?;
        let has_assistant = messages.iter().any(Message::is_assistant);
        if !last.is_user() || has_assistant {
            return None;
        }

        self.disabled = true;
        Some(last.content.clone())
    }
}
