use tokio_util::sync::CancellationToken;

/// Binds one stream-consumer invocation to its cancellation token.
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    id: u64,
    token: CancellationToken,
}

impl GenerationTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Keeps at most one live generation per session.
#[derive(Debug, Default)]
pub struct CancellationCoordinator {
    active: Option<GenerationTicket>,
    next_id: u64,
}

impl CancellationCoordinator {
    /// Cancels whatever is outstanding and binds a fresh ticket.
    pub fn begin(&mut self) -> GenerationTicket {
        if let Some(previous) = self.active.take() {
            tracing::debug!(generation = previous.id, "superseding outstanding generation");
            previous.token.cancel();
        }
        self.next_id += 1;
        let ticket = GenerationTicket {
            id: self.next_id,
            token: CancellationToken::new(),
        };
        self.active = Some(ticket.clone());
        ticket
    }

    /// Cancels the outstanding ticket, if any. Returns whether one was cancelled.
    pub fn cancel_active(&mut self) -> bool {
        match self.active.take() {
            Some(ticket) => {
                ticket.token.cancel();
                true
            }
            None => false,
        }
    }

    /// True while `ticket` is the bound, uncancelled generation.
    pub fn is_current(&self, ticket: &GenerationTicket) -> bool {
        !ticket.is_cancelled()
            && self
                .active
                .as_ref()
                .is_some_and(|active| active.id == ticket.id)
    }

    /// Unbinds `ticket` once its consumer has resolved. Stale tickets are ignored.
    pub fn release(&mut self, ticket: &GenerationTicket) -> bool {
        if self.is_current(ticket) {
            self.active = None;
            true
        } else {
            false
        }
    }

    pub fn active_id(&self) -> Option<u64> {
        self.active.as_ref().map(|ticket| ticket.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_cancels_previous_ticket() {
        let mut coordinator = CancellationCoordinator::default();
        let first = coordinator.begin();
        let second = coordinator.begin();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(!coordinator.is_current(&first));
        assert!(coordinator.is_current(&second));
        assert_eq!(coordinator.active_id(), Some(second.id()));
    }

    #[test]
    fn test_cancel_active_clears_binding() {
        let mut coordinator = CancellationCoordinator::default();
        assert!(!coordinator.cancel_active());

        let ticket = coordinator.begin();
        assert!(coordinator.cancel_active());
        assert!(ticket.is_cancelled());
        assert_eq!(coordinator.active_id(), None);
        assert!(!coordinator.is_current(&ticket));
    }

    #[test]
    fn test_release_ignores_stale_tickets() {
        let mut coordinator = CancellationCoordinator::default();
        let stale = coordinator.begin();
        let live = coordinator.begin();

        assert!(!coordinator.release(&stale));
        assert_eq!(coordinator.active_id(), Some(live.id()));
        assert!(coordinator.release(&live));
        assert_eq!(coordinator.active_id(), None);
        assert!(!live.is_cancelled());
    }
}
