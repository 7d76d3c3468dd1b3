use ticketflow_core::TenantId;
use ticketflow_domain::{StatusScope, TicketId};
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Change notifications for surfaces observing the same store and registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    /// One ticket changed locally (optimistic move, confirmation, rollback or edit).
    TicketChanged {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Changed ticket.
        ticket_id: TicketId,
    },
    /// The working set of tickets was re-fetched.
    TicketsReloaded {
        /// Owning tenant.
        tenant_id: TenantId,
    },
    /// The status set of one scope changed.
    StatusSetChanged {
        /// Owning tenant.
        tenant_id: TenantId,
        /// Changed scope.
        scope: StatusScope,
    },
}

/// Broadcast hub shared by the registry, the store and the synchronizer.
#[derive(Debug, Clone)]
pub struct BoardEvents {
    sender: broadcast::Sender<BoardEvent>,
}

impl BoardEvents {
    /// Creates an event hub retaining up to `capacity` undelivered events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.sender.subscribe()
    }

    /// Publishes one event to every current subscriber.
    pub fn publish(&self, event: BoardEvent) {
        if let Err(error) = self.sender.send(event) {
            trace!(event = ?error.0, "board event dropped without subscribers");
        }
    }
}

impl Default for BoardEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
