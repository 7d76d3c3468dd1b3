use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ticketflow_core::{AppError, AppResult, UserIdentity};
use ticketflow_domain::{
    BoardView, ProjectId, Status, StatusId, Ticket, TicketFilter, TicketId,
};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info};

use crate::TicketStore;
use crate::board_ports::TicketChangeSink;

mod in_flight;
mod moves;

/// Persistence bounds applied to every move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardSyncConfig {
    /// Upper bound for one persistence call; elapsing counts as a transient failure.
    pub persist_timeout: Duration,
    /// Automatic retries after a transient failure before rolling back.
    pub transient_retries: u8,
}

impl Default for BoardSyncConfig {
    fn default() -> Self {
        Self {
            persist_timeout: Duration::from_secs(10),
            transient_retries: 1,
        }
    }
}

/// Board rendering state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardState {
    /// Statuses or tickets have not completed their first load.
    Loading,
    /// Columns ready to render.
    Ready(BoardView),
}

/// Result of a move request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The ticket already sat in the target status; nothing was dispatched.
    Unchanged,
    /// The persistence collaborator acknowledged the move.
    Confirmed(Ticket),
    /// The board was closed before the move resolved.
    Discarded,
}

/// Lifecycle of the latest move of one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    /// No move requested yet.
    Idle,
    /// Local copy moved, persistence pending.
    OptimisticallyApplied,
    /// Persistence acknowledged the move.
    Confirmed,
    /// Persistence failed and the local copy was restored.
    RolledBack,
}

#[derive(Default)]
struct LoadFlags {
    statuses: AtomicBool,
    tickets: AtomicBool,
}

/// Optimistic move state machine for one board session.
///
/// Bound to one actor and one board scope. Moves of the same ticket are
/// serialized through the shared store, so two boards over one store never
/// race on a ticket; moves of different tickets run concurrently. The board only
/// renders once statuses and tickets have both loaded at least once.
#[derive(Clone)]
pub struct BoardSynchronizer {
    actor: UserIdentity,
    project_id: Option<ProjectId>,
    store: TicketStore,
    config: BoardSyncConfig,
    change_sink: Option<Arc<dyn TicketChangeSink>>,
    move_states: Arc<RwLock<HashMap<TicketId, MoveState>>>,
    in_flight: Arc<watch::Sender<usize>>,
    loaded: Arc<LoadFlags>,
    alive: Arc<AtomicBool>,
}

impl BoardSynchronizer {
    /// Creates a board session over a shared ticket store.
    #[must_use]
    pub fn new(
        actor: UserIdentity,
        project_id: Option<ProjectId>,
        store: TicketStore,
        config: BoardSyncConfig,
    ) -> Self {
        let (in_flight, _) = watch::channel(0_usize);
        Self {
            actor,
            project_id,
            store,
            config,
            change_sink: None,
            move_states: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(in_flight),
            loaded: Arc::new(LoadFlags::default()),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Notifies an externally owned ticket list of confirmations and rollbacks.
    #[must_use]
    pub fn with_change_sink(mut self, change_sink: Arc<dyn TicketChangeSink>) -> Self {
        self.change_sink = Some(change_sink);
        self
    }

    /// Returns the acting identity.
    #[must_use]
    pub fn actor(&self) -> &UserIdentity {
        &self.actor
    }

    /// Fetches statuses and tickets concurrently.
    pub async fn load(&self) -> AppResult<()> {
        let (statuses, tickets) = tokio::join!(self.refresh_statuses(), self.refresh_tickets());
        debug!(
            tenant_id = %self.actor.tenant_id(),
            statuses = statuses.len(),
            "board statuses loaded"
        );
        tickets.map(|_| ())
    }

    /// Re-fetches the visible statuses.
    pub async fn refresh_statuses(&self) -> Vec<Status> {
        let statuses = self
            .store
            .registry()
            .visible_statuses(&self.actor, self.project_id.as_ref())
            .await;
        self.loaded.statuses.store(true, Ordering::SeqCst);
        statuses
    }

    /// Re-fetches the board's tickets. In-flight moves keep their optimistic copy.
    ///
    /// Move states of tickets that left the working set are forgotten.
    pub async fn refresh_tickets(&self) -> AppResult<usize> {
        let visible = self.store.refresh(&self.actor, &self.ticket_filter()).await?;
        self.loaded.tickets.store(true, Ordering::SeqCst);
        self.prune_move_states().await;
        Ok(visible)
    }

    /// Groups the visible tickets under the visible statuses.
    pub async fn list_board_columns(&self) -> BoardState {
        if !self.is_loaded() {
            return BoardState::Loading;
        }

        let registry = self.store.registry();
        let statuses = match registry
            .cached_visible_statuses(self.actor.tenant_id(), self.project_id.as_ref())
            .await
        {
            Some(statuses) => statuses,
            None => {
                registry
                    .visible_statuses(&self.actor, self.project_id.as_ref())
                    .await
            }
        };
        let tickets = self
            .store
            .list_filtered(&self.actor, &self.ticket_filter())
            .await;

        BoardState::Ready(BoardView::project(&statuses, &tickets))
    }

    /// Reorders the statuses of one scope. The scope is taken from the first id.
    pub async fn reorder_statuses(&self, ordered_ids: &[StatusId]) -> AppResult<Vec<Status>> {
        let first = ordered_ids
            .first()
            .ok_or_else(|| AppError::Validation("reorder needs at least one status id".to_owned()))?;
        let registry = self.store.registry();
        let scope = registry
            .visible_statuses(&self.actor, self.project_id.as_ref())
            .await
            .into_iter()
            .find(|status| status.id() == first)
            .map(|status| status.scope().clone())
            .ok_or_else(|| {
                AppError::Validation(format!("status '{first}' is not visible on this board"))
            })?;

        registry
            .reorder_statuses(&self.actor, &scope, ordered_ids)
            .await
    }

    /// Returns the state of the latest move of a ticket.
    pub async fn move_state(&self, ticket_id: &TicketId) -> MoveState {
        self.move_states
            .read()
            .await
            .get(ticket_id)
            .copied()
            .unwrap_or(MoveState::Idle)
    }

    /// Returns whether any move is in flight.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        *self.in_flight.borrow() > 0
    }

    /// Subscribes to the number of in-flight moves.
    #[must_use]
    pub fn subscribe_updating(&self) -> watch::Receiver<usize> {
        self.in_flight.subscribe()
    }

    /// Marks the board as unmounted. Results arriving later are discarded.
    pub fn close(&self) {
        if self.alive.swap(false, Ordering::SeqCst) {
            info!(tenant_id = %self.actor.tenant_id(), "board session closed");
        }
    }

    /// Returns whether the board is still mounted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn is_loaded(&self) -> bool {
        self.loaded.statuses.load(Ordering::SeqCst) && self.loaded.tickets.load(Ordering::SeqCst)
    }

    fn ticket_filter(&self) -> TicketFilter {
        match &self.project_id {
            Some(project_id) => TicketFilter::default().with_project(project_id.clone()),
            None => TicketFilter::default(),
        }
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.is_open() {
            return Ok(());
        }

        Err(AppError::Conflict("board session is closed".to_owned()))
    }

    async fn prune_move_states(&self) {
        let tenant_id = self.actor.tenant_id();
        let tracked: Vec<(TicketId, MoveState)> = self
            .move_states
            .read()
            .await
            .iter()
            .map(|(ticket_id, state)| (ticket_id.clone(), *state))
            .collect();

        let mut gone = Vec::new();
        for (ticket_id, state) in tracked {
            if state != MoveState::OptimisticallyApplied
                && !self.store.is_cached(tenant_id, &ticket_id).await
            {
                gone.push(ticket_id);
            }
        }
        if gone.is_empty() {
            return;
        }

        let mut move_states = self.move_states.write().await;
        for ticket_id in &gone {
            // a move may have started since the scan
            if move_states.get(ticket_id) != Some(&MoveState::OptimisticallyApplied) {
                move_states.remove(ticket_id);
            }
        }
        debug!(pruned = gone.len(), "forgot move states of departed tickets");
    }

    async fn set_move_state(&self, ticket_id: &TicketId, state: MoveState) {
        self.move_states
            .write()
            .await
            .insert(ticket_id.clone(), state);
    }
}

#[cfg(test)]
mod tests;
