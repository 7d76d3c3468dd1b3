use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use ticketflow_core::{AppError, AppResult, TenantId, UserIdentity};
use ticketflow_domain::{
    Permission, StatusScope, Ticket, TicketFilter, TicketId, TicketInput, TicketPatch,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::board_ports::{CreateTicketInput, TicketRepository};
use crate::keyed_locks::{KeyedGuard, KeyedLocks};
use crate::{AuthorizationService, BoardEvent, BoardEvents, StatusRegistry};

type TicketKey = (TenantId, TicketId);

#[derive(Default)]
struct StoreState {
    tickets: HashMap<TicketKey, Ticket>,
    /// Optimistic writes not yet settled, per ticket.
    pending: HashMap<TicketKey, usize>,
}

/// Shared working set of tickets.
///
/// Every surface (board, table, detail) reads from the same store, so a move
/// confirmed or rolled back on the board is seen everywhere. Tickets with a
/// move in flight are never overwritten by a bulk refresh. Writes to one
/// ticket are serialized across every surface sharing the store.
#[derive(Clone)]
pub struct TicketStore {
    authorization_service: AuthorizationService,
    repository: Arc<dyn TicketRepository>,
    registry: StatusRegistry,
    events: BoardEvents,
    state: Arc<RwLock<StoreState>>,
    ticket_locks: KeyedLocks<TicketKey>,
}

impl TicketStore {
    /// Creates a ticket store.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn TicketRepository>,
        registry: StatusRegistry,
        events: BoardEvents,
    ) -> Self {
        Self {
            authorization_service,
            repository,
            registry,
            events,
            state: Arc::new(RwLock::new(StoreState::default())),
            ticket_locks: KeyedLocks::default(),
        }
    }

    /// Re-fetches the tickets matching `filter` and returns how many the actor may see.
    pub async fn refresh(&self, actor: &UserIdentity, filter: &TicketFilter) -> AppResult<usize> {
        self.authorization_service
            .require_permission(actor, Permission::TicketsView)?;

        let tenant_id = actor.tenant_id();
        let fetched = self.repository.fetch_tickets(tenant_id, filter).await?;

        let mut state = self.state.write().await;
        let StoreState { tickets, pending } = &mut *state;
        tickets.retain(|key, ticket| {
            key.0 != tenant_id || pending.contains_key(key) || !filter.matches(ticket)
        });

        let mut skipped = 0_usize;
        for ticket in fetched {
            let key = (tenant_id, ticket.id().clone());
            if pending.contains_key(&key) {
                skipped += 1;
                continue;
            }
            tickets.insert(key, ticket);
        }
        let visible = tickets
            .iter()
            .filter(|(key, ticket)| {
                key.0 == tenant_id
                    && filter.matches(ticket)
                    && self.authorization_service.can_access_ticket(actor, ticket)
            })
            .count();
        drop(state);

        self.events
            .publish(BoardEvent::TicketsReloaded { tenant_id });
        debug!(
            tenant_id = %tenant_id,
            visible,
            skipped_pending = skipped,
            "ticket working set refreshed"
        );

        Ok(visible)
    }

    /// Lists the cached tickets the actor may see, oldest first.
    ///
    /// Visibility is always intersected with the actor's access, whatever the filter says.
    pub async fn list_filtered(&self, actor: &UserIdentity, filter: &TicketFilter) -> Vec<Ticket> {
        let tenant_id = actor.tenant_id();
        let mut tickets: Vec<Ticket> = self
            .state
            .read()
            .await
            .tickets
            .iter()
            .filter(|(key, ticket)| {
                key.0 == tenant_id
                    && filter.matches(ticket)
                    && self.authorization_service.can_access_ticket(actor, ticket)
            })
            .map(|(_, ticket)| ticket.clone())
            .collect();

        tickets.sort_by(|left, right| {
            left.created_at()
                .cmp(&right.created_at())
                .then_with(|| left.id().cmp(right.id()))
        });
        tickets
    }

    /// Returns one ticket the actor may see.
    pub async fn get(&self, actor: &UserIdentity, ticket_id: &TicketId) -> AppResult<Ticket> {
        let ticket = self.snapshot(actor.tenant_id(), ticket_id).await?;
        self.authorization_service
            .require_ticket_access(actor, &ticket)?;
        Ok(ticket)
    }

    /// Creates a ticket, defaulting to the first visible status.
    pub async fn create(&self, actor: &UserIdentity, input: CreateTicketInput) -> AppResult<Ticket> {
        self.authorization_service
            .require_permission(actor, Permission::TicketsCreate)?;
        if input
            .assignee
            .as_deref()
            .is_some_and(|assignee| assignee != actor.subject())
        {
            self.authorization_service
                .require_permission(actor, Permission::TicketsAssign)?;
        }

        let tenant_id = actor.tenant_id();
        let status_id = match input.status_id.clone() {
            Some(status_id) => status_id,
            None => self
                .registry
                .visible_statuses(actor, input.project_id.as_ref())
                .await
                .into_iter()
                .next()
                .map(|status| status.id().clone())
                .ok_or_else(|| {
                    AppError::Validation("no status is available for new tickets".to_owned())
                })?,
        };
        let scope = StatusScope::for_project(input.project_id.as_ref());
        let (status, _claim) = self
            .registry
            .claim_visible_status(actor, &scope, &status_id)
            .await?;

        let now = Utc::now();
        let draft = Ticket::new(TicketInput {
            id: TicketId::generate(),
            title: input.title,
            description: input.description,
            status_id: status.id().clone(),
            priority: input.priority,
            assignee: input.assignee,
            created_by: actor.subject().to_owned(),
            project_id: input.project_id,
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
        })?;

        let created = self.repository.create_ticket(tenant_id, draft).await?;
        self.replace(tenant_id, created.clone()).await;

        info!(
            tenant_id = %tenant_id,
            ticket_id = %created.id(),
            status_id = %created.status_id(),
            title = %created.title(),
            "ticket created"
        );
        Ok(created)
    }

    /// Applies a field edit after checking it against the current snapshot.
    ///
    /// Waits for any move of the same ticket to settle first. Setting the
    /// status the ticket already has is not a change.
    pub async fn patch(
        &self,
        actor: &UserIdentity,
        ticket_id: &TicketId,
        mut patch: TicketPatch,
    ) -> AppResult<Ticket> {
        let tenant_id = actor.tenant_id();
        let _serial = self.lock_ticket(tenant_id, ticket_id).await;

        let current = self.snapshot(tenant_id, ticket_id).await?;
        self.authorization_service
            .require_ticket_edit(actor, &current)?;
        if patch.status_id.as_ref() == Some(current.status_id()) {
            patch.status_id = None;
        }
        if patch.is_empty() {
            debug!(ticket_id = %ticket_id, "edit changes nothing");
            return Ok(current);
        }
        if patch.changes_assignee() {
            self.authorization_service
                .require_permission(actor, Permission::TicketsAssign)?;
        }
        let _claim = match &patch.status_id {
            Some(status_id) => Some(
                self.registry
                    .claim_visible_status(actor, &current.scope(), status_id)
                    .await?,
            ),
            None => None,
        };
        current.apply_patch(&patch, Utc::now())?;

        let stored = self.remote_patch(tenant_id, ticket_id, &patch).await?;
        self.replace(tenant_id, stored.clone()).await;

        info!(tenant_id = %tenant_id, ticket_id = %ticket_id, "ticket updated");
        Ok(stored)
    }

    pub(crate) fn authorization(&self) -> &AuthorizationService {
        &self.authorization_service
    }

    pub(crate) fn registry(&self) -> &StatusRegistry {
        &self.registry
    }

    /// Serializes writes to one ticket across every surface sharing this store.
    pub(crate) async fn lock_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
    ) -> KeyedGuard<TicketKey> {
        self.ticket_locks.lock((tenant_id, ticket_id.clone())).await
    }

    /// Returns the cached ticket, fetching it once when the store has not seen it yet.
    pub(crate) async fn snapshot(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
    ) -> AppResult<Ticket> {
        if let Some(ticket) = self.cached(tenant_id, ticket_id).await {
            return Ok(ticket);
        }

        let ticket = self
            .repository
            .find_ticket(tenant_id, ticket_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("ticket '{ticket_id}' does not exist")))?;
        self.state
            .write()
            .await
            .tickets
            .entry((tenant_id, ticket_id.clone()))
            .or_insert_with(|| ticket.clone());
        Ok(ticket)
    }

    pub(crate) async fn cached(&self, tenant_id: TenantId, ticket_id: &TicketId) -> Option<Ticket> {
        self.state
            .read()
            .await
            .tickets
            .get(&(tenant_id, ticket_id.clone()))
            .cloned()
    }

    /// Shows an optimistic copy and shields it from bulk refreshes until settled.
    pub(crate) async fn apply_optimistic(&self, tenant_id: TenantId, ticket: Ticket) {
        let key = (tenant_id, ticket.id().clone());
        let mut state = self.state.write().await;
        *state.pending.entry(key.clone()).or_default() += 1;
        state.tickets.insert(key, ticket.clone());
        drop(state);

        self.publish_changed(tenant_id, ticket.id());
    }

    /// Replaces the cached copy with an authoritative one.
    pub(crate) async fn replace(&self, tenant_id: TenantId, ticket: Ticket) {
        self.state
            .write()
            .await
            .tickets
            .insert((tenant_id, ticket.id().clone()), ticket.clone());
        self.publish_changed(tenant_id, ticket.id());
    }

    /// Restores `previous` unless the cached copy moved on from `expected`.
    ///
    /// When something else changed the ticket meanwhile, the authoritative
    /// copy is re-fetched instead; if that fails too, `previous` wins.
    pub(crate) async fn reconcile_rollback(
        &self,
        tenant_id: TenantId,
        expected: &Ticket,
        previous: Ticket,
    ) {
        let key = (tenant_id, previous.id().clone());
        let mut state = self.state.write().await;
        let unchanged = state.tickets.get(&key).is_none_or(|current| current == expected);
        if unchanged {
            state.tickets.insert(key, previous.clone());
            drop(state);
            self.publish_changed(tenant_id, previous.id());
            return;
        }
        drop(state);

        let restored = match self.repository.find_ticket(tenant_id, previous.id()).await {
            Ok(Some(ticket)) => ticket,
            Ok(None) => {
                self.state.write().await.tickets.remove(&key);
                self.publish_changed(tenant_id, previous.id());
                return;
            }
            Err(error) => {
                warn!(
                    tenant_id = %tenant_id,
                    ticket_id = %previous.id(),
                    error = %error,
                    "could not re-fetch ticket after rollback, restoring snapshot"
                );
                previous
            }
        };
        self.replace(tenant_id, restored).await;
    }

    /// Releases one in-flight marker of a ticket.
    pub(crate) async fn settle(&self, tenant_id: TenantId, ticket_id: &TicketId) {
        let key = (tenant_id, ticket_id.clone());
        let mut state = self.state.write().await;
        if let Some(count) = state.pending.get_mut(&key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.pending.remove(&key);
            }
        }
    }

    /// Returns whether the store still caches the ticket.
    pub(crate) async fn is_cached(&self, tenant_id: TenantId, ticket_id: &TicketId) -> bool {
        self.state
            .read()
            .await
            .tickets
            .contains_key(&(tenant_id, ticket_id.clone()))
    }

    /// Sends a patch to the persistence collaborator and checks the echoed id.
    pub(crate) async fn remote_patch(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
        patch: &TicketPatch,
    ) -> AppResult<Ticket> {
        let stored = self
            .repository
            .patch_ticket(tenant_id, ticket_id, patch)
            .await?;
        if stored.id() != ticket_id {
            return Err(AppError::Internal(format!(
                "persistence acknowledged ticket '{}' for a write to '{ticket_id}'",
                stored.id()
            )));
        }

        Ok(stored)
    }

    fn publish_changed(&self, tenant_id: TenantId, ticket_id: &TicketId) {
        self.events.publish(BoardEvent::TicketChanged {
            tenant_id,
            ticket_id: ticket_id.clone(),
        });
    }
}
