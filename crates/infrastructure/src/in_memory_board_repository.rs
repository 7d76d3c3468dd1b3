use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use ticketflow_application::{StatusRepository, TicketRepository};
use ticketflow_core::{AppError, AppResult, TenantId};
use ticketflow_domain::{
    Status, StatusId, StatusPatch, StatusScope, Ticket, TicketFilter, TicketId, TicketPatch,
    reorder_by_ids,
};
use tokio::sync::RwLock;

/// In-memory persistence collaborator for statuses and tickets.
///
/// Backs local board sessions and adapter tests. Every write is tenant-scoped
/// and stamps `updated_at` the way a remote store would.
#[derive(Debug, Default)]
pub struct InMemoryBoardRepository {
    statuses: RwLock<HashMap<(TenantId, StatusScope), Vec<Status>>>,
    tickets: RwLock<HashMap<(TenantId, TicketId), Ticket>>,
}

impl InMemoryBoardRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            statuses: RwLock::new(HashMap::new()),
            tickets: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StatusRepository for InMemoryBoardRepository {
    async fn fetch_statuses(
        &self,
        tenant_id: TenantId,
        scope: &StatusScope,
    ) -> AppResult<Vec<Status>> {
        let mut statuses = self
            .statuses
            .read()
            .await
            .get(&(tenant_id, scope.clone()))
            .cloned()
            .unwrap_or_default();
        statuses.sort_by_key(Status::order);

        Ok(statuses)
    }

    async fn find_status(
        &self,
        tenant_id: TenantId,
        status_id: &StatusId,
    ) -> AppResult<Option<Status>> {
        Ok(self
            .statuses
            .read()
            .await
            .iter()
            .filter(|((stored_tenant_id, _), _)| *stored_tenant_id == tenant_id)
            .flat_map(|(_, statuses)| statuses.iter())
            .find(|status| status.id() == status_id)
            .cloned())
    }

    async fn create_status(&self, tenant_id: TenantId, status: Status) -> AppResult<Status> {
        let mut statuses = self.statuses.write().await;
        let exists = statuses
            .iter()
            .filter(|((stored_tenant_id, _), _)| *stored_tenant_id == tenant_id)
            .flat_map(|(_, stored)| stored.iter())
            .any(|stored| stored.id() == status.id());
        if exists {
            return Err(AppError::Conflict(format!(
                "status '{}' already exists for tenant '{}'",
                status.id(),
                tenant_id
            )));
        }

        statuses
            .entry((tenant_id, status.scope().clone()))
            .or_default()
            .push(status.clone());
        Ok(status)
    }

    async fn update_status(
        &self,
        tenant_id: TenantId,
        status_id: &StatusId,
        patch: &StatusPatch,
    ) -> AppResult<Status> {
        let mut statuses = self.statuses.write().await;
        let stored = statuses
            .iter_mut()
            .filter(|((stored_tenant_id, _), _)| *stored_tenant_id == tenant_id)
            .flat_map(|(_, stored)| stored.iter_mut())
            .find(|status| status.id() == status_id)
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "status '{status_id}' does not exist for tenant '{tenant_id}'"
                ))
            })?;

        *stored = stored.apply_patch(patch)?;
        Ok(stored.clone())
    }

    async fn delete_status(&self, tenant_id: TenantId, status_id: &StatusId) -> AppResult<()> {
        let mut statuses = self.statuses.write().await;
        let mut removed = false;
        for ((stored_tenant_id, _), stored) in statuses.iter_mut() {
            if *stored_tenant_id != tenant_id {
                continue;
            }
            let before = stored.len();
            stored.retain(|status| status.id() != status_id);
            removed |= stored.len() != before;
        }

        if !removed {
            return Err(AppError::NotFound(format!(
                "status '{status_id}' does not exist for tenant '{tenant_id}'"
            )));
        }

        Ok(())
    }

    async fn save_status_order(
        &self,
        tenant_id: TenantId,
        scope: &StatusScope,
        ordered_ids: &[StatusId],
    ) -> AppResult<()> {
        let mut statuses = self.statuses.write().await;
        let key = (tenant_id, scope.clone());
        let mut current = statuses.get(&key).cloned().unwrap_or_default();
        current.sort_by_key(Status::order);

        let reordered = reorder_by_ids(&current, ordered_ids)?;
        statuses.insert(key, reordered);
        Ok(())
    }

    async fn count_status_references(
        &self,
        tenant_id: TenantId,
        status_id: &StatusId,
    ) -> AppResult<u64> {
        let count = self
            .tickets
            .read()
            .await
            .iter()
            .filter(|((stored_tenant_id, _), ticket)| {
                *stored_tenant_id == tenant_id && ticket.status_id() == status_id
            })
            .count();

        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl TicketRepository for InMemoryBoardRepository {
    async fn fetch_tickets(
        &self,
        tenant_id: TenantId,
        filter: &TicketFilter,
    ) -> AppResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .read()
            .await
            .iter()
            .filter_map(|((stored_tenant_id, _), ticket)| {
                (*stored_tenant_id == tenant_id && filter.matches(ticket)).then(|| ticket.clone())
            })
            .collect();
        tickets.sort_by(|left, right| {
            left.created_at()
                .cmp(&right.created_at())
                .then_with(|| left.id().cmp(right.id()))
        });

        Ok(tickets)
    }

    async fn find_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
    ) -> AppResult<Option<Ticket>> {
        Ok(self
            .tickets
            .read()
            .await
            .get(&(tenant_id, ticket_id.clone()))
            .cloned())
    }

    async fn create_ticket(&self, tenant_id: TenantId, ticket: Ticket) -> AppResult<Ticket> {
        let key = (tenant_id, ticket.id().clone());
        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "ticket '{}' already exists for tenant '{}'",
                key.1, key.0
            )));
        }

        tickets.insert(key, ticket.clone());
        Ok(ticket)
    }

    async fn patch_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
        patch: &TicketPatch,
    ) -> AppResult<Ticket> {
        let mut tickets = self.tickets.write().await;
        let stored = tickets
            .get_mut(&(tenant_id, ticket_id.clone()))
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "ticket '{ticket_id}' does not exist for tenant '{tenant_id}'"
                ))
            })?;

        *stored = stored.apply_patch(patch, Utc::now())?;
        Ok(stored.clone())
    }
}
