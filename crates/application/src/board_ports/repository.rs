use async_trait::async_trait;
use ticketflow_core::{AppResult, TenantId};
use ticketflow_domain::{
    Status, StatusId, StatusPatch, StatusScope, Ticket, TicketFilter, TicketId, TicketPatch,
};

/// Persistence collaborator port for workflow statuses.
///
/// Every write reports failure through `Err`; an `Ok` always carries a usable payload.
#[async_trait]
pub trait StatusRepository: Send + Sync {
    /// Lists the statuses of one scope.
    async fn fetch_statuses(&self, tenant_id: TenantId, scope: &StatusScope)
    -> AppResult<Vec<Status>>;

    /// Returns one status by id.
    async fn find_status(
        &self,
        tenant_id: TenantId,
        status_id: &StatusId,
    ) -> AppResult<Option<Status>>;

    /// Creates a status and returns the stored value.
    async fn create_status(&self, tenant_id: TenantId, status: Status) -> AppResult<Status>;

    /// Applies label/colour edits and returns the stored value.
    async fn update_status(
        &self,
        tenant_id: TenantId,
        status_id: &StatusId,
        patch: &StatusPatch,
    ) -> AppResult<Status>;

    /// Removes one status.
    async fn delete_status(&self, tenant_id: TenantId, status_id: &StatusId) -> AppResult<()>;

    /// Persists `order = index` for every id of the scope in one write.
    async fn save_status_order(
        &self,
        tenant_id: TenantId,
        scope: &StatusScope,
        ordered_ids: &[StatusId],
    ) -> AppResult<()>;

    /// Counts tickets whose status is the given id.
    async fn count_status_references(
        &self,
        tenant_id: TenantId,
        status_id: &StatusId,
    ) -> AppResult<u64>;
}

/// Persistence collaborator port for tickets.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Lists tickets matching the filter.
    async fn fetch_tickets(&self, tenant_id: TenantId, filter: &TicketFilter)
    -> AppResult<Vec<Ticket>>;

    /// Returns one ticket by id.
    async fn find_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
    ) -> AppResult<Option<Ticket>>;

    /// Creates a ticket and returns the stored value.
    async fn create_ticket(&self, tenant_id: TenantId, ticket: Ticket) -> AppResult<Ticket>;

    /// Applies a partial update and echoes the authoritative ticket, including `updated_at`.
    async fn patch_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
        patch: &TicketPatch,
    ) -> AppResult<Ticket>;
}
