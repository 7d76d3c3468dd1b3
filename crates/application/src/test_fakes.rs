//! Hand-written port fakes shared by the service test modules.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::{Mutex, Notify};

use ticketflow_core::{AppError, AppResult, Role, TenantId, UserIdentity};
use ticketflow_domain::{
    ProjectId, Status, StatusId, StatusInput, StatusPatch, StatusScope, Ticket, TicketFilter,
    TicketId, TicketInput, TicketPatch, TicketPriority,
};

use crate::{
    AuthorizationService, BoardEvents, StatusRepository, StatusRegistry, TicketRepository,
    TicketStore,
};

pub(crate) fn tenant() -> TenantId {
    TenantId::from_uuid(uuid::Uuid::from_u128(0x7e57))
}

pub(crate) fn actor(subject: &str, role: Role) -> UserIdentity {
    UserIdentity::new(subject, subject, None, tenant(), Some(role))
}

pub(crate) fn status_id(value: &str) -> StatusId {
    StatusId::new(value).unwrap_or_else(|error| panic!("{error}"))
}

pub(crate) fn ticket_id(value: &str) -> TicketId {
    TicketId::new(value).unwrap_or_else(|error| panic!("{error}"))
}

pub(crate) fn project_id(value: &str) -> ProjectId {
    ProjectId::new(value).unwrap_or_else(|error| panic!("{error}"))
}

pub(crate) fn status(id: &str, order: u32, scope: StatusScope) -> Status {
    Status::new(StatusInput {
        id: status_id(id),
        label: id.to_owned(),
        color: "#336699".to_owned(),
        order,
        scope,
    })
    .unwrap_or_else(|error| panic!("status fixture must be valid: {error}"))
}

pub(crate) fn ticket(id: &str, status: &str, created_by: &str, assignee: Option<&str>) -> Ticket {
    let created_at = Utc::now() - Duration::hours(1);
    Ticket::new(TicketInput {
        id: ticket_id(id),
        title: format!("ticket {id}"),
        description: String::new(),
        status_id: status_id(status),
        priority: TicketPriority::Medium,
        assignee: assignee.map(str::to_owned),
        created_by: created_by.to_owned(),
        project_id: None,
        due_date: None,
        created_at,
        updated_at: created_at,
    })
    .unwrap_or_else(|error| panic!("ticket fixture must be valid: {error}"))
}

pub(crate) fn ids(statuses: &[Status]) -> Vec<&str> {
    statuses.iter().map(|status| status.id().as_str()).collect()
}

#[derive(Default)]
pub(crate) struct FakeStatusRepository {
    pub(crate) statuses: Mutex<HashMap<StatusScope, Vec<Status>>>,
    pub(crate) references: Mutex<HashMap<StatusId, u64>>,
    pub(crate) fail_fetch: AtomicBool,
    pub(crate) fail_order_save: AtomicBool,
    pub(crate) order_saves: AtomicUsize,
}

impl FakeStatusRepository {
    pub(crate) fn with_global(statuses: Vec<Status>) -> Self {
        let repository = Self::default();
        repository
            .statuses
            .try_lock()
            .map(|mut stored| stored.insert(StatusScope::Global, statuses))
            .unwrap_or_else(|_| panic!("fresh fake repository must not be locked"));
        repository
    }
}

#[async_trait]
impl StatusRepository for FakeStatusRepository {
    async fn fetch_statuses(
        &self,
        _tenant_id: TenantId,
        scope: &StatusScope,
    ) -> AppResult<Vec<Status>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AppError::TransientNetwork("status store offline".to_owned()));
        }

        Ok(self
            .statuses
            .lock()
            .await
            .get(scope)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_status(
        &self,
        _tenant_id: TenantId,
        status_id: &StatusId,
    ) -> AppResult<Option<Status>> {
        Ok(self
            .statuses
            .lock()
            .await
            .values()
            .flatten()
            .find(|status| status.id() == status_id)
            .cloned())
    }

    async fn create_status(&self, _tenant_id: TenantId, status: Status) -> AppResult<Status> {
        self.statuses
            .lock()
            .await
            .entry(status.scope().clone())
            .or_default()
            .push(status.clone());
        Ok(status)
    }

    async fn update_status(
        &self,
        _tenant_id: TenantId,
        status_id: &StatusId,
        patch: &StatusPatch,
    ) -> AppResult<Status> {
        let mut statuses = self.statuses.lock().await;
        let stored = statuses
            .values_mut()
            .flatten()
            .find(|status| status.id() == status_id)
            .ok_or_else(|| AppError::NotFound(format!("status '{status_id}'")))?;
        *stored = stored.apply_patch(patch)?;
        Ok(stored.clone())
    }

    async fn delete_status(&self, _tenant_id: TenantId, status_id: &StatusId) -> AppResult<()> {
        for statuses in self.statuses.lock().await.values_mut() {
            statuses.retain(|status| status.id() != status_id);
        }
        Ok(())
    }

    async fn save_status_order(
        &self,
        _tenant_id: TenantId,
        scope: &StatusScope,
        ordered_ids: &[StatusId],
    ) -> AppResult<()> {
        self.order_saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_order_save.load(Ordering::SeqCst) {
            return Err(AppError::TransientNetwork("order save dropped".to_owned()));
        }

        let mut statuses = self.statuses.lock().await;
        let current = statuses.get(scope).cloned().unwrap_or_default();
        let reordered = ticketflow_domain::reorder_by_ids(&current, ordered_ids)?;
        statuses.insert(scope.clone(), reordered);
        Ok(())
    }

    async fn count_status_references(
        &self,
        _tenant_id: TenantId,
        status_id: &StatusId,
    ) -> AppResult<u64> {
        Ok(self
            .references
            .lock()
            .await
            .get(status_id)
            .copied()
            .unwrap_or(0))
    }
}

#[derive(Default)]
pub(crate) struct FakeTicketRepository {
    pub(crate) tickets: Mutex<HashMap<TicketId, Ticket>>,
    pub(crate) patch_calls: AtomicUsize,
    pub(crate) fail_fetch: AtomicBool,
    pub(crate) queued_failures: Mutex<VecDeque<AppError>>,
    pub(crate) gate: Mutex<Option<Arc<Notify>>>,
    pub(crate) patch_started: Notify,
    pub(crate) echo_foreign_ticket: AtomicBool,
    pub(crate) stall_forever: AtomicBool,
}

impl FakeTicketRepository {
    pub(crate) fn with_tickets(tickets: Vec<Ticket>) -> Self {
        let repository = Self::default();
        repository
            .tickets
            .try_lock()
            .map(|mut stored| {
                stored.extend(
                    tickets
                        .into_iter()
                        .map(|ticket| (ticket.id().clone(), ticket)),
                );
            })
            .unwrap_or_else(|_| panic!("fresh fake repository must not be locked"));
        repository
    }

    pub(crate) async fn hold_patches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().await = Some(gate.clone());
        gate
    }

    pub(crate) async fn fail_next_patch(&self, error: AppError) {
        self.queued_failures.lock().await.push_back(error);
    }

    pub(crate) fn patch_count(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TicketRepository for FakeTicketRepository {
    async fn fetch_tickets(
        &self,
        _tenant_id: TenantId,
        filter: &TicketFilter,
    ) -> AppResult<Vec<Ticket>> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AppError::TransientNetwork("ticket store offline".to_owned()));
        }

        Ok(self
            .tickets
            .lock()
            .await
            .values()
            .filter(|ticket| filter.matches(ticket))
            .cloned()
            .collect())
    }

    async fn find_ticket(
        &self,
        _tenant_id: TenantId,
        ticket_id: &TicketId,
    ) -> AppResult<Option<Ticket>> {
        Ok(self.tickets.lock().await.get(ticket_id).cloned())
    }

    async fn create_ticket(&self, _tenant_id: TenantId, ticket: Ticket) -> AppResult<Ticket> {
        self.tickets
            .lock()
            .await
            .insert(ticket.id().clone(), ticket.clone());
        Ok(ticket)
    }

    async fn patch_ticket(
        &self,
        _tenant_id: TenantId,
        ticket_id: &TicketId,
        patch: &TicketPatch,
    ) -> AppResult<Ticket> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        self.patch_started.notify_one();

        if self.stall_forever.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let gate = self.gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if let Some(error) = self.queued_failures.lock().await.pop_front() {
            return Err(error);
        }

        let mut tickets = self.tickets.lock().await;
        let stored = tickets
            .get(ticket_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("ticket '{ticket_id}'")))?;
        let patched = stored.apply_patch(patch, Utc::now())?;
        tickets.insert(ticket_id.clone(), patched.clone());

        if self.echo_foreign_ticket.load(Ordering::SeqCst) {
            return Ok(ticket("someone-else", "open", "nobody", None));
        }

        Ok(patched)
    }
}

pub(crate) struct Harness {
    pub(crate) statuses: Arc<FakeStatusRepository>,
    pub(crate) tickets: Arc<FakeTicketRepository>,
    pub(crate) events: BoardEvents,
    pub(crate) registry: StatusRegistry,
    pub(crate) store: TicketStore,
}

/// Builds registry and store over fakes seeded with `[open, doing, done]`.
pub(crate) fn harness(tickets: Vec<Ticket>) -> Harness {
    let statuses = Arc::new(FakeStatusRepository::with_global(vec![
        status("open", 0, StatusScope::Global),
        status("doing", 1, StatusScope::Global),
        status("done", 2, StatusScope::Global),
    ]));
    let tickets = Arc::new(FakeTicketRepository::with_tickets(tickets));
    let events = BoardEvents::default();
    let authorization_service = AuthorizationService::default();
    let registry = StatusRegistry::new(
        authorization_service.clone(),
        statuses.clone(),
        events.clone(),
    );
    let store = TicketStore::new(
        authorization_service,
        tickets.clone(),
        registry.clone(),
        events.clone(),
    );

    Harness {
        statuses,
        tickets,
        events,
        registry,
        store,
    }
}
