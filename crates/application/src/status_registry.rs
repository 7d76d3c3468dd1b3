use std::collections::HashMap;
use std::sync::Arc;

use ticketflow_core::{AppError, AppResult, TenantId, UserIdentity};
use ticketflow_domain::{
    Permission, ProjectId, Status, StatusId, StatusInput, StatusPatch, StatusScope,
    default_statuses, insert_at_order, renumber, reorder_by_ids,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::board_ports::{CreateStatusInput, StatusRepository};
use crate::keyed_locks::KeyedLocks;
use crate::{AuthorizationService, BoardEvent, BoardEvents};

mod claims;

use claims::{StatusClaim, StatusClaims};

type ScopeKey = (TenantId, StatusScope);

/// Owns the ordered workflow statuses of every scope.
///
/// Order-mutating operations are serialized per scope, so concurrent creates,
/// deletes and reorders never interleave their renumbering passes. The cache
/// is only updated after the persistence collaborator acknowledged the write.
/// A status that a ticket write is moving tickets into cannot be deleted
/// until that write settles.
#[derive(Clone)]
pub struct StatusRegistry {
    authorization_service: AuthorizationService,
    repository: Arc<dyn StatusRepository>,
    events: BoardEvents,
    cache: Arc<RwLock<HashMap<ScopeKey, Vec<Status>>>>,
    scope_locks: KeyedLocks<ScopeKey>,
    claims: StatusClaims,
}

impl StatusRegistry {
    /// Creates a status registry.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn StatusRepository>,
        events: BoardEvents,
    ) -> Self {
        Self {
            authorization_service,
            repository,
            events,
            cache: Arc::new(RwLock::new(HashMap::new())),
            scope_locks: KeyedLocks::default(),
            claims: StatusClaims::default(),
        }
    }

    /// Lists the ordered statuses of one scope.
    ///
    /// Never fails: when the persistence collaborator is unreachable the last
    /// cached list is returned, or the built-in defaults for the global scope.
    pub async fn list_statuses(&self, actor: &UserIdentity, scope: &StatusScope) -> Vec<Status> {
        let tenant_id = actor.tenant_id();
        match self.load_authoritative(tenant_id, scope).await {
            Ok(statuses) => {
                self.store_scope(tenant_id, scope, statuses.clone()).await;
                statuses
            }
            Err(error) => {
                let cached = self.cached_scope(tenant_id, scope).await;
                warn!(
                    tenant_id = %tenant_id,
                    scope = %scope,
                    error = %error,
                    has_cache = cached.is_some(),
                    "status store unreachable, serving fallback statuses"
                );
                cached.unwrap_or_else(|| match scope {
                    StatusScope::Global => default_statuses(),
                    StatusScope::Project(_) => Vec::new(),
                })
            }
        }
    }

    /// Lists the statuses visible in a project: global statuses first, then the project's own.
    pub async fn visible_statuses(
        &self,
        actor: &UserIdentity,
        project_id: Option<&ProjectId>,
    ) -> Vec<Status> {
        let mut statuses = self.list_statuses(actor, &StatusScope::Global).await;
        if let Some(project_id) = project_id {
            statuses.extend(
                self.list_statuses(actor, &StatusScope::Project(project_id.clone()))
                    .await,
            );
        }

        statuses
    }

    /// Returns the cached visible statuses without contacting the persistence collaborator.
    pub async fn cached_visible_statuses(
        &self,
        tenant_id: TenantId,
        project_id: Option<&ProjectId>,
    ) -> Option<Vec<Status>> {
        let cache = self.cache.read().await;
        let mut statuses = cache.get(&(tenant_id, StatusScope::Global))?.clone();
        if let Some(project_id) = project_id {
            if let Some(project_statuses) =
                cache.get(&(tenant_id, StatusScope::Project(project_id.clone())))
            {
                statuses.extend(project_statuses.iter().cloned());
            }
        }

        Some(statuses)
    }

    /// Resolves a status id that must be visible from the given ticket scope.
    pub async fn resolve_visible_status(
        &self,
        actor: &UserIdentity,
        ticket_scope: &StatusScope,
        status_id: &StatusId,
    ) -> AppResult<Status> {
        let project_id = ticket_scope.project_id();
        let cached = self
            .cached_visible_statuses(actor.tenant_id(), project_id)
            .await
            .and_then(|statuses| statuses.into_iter().find(|status| status.id() == status_id));
        if let Some(status) = cached {
            return Ok(status);
        }

        self.visible_statuses(actor, project_id)
            .await
            .into_iter()
            .find(|status| status.id() == status_id)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "status '{status_id}' is not visible in scope '{ticket_scope}'"
                ))
            })
    }

    /// Claims a status for a ticket write, then resolves it from the ticket scope.
    ///
    /// The claim keeps the status from being deleted until it is dropped.
    pub(crate) async fn claim_visible_status(
        &self,
        actor: &UserIdentity,
        ticket_scope: &StatusScope,
        status_id: &StatusId,
    ) -> AppResult<(Status, StatusClaim)> {
        let claim = self.claims.claim(actor.tenant_id(), status_id)?;
        let status = self
            .resolve_visible_status(actor, ticket_scope, status_id)
            .await?;
        Ok((status, claim))
    }

    /// Creates a status at the requested position (default: end) and renumbers the scope.
    pub async fn create_status(
        &self,
        actor: &UserIdentity,
        input: CreateStatusInput,
    ) -> AppResult<Status> {
        self.authorization_service
            .require_permission(actor, Permission::StatusesManage)?;

        let tenant_id = actor.tenant_id();
        let draft = Status::new(StatusInput {
            id: StatusId::generate(),
            label: input.label,
            color: input.color,
            order: 0,
            scope: input.scope.clone(),
        })?;
        let draft_id = draft.id().clone();

        let _scope_guard = self
            .scope_locks
            .lock((tenant_id, input.scope.clone()))
            .await;

        let mut statuses = self.load_authoritative(tenant_id, &input.scope).await?;
        insert_at_order(&mut statuses, draft, input.requested_order);
        let position = statuses
            .iter()
            .position(|status| status.id() == &draft_id)
            .ok_or_else(|| AppError::Internal("inserted status vanished".to_owned()))?;
        let draft = statuses
            .get(position)
            .cloned()
            .ok_or_else(|| AppError::Internal("inserted status vanished".to_owned()))?;

        let created = self.repository.create_status(tenant_id, draft).await?;
        if let Some(slot) = statuses.get_mut(position) {
            *slot = created.clone();
        }
        renumber(&mut statuses);

        if let Err(error) = self.persist_order(tenant_id, &input.scope, &statuses).await {
            self.discard_created(tenant_id, created.id()).await;
            return Err(error);
        }
        self.store_scope(tenant_id, &input.scope, statuses.clone())
            .await;

        let created = statuses
            .into_iter()
            .find(|status| status.id() == created.id())
            .unwrap_or(created);
        info!(
            tenant_id = %tenant_id,
            scope = %input.scope,
            status_id = %created.id(),
            label = %created.label(),
            order = created.order(),
            "status created"
        );

        Ok(created)
    }

    /// Applies label/colour edits. Ordering only changes through [`Self::reorder_statuses`].
    pub async fn update_status(
        &self,
        actor: &UserIdentity,
        status_id: &StatusId,
        patch: StatusPatch,
    ) -> AppResult<Status> {
        self.authorization_service
            .require_permission(actor, Permission::StatusesManage)?;

        let tenant_id = actor.tenant_id();
        let current = self.locate_status(tenant_id, status_id).await?;
        if patch.is_empty() {
            return Ok(current);
        }
        current.apply_patch(&patch)?;

        let scope = current.scope().clone();
        let _scope_guard = self.scope_locks.lock((tenant_id, scope.clone())).await;

        let stored = self
            .repository
            .update_status(tenant_id, status_id, &patch)
            .await?;

        let mut updated = stored.clone();
        let mut cache = self.cache.write().await;
        if let Some(statuses) = cache.get_mut(&(tenant_id, scope.clone())) {
            if let Some(slot) = statuses.iter_mut().find(|status| status.id() == status_id) {
                *slot = stored;
            }
            // cached position wins over the echoed order
            renumber(statuses);
            if let Some(cached) = statuses.iter().find(|status| status.id() == status_id) {
                debug!(status_id = %status_id, order = cached.order(), "status patched in cache");
                updated = cached.clone();
            }
        }
        drop(cache);

        self.events
            .publish(BoardEvent::StatusSetChanged { tenant_id, scope });
        info!(tenant_id = %tenant_id, status_id = %status_id, "status updated");

        Ok(updated)
    }

    /// Reorders a scope to exactly the given id sequence, assigning `order = index`.
    ///
    /// The id set must equal the scope's current id set. On any failure the
    /// previous order stays in place.
    pub async fn reorder_statuses(
        &self,
        actor: &UserIdentity,
        scope: &StatusScope,
        ordered_ids: &[StatusId],
    ) -> AppResult<Vec<Status>> {
        self.authorization_service
            .require_permission(actor, Permission::StatusesManage)?;

        let tenant_id = actor.tenant_id();
        let _scope_guard = self.scope_locks.lock((tenant_id, scope.clone())).await;

        let current = self.load_authoritative(tenant_id, scope).await?;
        let reordered = reorder_by_ids(&current, ordered_ids)?;

        self.repository
            .save_status_order(tenant_id, scope, ordered_ids)
            .await?;
        self.store_scope(tenant_id, scope, reordered.clone()).await;

        info!(
            tenant_id = %tenant_id,
            scope = %scope,
            count = reordered.len(),
            "statuses reordered"
        );

        Ok(reordered)
    }

    /// Deletes a status and renumbers the remaining statuses of its scope.
    ///
    /// Rejected with a conflict while any ticket still references the status,
    /// or while a ticket write that targets it is in flight.
    pub async fn delete_status(&self, actor: &UserIdentity, status_id: &StatusId) -> AppResult<()> {
        self.authorization_service
            .require_permission(actor, Permission::StatusesManage)?;

        let tenant_id = actor.tenant_id();
        let scope = self
            .locate_status(tenant_id, status_id)
            .await?
            .scope()
            .clone();
        let _scope_guard = self.scope_locks.lock((tenant_id, scope.clone())).await;
        let _deleting = self.claims.begin_delete(tenant_id, status_id)?;

        let mut statuses = self.load_authoritative(tenant_id, &scope).await?;
        if !statuses.iter().any(|status| status.id() == status_id) {
            return Err(AppError::NotFound(format!(
                "status '{status_id}' does not exist in scope '{scope}'"
            )));
        }

        let references = self
            .repository
            .count_status_references(tenant_id, status_id)
            .await?;
        if references > 0 {
            return Err(AppError::Conflict(format!(
                "status '{status_id}' is still used by {references} ticket(s); reassign them before deleting"
            )));
        }

        self.repository.delete_status(tenant_id, status_id).await?;
        statuses.retain(|status| status.id() != status_id);
        renumber(&mut statuses);

        self.persist_order(tenant_id, &scope, &statuses).await?;
        self.store_scope(tenant_id, &scope, statuses).await;

        info!(tenant_id = %tenant_id, scope = %scope, status_id = %status_id, "status deleted");
        Ok(())
    }

    async fn load_authoritative(
        &self,
        tenant_id: TenantId,
        scope: &StatusScope,
    ) -> AppResult<Vec<Status>> {
        let mut statuses = self.repository.fetch_statuses(tenant_id, scope).await?;
        statuses.sort_by_key(Status::order);
        renumber(&mut statuses);
        Ok(statuses)
    }

    async fn persist_order(
        &self,
        tenant_id: TenantId,
        scope: &StatusScope,
        statuses: &[Status],
    ) -> AppResult<()> {
        let ordered_ids: Vec<StatusId> = statuses.iter().map(|status| status.id().clone()).collect();
        if let Err(error) = self
            .repository
            .save_status_order(tenant_id, scope, &ordered_ids)
            .await
        {
            warn!(
                tenant_id = %tenant_id,
                scope = %scope,
                error = %error,
                "failed to persist status order, dropping cached scope"
            );
            self.cache.write().await.remove(&(tenant_id, scope.clone()));
            self.events.publish(BoardEvent::StatusSetChanged {
                tenant_id,
                scope: scope.clone(),
            });
            return Err(error);
        }

        Ok(())
    }

    async fn locate_status(&self, tenant_id: TenantId, status_id: &StatusId) -> AppResult<Status> {
        let cached = self
            .cache
            .read()
            .await
            .iter()
            .filter(|((stored_tenant_id, _), _)| *stored_tenant_id == tenant_id)
            .flat_map(|(_, statuses)| statuses.iter())
            .find(|status| status.id() == status_id)
            .cloned();
        if let Some(status) = cached {
            return Ok(status);
        }

        self.repository
            .find_status(tenant_id, status_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("status '{status_id}' does not exist")))
    }

    async fn cached_scope(&self, tenant_id: TenantId, scope: &StatusScope) -> Option<Vec<Status>> {
        self.cache
            .read()
            .await
            .get(&(tenant_id, scope.clone()))
            .cloned()
    }

    async fn store_scope(&self, tenant_id: TenantId, scope: &StatusScope, statuses: Vec<Status>) {
        let previous = self
            .cache
            .write()
            .await
            .insert((tenant_id, scope.clone()), statuses.clone());

        if previous.as_ref() != Some(&statuses) {
            self.events.publish(BoardEvent::StatusSetChanged {
                tenant_id,
                scope: scope.clone(),
            });
        }
    }

    /// Removes a status whose order could not be saved, so the failed create leaves nothing behind.
    async fn discard_created(&self, tenant_id: TenantId, status_id: &StatusId) {
        if let Err(error) = self.repository.delete_status(tenant_id, status_id).await {
            warn!(
                tenant_id = %tenant_id,
                status_id = %status_id,
                error = %error,
                "could not remove status after failed order save"
            );
        }
    }
}
