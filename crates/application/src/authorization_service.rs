use std::sync::Arc;

use ticketflow_core::{AppError, AppResult, UserIdentity};
use ticketflow_domain::{Permission, PermissionGrants, Ticket};
use tracing::warn;

/// Application service for role-derived authorization checks.
///
/// Wraps the static grant table so every status and ticket mutation routes
/// through one chokepoint and denials are logged the same way.
#[derive(Clone)]
pub struct AuthorizationService {
    grants: Arc<PermissionGrants>,
}

impl AuthorizationService {
    /// Creates a new authorization service from a grant table.
    #[must_use]
    pub fn new(grants: PermissionGrants) -> Self {
        Self {
            grants: Arc::new(grants),
        }
    }

    /// Returns the grant table backing this service.
    #[must_use]
    pub fn grants(&self) -> &PermissionGrants {
        &self.grants
    }

    /// Ensures the actor's role holds the permission.
    pub fn require_permission(&self, actor: &UserIdentity, permission: Permission) -> AppResult<()> {
        if self.has_permission(actor, permission) {
            return Ok(());
        }

        warn!(
            tenant_id = %actor.tenant_id(),
            subject = %actor.subject(),
            permission = permission.as_str(),
            "permission denied"
        );
        Err(AppError::PermissionDenied(format!(
            "subject '{}' is missing permission '{}' in tenant '{}'",
            actor.subject(),
            permission.as_str(),
            actor.tenant_id()
        )))
    }

    /// Returns whether the actor's role holds the permission.
    #[must_use]
    pub fn has_permission(&self, actor: &UserIdentity, permission: Permission) -> bool {
        self.grants.allows(actor.role(), permission)
    }

    /// Returns whether the actor may see the ticket snapshot.
    #[must_use]
    pub fn can_access_ticket(&self, actor: &UserIdentity, ticket: &Ticket) -> bool {
        self.grants.can_access_ticket(actor, ticket)
    }

    /// Ensures the actor may see the ticket snapshot.
    pub fn require_ticket_access(&self, actor: &UserIdentity, ticket: &Ticket) -> AppResult<()> {
        if self.can_access_ticket(actor, ticket) {
            return Ok(());
        }

        warn!(
            tenant_id = %actor.tenant_id(),
            subject = %actor.subject(),
            ticket_id = %ticket.id(),
            "ticket access denied"
        );
        Err(AppError::PermissionDenied(format!(
            "subject '{}' cannot access ticket '{}'",
            actor.subject(),
            ticket.id()
        )))
    }

    /// Ensures the actor may edit the ticket snapshot.
    pub fn require_ticket_edit(&self, actor: &UserIdentity, ticket: &Ticket) -> AppResult<()> {
        if self.grants.can_edit_ticket(actor, ticket) {
            return Ok(());
        }

        warn!(
            tenant_id = %actor.tenant_id(),
            subject = %actor.subject(),
            ticket_id = %ticket.id(),
            "ticket edit denied"
        );
        Err(AppError::PermissionDenied(format!(
            "subject '{}' cannot edit ticket '{}'",
            actor.subject(),
            ticket.id()
        )))
    }
}

impl Default for AuthorizationService {
    fn default() -> Self {
        Self::new(PermissionGrants::reference())
    }
}

#[cfg(test)]
mod tests;
