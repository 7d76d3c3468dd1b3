use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ticketflow_core::{AppError, Role, UserIdentity};

use crate::Ticket;

/// Actions enforced by application policy checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Allows opening new tickets.
    TicketsCreate,
    /// Allows reading tickets the actor created or is assigned to.
    TicketsView,
    /// Allows reading every ticket in the tenant.
    TicketsViewAll,
    /// Allows editing any ticket, including status moves.
    TicketsEdit,
    /// Allows changing ticket assignees.
    TicketsAssign,
    /// Allows deleting tickets.
    TicketsDelete,
    /// Allows creating, editing, reordering and deleting workflow statuses.
    StatusesManage,
    /// Allows listing tenant users.
    UsersView,
    /// Allows managing tenant users.
    UsersManage,
    /// Allows reading tenant settings.
    SettingsView,
    /// Allows changing tenant settings.
    SettingsManage,
    /// Allows reading reports.
    ReportsView,
}

impl Permission {
    /// Returns a stable storage value for this permission.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TicketsCreate => "tickets.create",
            Self::TicketsView => "tickets.view",
            Self::TicketsViewAll => "tickets.view_all",
            Self::TicketsEdit => "tickets.edit",
            Self::TicketsAssign => "tickets.assign",
            Self::TicketsDelete => "tickets.delete",
            Self::StatusesManage => "statuses.manage",
            Self::UsersView => "users.view",
            Self::UsersManage => "users.manage",
            Self::SettingsView => "settings.view",
            Self::SettingsManage => "settings.manage",
            Self::ReportsView => "reports.view",
        }
    }

    /// Returns all known permissions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Permission] = &[
            Permission::TicketsCreate,
            Permission::TicketsView,
            Permission::TicketsViewAll,
            Permission::TicketsEdit,
            Permission::TicketsAssign,
            Permission::TicketsDelete,
            Permission::StatusesManage,
            Permission::UsersView,
            Permission::UsersManage,
            Permission::SettingsView,
            Permission::SettingsManage,
            Permission::ReportsView,
        ];

        ALL
    }

    /// Parses a transport value into a permission.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

impl FromStr for Permission {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|permission| permission.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown permission value '{value}'")))
    }
}

/// Static role to permission table, fixed at process start.
///
/// This is the single authorization chokepoint consulted by every mutating
/// status and ticket operation. All checks fail closed: a missing role or an
/// unknown action string is never allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrants {
    grants: BTreeMap<Role, BTreeSet<Permission>>,
}

impl PermissionGrants {
    /// Builds a grant table from explicit role grants.
    #[must_use]
    pub fn new(grants: BTreeMap<Role, BTreeSet<Permission>>) -> Self {
        Self { grants }
    }

    /// Returns the reference grant table shipped with the product.
    #[must_use]
    pub fn reference() -> Self {
        let user: BTreeSet<Permission> = [
            Permission::TicketsCreate,
            Permission::TicketsView,
            Permission::SettingsView,
        ]
        .into_iter()
        .collect();

        let mut manager = user.clone();
        manager.extend([
            Permission::TicketsViewAll,
            Permission::TicketsEdit,
            Permission::TicketsAssign,
            Permission::StatusesManage,
            Permission::UsersView,
            Permission::ReportsView,
        ]);

        let administrator: BTreeSet<Permission> = Permission::all().iter().copied().collect();

        Self::new(BTreeMap::from([
            (Role::User, user),
            (Role::Manager, manager),
            (Role::Administrator, administrator),
        ]))
    }

    /// Returns the permissions granted to a role.
    pub fn permissions_for(&self, role: Role) -> impl Iterator<Item = Permission> + '_ {
        self.grants
            .get(&role)
            .into_iter()
            .flat_map(|permissions| permissions.iter().copied())
    }

    /// Returns whether the role holds the permission.
    #[must_use]
    pub fn allows(&self, role: Option<Role>, permission: Permission) -> bool {
        role.and_then(|role| self.grants.get(&role))
            .is_some_and(|permissions| permissions.contains(&permission))
    }

    /// Returns whether the role may perform the action named by a transport string.
    #[must_use]
    pub fn can_perform(&self, role: Option<Role>, action: &str) -> bool {
        Permission::from_str(action).is_ok_and(|permission| self.allows(role, permission))
    }

    /// Returns whether the actor may see the ticket.
    ///
    /// Must be called with the current ticket snapshot.
    #[must_use]
    pub fn can_access_ticket(&self, actor: &UserIdentity, ticket: &Ticket) -> bool {
        if actor.role().is_none() {
            return false;
        }

        self.allows(actor.role(), Permission::TicketsViewAll)
            || ticket.is_assigned_to(actor.subject())
            || ticket.created_by() == actor.subject()
    }

    /// Returns whether the actor may edit the ticket.
    ///
    /// Must be called with the current ticket snapshot.
    #[must_use]
    pub fn can_edit_ticket(&self, actor: &UserIdentity, ticket: &Ticket) -> bool {
        if actor.role().is_none() {
            return false;
        }

        self.allows(actor.role(), Permission::TicketsEdit) || ticket.is_assigned_to(actor.subject())
    }

    /// Returns whether every role holds at least the permissions of every lower role.
    #[must_use]
    pub fn is_monotonic(&self) -> bool {
        Role::all().windows(2).all(|pair| match pair {
            [lower, higher] => self
                .permissions_for(*lower)
                .all(|permission| self.allows(Some(*higher), permission)),
            _ => true,
        })
    }
}

impl Default for PermissionGrants {
    fn default() -> Self {
        Self::reference()
    }
}
