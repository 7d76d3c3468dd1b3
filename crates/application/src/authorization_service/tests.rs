use std::collections::{BTreeMap, BTreeSet};

use ticketflow_core::{AppError, Role};
use ticketflow_domain::{Permission, PermissionGrants};

use crate::test_fakes::{actor, ticket};

use super::AuthorizationService;

#[test]
fn require_permission_allows_granted_role() {
    let service = AuthorizationService::default();
    let mia = actor("mia", Role::Manager);

    let result = service.require_permission(&mia, Permission::StatusesManage);
    assert!(result.is_ok());
}

#[test]
fn require_permission_denies_missing_grant() {
    let service = AuthorizationService::default();
    let alice = actor("alice", Role::User);

    let result = service.require_permission(&alice, Permission::StatusesManage);
    assert!(matches!(result, Err(AppError::PermissionDenied(_))));
}

#[test]
fn custom_grant_table_is_honoured() {
    let service = AuthorizationService::new(PermissionGrants::new(BTreeMap::from([(
        Role::User,
        BTreeSet::from([Permission::StatusesManage]),
    )])));
    let alice = actor("alice", Role::User);
    let mia = actor("mia", Role::Manager);

    assert!(service.has_permission(&alice, Permission::StatusesManage));
    assert!(!service.has_permission(&mia, Permission::StatusesManage));
}

#[test]
fn ticket_access_uses_current_snapshot() {
    let service = AuthorizationService::default();
    let alice = actor("alice", Role::User);
    let assigned = ticket("t1", "open", "bob", Some("alice"));
    let reassigned = ticket("t1", "open", "bob", Some("carol"));

    assert!(service.require_ticket_access(&alice, &assigned).is_ok());
    assert!(matches!(
        service.require_ticket_access(&alice, &reassigned),
        Err(AppError::PermissionDenied(_))
    ));
}

#[test]
fn ticket_edit_requires_edit_grant_or_assignment() {
    let service = AuthorizationService::default();
    let alice = actor("alice", Role::User);
    let mia = actor("mia", Role::Manager);
    let own_unassigned = ticket("t1", "open", "alice", None);

    assert!(service.require_ticket_edit(&alice, &own_unassigned).is_err());
    assert!(service.require_ticket_edit(&mia, &own_unassigned).is_ok());
}
