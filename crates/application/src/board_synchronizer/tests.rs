use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ticketflow_core::{AppError, AppResult, Role};
use ticketflow_domain::{BoardView, StatusId, StatusScope, Ticket, TicketId, TicketPatch};
use tokio::task::JoinHandle;

use super::{BoardState, BoardSyncConfig, BoardSynchronizer, MoveOutcome, MoveState};
use crate::board_ports::TicketChangeSink;
use crate::test_fakes::{Harness, actor, harness, ids, status_id, tenant, ticket, ticket_id};
use crate::MoveIntent;

fn board(harness: &Harness, role: Role) -> BoardSynchronizer {
    BoardSynchronizer::new(
        actor("mia", role),
        None,
        harness.store.clone(),
        BoardSyncConfig::default(),
    )
}

async fn loaded_board(harness: &Harness, role: Role) -> BoardSynchronizer {
    let board = board(harness, role);
    board
        .load()
        .await
        .unwrap_or_else(|error| panic!("board must load: {error}"));
    board
}

async fn ready_view(board: &BoardSynchronizer) -> BoardView {
    match board.list_board_columns().await {
        BoardState::Ready(view) => view,
        BoardState::Loading => panic!("board must be loaded"),
    }
}

async fn column_of(board: &BoardSynchronizer, id: &str) -> Option<StatusId> {
    ready_view(board).await.column_of(&ticket_id(id)).cloned()
}

async fn cached_ticket(harness: &Harness, id: &str) -> Ticket {
    harness
        .store
        .cached(tenant(), &ticket_id(id))
        .await
        .unwrap_or_else(|| panic!("ticket '{id}' must be cached"))
}

fn spawn_move(
    board: &BoardSynchronizer,
    id: &str,
    target: &str,
) -> JoinHandle<AppResult<MoveOutcome>> {
    let board = board.clone();
    let ticket_id = ticket_id(id);
    let target = status_id(target);
    tokio::spawn(async move { board.move_ticket(&ticket_id, &target).await })
}

async fn yield_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

async fn join(handle: JoinHandle<AppResult<MoveOutcome>>) -> AppResult<MoveOutcome> {
    handle
        .await
        .unwrap_or_else(|error| panic!("move task panicked: {error}"))
}

#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TicketChangeSink for RecordingSink {
    fn ticket_confirmed(&self, ticket: &Ticket) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("confirmed {} {}", ticket.id(), ticket.status_id()));
    }

    fn ticket_rolled_back(&self, ticket_id: &TicketId, _error: &AppError) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("rolled back {ticket_id}"));
    }
}

#[tokio::test]
async fn board_stays_loading_until_statuses_and_tickets_arrive() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = board(&harness, Role::Manager);
    assert_eq!(board.list_board_columns().await, BoardState::Loading);

    board.refresh_statuses().await;
    assert_eq!(board.list_board_columns().await, BoardState::Loading);

    assert!(board.refresh_tickets().await.is_ok());
    let view = ready_view(&board).await;
    assert_eq!(view.columns().len(), 3);
    assert_eq!(view.column_of(&ticket_id("t1")), Some(&status_id("open")));
}

#[tokio::test]
async fn tickets_with_unknown_status_are_left_out() {
    let harness = harness(vec![
        ticket("t1", "open", "bob", None),
        ticket("t2", "archived", "bob", None),
    ]);
    let board = loaded_board(&harness, Role::Manager).await;

    let view = ready_view(&board).await;
    assert_eq!(view.column_of(&ticket_id("t2")), None);
    assert_eq!(view.column_of(&ticket_id("t1")), Some(&status_id("open")));
}

#[tokio::test]
async fn moving_to_current_status_dispatches_nothing() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    let before = cached_ticket(&harness, "t1").await;

    let outcome = board.move_ticket(&ticket_id("t1"), &status_id("open")).await;
    assert_eq!(outcome.ok(), Some(MoveOutcome::Unchanged));
    assert_eq!(harness.tickets.patch_count(), 0);
    assert_eq!(cached_ticket(&harness, "t1").await.updated_at(), before.updated_at());
    assert_eq!(board.move_state(&ticket_id("t1")).await, MoveState::Idle);
}

#[tokio::test]
async fn move_is_visible_immediately_and_confirmed_later() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    let before = cached_ticket(&harness, "t1").await;
    let gate = harness.tickets.hold_patches().await;

    let handle = spawn_move(&board, "t1", "done");
    harness.tickets.patch_started.notified().await;

    assert_eq!(column_of(&board, "t1").await, Some(status_id("done")));
    assert_eq!(
        board.move_state(&ticket_id("t1")).await,
        MoveState::OptimisticallyApplied
    );
    assert!(board.is_updating());

    gate.notify_one();
    let outcome = join(handle).await;
    let confirmed = match outcome {
        Ok(MoveOutcome::Confirmed(ticket)) => ticket,
        other => panic!("expected confirmation, got {other:?}"),
    };

    assert_eq!(confirmed.status_id(), &status_id("done"));
    assert!(confirmed.updated_at() > before.updated_at());
    assert_eq!(column_of(&board, "t1").await, Some(status_id("done")));
    assert_eq!(board.move_state(&ticket_id("t1")).await, MoveState::Confirmed);
    assert!(!board.is_updating());
}

#[tokio::test]
async fn failed_move_rolls_back_and_reports_error() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    harness
        .tickets
        .fail_next_patch(AppError::Validation("status transition rejected".to_owned()))
        .await;

    let result = board.move_ticket(&ticket_id("t1"), &status_id("done")).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(harness.tickets.patch_count(), 1);
    assert_eq!(column_of(&board, "t1").await, Some(status_id("open")));
    assert_eq!(board.move_state(&ticket_id("t1")).await, MoveState::RolledBack);
    assert!(!board.is_updating());
}

#[tokio::test]
async fn transient_failure_is_retried_once() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    harness
        .tickets
        .fail_next_patch(AppError::TransientNetwork("connection reset".to_owned()))
        .await;

    let result = board.move_ticket(&ticket_id("t1"), &status_id("doing")).await;
    assert!(matches!(result, Ok(MoveOutcome::Confirmed(_))));
    assert_eq!(harness.tickets.patch_count(), 2);
}

#[tokio::test]
async fn repeated_transient_failure_rolls_back() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    for _ in 0..2 {
        harness
            .tickets
            .fail_next_patch(AppError::TransientNetwork("connection reset".to_owned()))
            .await;
    }

    let result = board.move_ticket(&ticket_id("t1"), &status_id("doing")).await;
    assert!(matches!(result, Err(AppError::TransientNetwork(_))));
    assert_eq!(harness.tickets.patch_count(), 2);
    assert_eq!(column_of(&board, "t1").await, Some(status_id("open")));
}

#[tokio::test(start_paused = true)]
async fn timed_out_move_is_rolled_back() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = BoardSynchronizer::new(
        actor("mia", Role::Manager),
        None,
        harness.store.clone(),
        BoardSyncConfig {
            persist_timeout: Duration::from_millis(250),
            transient_retries: 0,
        },
    );
    board
        .load()
        .await
        .unwrap_or_else(|error| panic!("board must load: {error}"));
    harness.tickets.stall_forever.store(true, Ordering::SeqCst);

    let result = board.move_ticket(&ticket_id("t1"), &status_id("done")).await;
    assert!(matches!(result, Err(AppError::TransientNetwork(_))));
    assert_eq!(column_of(&board, "t1").await, Some(status_id("open")));
    assert_eq!(board.move_state(&ticket_id("t1")).await, MoveState::RolledBack);
}

#[tokio::test]
async fn acknowledgement_for_another_ticket_is_rolled_back() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    harness
        .tickets
        .echo_foreign_ticket
        .store(true, Ordering::SeqCst);

    let result = board.move_ticket(&ticket_id("t1"), &status_id("done")).await;
    assert!(matches!(result, Err(AppError::Internal(_))));
    assert_eq!(column_of(&board, "t1").await, Some(status_id("open")));
}

#[tokio::test]
async fn moves_of_same_ticket_are_serialized() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    let gate = harness.tickets.hold_patches().await;

    let first = spawn_move(&board, "t1", "doing");
    yield_until(|| harness.tickets.patch_count() == 1).await;
    let second = spawn_move(&board, "t1", "done");
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(harness.tickets.patch_count(), 1);
    assert_eq!(column_of(&board, "t1").await, Some(status_id("doing")));

    while !first.is_finished() {
        gate.notify_one();
        tokio::task::yield_now().await;
    }
    assert!(matches!(join(first).await, Ok(MoveOutcome::Confirmed(_))));

    while !second.is_finished() {
        gate.notify_one();
        tokio::task::yield_now().await;
    }
    assert!(matches!(join(second).await, Ok(MoveOutcome::Confirmed(_))));
    assert_eq!(harness.tickets.patch_count(), 2);
    assert_eq!(column_of(&board, "t1").await, Some(status_id("done")));
}

#[tokio::test]
async fn moves_of_different_tickets_run_concurrently() {
    let harness = harness(vec![
        ticket("t1", "open", "bob", None),
        ticket("t2", "open", "bob", None),
    ]);
    let board = loaded_board(&harness, Role::Manager).await;
    let updating = board.subscribe_updating();
    let gate = harness.tickets.hold_patches().await;

    let first = spawn_move(&board, "t1", "doing");
    let second = spawn_move(&board, "t2", "done");
    yield_until(|| harness.tickets.patch_count() == 2).await;
    assert_eq!(*updating.borrow(), 2);

    while !(first.is_finished() && second.is_finished()) {
        gate.notify_one();
        tokio::task::yield_now().await;
    }
    assert!(matches!(join(first).await, Ok(MoveOutcome::Confirmed(_))));
    assert!(matches!(join(second).await, Ok(MoveOutcome::Confirmed(_))));
    assert_eq!(*updating.borrow(), 0);
}

#[tokio::test]
async fn refresh_during_move_keeps_optimistic_copy() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    let gate = harness.tickets.hold_patches().await;

    let handle = spawn_move(&board, "t1", "done");
    harness.tickets.patch_started.notified().await;
    assert!(board.refresh_tickets().await.is_ok());
    assert_eq!(column_of(&board, "t1").await, Some(status_id("done")));

    gate.notify_one();
    assert!(matches!(join(handle).await, Ok(MoveOutcome::Confirmed(_))));
}

#[tokio::test]
async fn rollback_refetches_when_ticket_changed_meanwhile() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    let gate = harness.tickets.hold_patches().await;
    harness
        .tickets
        .fail_next_patch(AppError::Conflict("ticket was edited elsewhere".to_owned()))
        .await;

    let handle = spawn_move(&board, "t1", "done");
    harness.tickets.patch_started.notified().await;

    let edited_elsewhere = ticket("t1", "doing", "bob", Some("carol"));
    harness
        .tickets
        .tickets
        .lock()
        .await
        .insert(ticket_id("t1"), edited_elsewhere.clone());
    harness.store.replace(tenant(), edited_elsewhere).await;

    gate.notify_one();
    assert!(matches!(join(handle).await, Err(AppError::Conflict(_))));

    let reconciled = cached_ticket(&harness, "t1").await;
    assert_eq!(reconciled.status_id(), &status_id("doing"));
    assert_eq!(reconciled.assignee(), Some("carol"));
}

#[tokio::test]
async fn close_discards_late_results_for_the_board() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let sink = Arc::new(RecordingSink::default());
    let board = loaded_board(&harness, Role::Manager)
        .await
        .with_change_sink(sink.clone());
    let gate = harness.tickets.hold_patches().await;

    let handle = spawn_move(&board, "t1", "done");
    harness.tickets.patch_started.notified().await;
    board.close();
    gate.notify_one();

    assert_eq!(join(handle).await.ok(), Some(MoveOutcome::Discarded));
    assert!(sink.calls().is_empty());
    assert_eq!(
        board.move_state(&ticket_id("t1")).await,
        MoveState::OptimisticallyApplied
    );
    assert_eq!(
        cached_ticket(&harness, "t1").await.status_id(),
        &status_id("done")
    );
    assert!(!board.is_updating());

    let after_close = board.move_ticket(&ticket_id("t1"), &status_id("open")).await;
    assert!(matches!(after_close, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn change_sink_hears_confirmations_and_rollbacks() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let sink = Arc::new(RecordingSink::default());
    let board = loaded_board(&harness, Role::Manager)
        .await
        .with_change_sink(sink.clone());

    assert!(
        board
            .move_ticket(&ticket_id("t1"), &status_id("doing"))
            .await
            .is_ok()
    );
    harness
        .tickets
        .fail_next_patch(AppError::Validation("rejected".to_owned()))
        .await;
    assert!(
        board
            .move_ticket(&ticket_id("t1"), &status_id("done"))
            .await
            .is_err()
    );

    assert_eq!(
        sink.calls(),
        vec!["confirmed t1 doing".to_owned(), "rolled back t1".to_owned()]
    );
}

#[tokio::test]
async fn user_cannot_move_foreign_ticket() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = BoardSynchronizer::new(
        actor("alice", Role::User),
        None,
        harness.store.clone(),
        BoardSyncConfig::default(),
    );

    let result = board.move_ticket(&ticket_id("t1"), &status_id("done")).await;
    assert!(matches!(result, Err(AppError::PermissionDenied(_))));
    assert_eq!(harness.tickets.patch_count(), 0);
}

#[tokio::test]
async fn move_to_invisible_status_is_rejected_before_dispatch() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;

    let result = board
        .apply_intent(&MoveIntent {
            ticket_id: ticket_id("t1"),
            target_status_id: status_id("archived"),
        })
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(harness.tickets.patch_count(), 0);
    assert_eq!(board.move_state(&ticket_id("t1")).await, MoveState::Idle);
}

#[tokio::test]
async fn reorder_changes_column_order() {
    let harness = harness(Vec::new());
    let board = loaded_board(&harness, Role::Manager).await;

    let reordered = board
        .reorder_statuses(&[status_id("doing"), status_id("open"), status_id("done")])
        .await;
    assert!(reordered.is_ok());

    let view = ready_view(&board).await;
    let order: Vec<(&str, u32)> = view
        .columns()
        .iter()
        .map(|column| (column.status.id().as_str(), column.status.order()))
        .collect();
    assert_eq!(order, vec![("doing", 0), ("open", 1), ("done", 2)]);
}

#[tokio::test]
async fn edit_ticket_goes_through_store_checks() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;

    let edited = board
        .edit_ticket(
            &ticket_id("t1"),
            TicketPatch {
                title: Some("Badge reader offline".to_owned()),
                ..TicketPatch::default()
            },
        )
        .await
        .unwrap_or_else(|error| panic!("edit must succeed: {error}"));
    assert_eq!(edited.title().as_str(), "Badge reader offline");
}

#[tokio::test]
async fn boards_sharing_a_store_serialize_moves_of_one_ticket() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let first_board = loaded_board(&harness, Role::Manager).await;
    let second_board = loaded_board(&harness, Role::Manager).await;
    let gate = harness.tickets.hold_patches().await;

    let first = spawn_move(&first_board, "t1", "doing");
    yield_until(|| harness.tickets.patch_count() == 1).await;
    let second = spawn_move(&second_board, "t1", "done");
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(harness.tickets.patch_count(), 1);
    assert_eq!(column_of(&second_board, "t1").await, Some(status_id("doing")));

    while !first.is_finished() {
        gate.notify_one();
        tokio::task::yield_now().await;
    }
    assert!(matches!(join(first).await, Ok(MoveOutcome::Confirmed(_))));

    yield_until(|| harness.tickets.patch_count() == 2).await;
    assert!(first_board.refresh_tickets().await.is_ok());
    assert_eq!(column_of(&first_board, "t1").await, Some(status_id("done")));

    while !second.is_finished() {
        gate.notify_one();
        tokio::task::yield_now().await;
    }
    assert!(matches!(join(second).await, Ok(MoveOutcome::Confirmed(_))));
    assert_eq!(harness.tickets.patch_count(), 2);
    assert_eq!(
        cached_ticket(&harness, "t1").await.status_id(),
        &status_id("done")
    );
}

#[tokio::test]
async fn store_edit_waits_for_a_board_move_of_the_same_ticket() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    let gate = harness.tickets.hold_patches().await;

    let moving = spawn_move(&board, "t1", "done");
    harness.tickets.patch_started.notified().await;

    let store = harness.store.clone();
    let editing = tokio::spawn(async move {
        store
            .patch(
                &actor("mia", Role::Manager),
                &ticket_id("t1"),
                TicketPatch {
                    title: Some("Badge reader offline".to_owned()),
                    ..TicketPatch::default()
                },
            )
            .await
    });
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert!(!editing.is_finished());
    assert_eq!(harness.tickets.patch_count(), 1);

    while !(moving.is_finished() && editing.is_finished()) {
        gate.notify_one();
        tokio::task::yield_now().await;
    }
    assert!(matches!(join(moving).await, Ok(MoveOutcome::Confirmed(_))));
    let edited = editing
        .await
        .unwrap_or_else(|error| panic!("edit task panicked: {error}"))
        .unwrap_or_else(|error| panic!("edit must succeed: {error}"));

    assert_eq!(edited.status_id(), &status_id("done"));
    assert_eq!(edited.title().as_str(), "Badge reader offline");
    assert_eq!(harness.tickets.patch_count(), 2);
}

#[tokio::test]
async fn status_targeted_by_a_move_in_flight_cannot_be_deleted() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    let manager = actor("mia", Role::Manager);
    let gate = harness.tickets.hold_patches().await;

    let moving = spawn_move(&board, "t1", "done");
    harness.tickets.patch_started.notified().await;

    let deleted = harness
        .registry
        .delete_status(&manager, &status_id("done"))
        .await;
    assert!(matches!(deleted, Err(AppError::Conflict(_))));

    gate.notify_one();
    assert!(matches!(join(moving).await, Ok(MoveOutcome::Confirmed(_))));

    let statuses = harness
        .registry
        .list_statuses(&manager, &StatusScope::Global)
        .await;
    assert_eq!(ids(&statuses), vec!["open", "doing", "done"]);
    assert_eq!(column_of(&board, "t1").await, Some(status_id("done")));
}

#[tokio::test]
async fn edit_to_current_status_is_not_dispatched() {
    let harness = harness(vec![ticket("t1", "open", "bob", None)]);
    let board = loaded_board(&harness, Role::Manager).await;
    let before = cached_ticket(&harness, "t1").await;

    let edited = board
        .edit_ticket(&ticket_id("t1"), TicketPatch::status(status_id("open")))
        .await
        .unwrap_or_else(|error| panic!("edit must succeed: {error}"));

    assert_eq!(edited.updated_at(), before.updated_at());
    assert_eq!(harness.tickets.patch_count(), 0);
    assert_eq!(cached_ticket(&harness, "t1").await, before);
}

#[tokio::test]
async fn refresh_forgets_move_state_of_departed_tickets() {
    let harness = harness(vec![
        ticket("t1", "open", "bob", None),
        ticket("t2", "open", "bob", None),
    ]);
    let board = loaded_board(&harness, Role::Manager).await;
    for id in ["t1", "t2"] {
        assert!(
            board
                .move_ticket(&ticket_id(id), &status_id("doing"))
                .await
                .is_ok()
        );
    }

    harness.tickets.tickets.lock().await.remove(&ticket_id("t1"));
    assert!(board.refresh_tickets().await.is_ok());

    assert_eq!(board.move_state(&ticket_id("t1")).await, MoveState::Idle);
    assert_eq!(board.move_state(&ticket_id("t2")).await, MoveState::Confirmed);
    assert_eq!(board.move_states.read().await.len(), 1);
}
