//! Application services and ports.

#![forbid(unsafe_code)]

mod authorization_service;
mod board_events;
mod board_ports;
mod board_synchronizer;
mod drag_controller;
mod keyed_locks;
mod status_registry;
mod ticket_store;

#[cfg(test)]
mod test_fakes;

pub use authorization_service::AuthorizationService;
pub use board_events::{BoardEvent, BoardEvents};
pub use board_ports::{
    CreateStatusInput, CreateTicketInput, StatusRepository, TicketChangeSink, TicketRepository,
};
pub use board_synchronizer::{BoardState, BoardSyncConfig, BoardSynchronizer, MoveOutcome, MoveState};
pub use drag_controller::{
    DragConfig, DragController, DragOutcome, KeyDirection, MoveIntent, PointerPosition,
    PointerTarget,
};
pub use status_registry::StatusRegistry;
pub use ticket_store::TicketStore;
