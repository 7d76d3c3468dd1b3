//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod board;
mod security;
mod status;
mod ticket;

pub use board::{BoardColumn, BoardView};
pub use security::{Permission, PermissionGrants};
pub use status::{
    ProjectId, Status, StatusColor, StatusId, StatusInput, StatusPatch, StatusScope,
    default_statuses, insert_at_order, is_dense_order, renumber, reorder_by_ids,
};
pub use ticket::{
    Ticket, TicketFilter, TicketId, TicketInput, TicketPatch, TicketPriority,
};
