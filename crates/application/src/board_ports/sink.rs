use ticketflow_core::AppError;
use ticketflow_domain::{Ticket, TicketId};

/// Callback port for surfaces that keep their own copy of the ticket list.
pub trait TicketChangeSink: Send + Sync {
    /// Called with the authoritative ticket once a move is confirmed.
    fn ticket_confirmed(&self, ticket: &Ticket);

    /// Called after a move was rolled back. The owner must restore its own state.
    fn ticket_rolled_back(&self, ticket_id: &TicketId, error: &AppError);
}
