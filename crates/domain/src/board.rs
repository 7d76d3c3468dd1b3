use serde::{Deserialize, Serialize};

use crate::{Status, StatusId, Ticket, TicketId};

/// Tickets grouped under one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardColumn {
    /// Column status.
    pub status: Status,
    /// Tickets currently in the status.
    pub tickets: Vec<Ticket>,
}

/// Read-only projection of tickets grouped by visible status.
///
/// Tickets that reference a status not present in `statuses` are left out
/// until the status data lands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardView {
    columns: Vec<BoardColumn>,
}

impl BoardView {
    /// Groups tickets under the statuses in the given column order.
    #[must_use]
    pub fn project(statuses: &[Status], tickets: &[Ticket]) -> Self {
        let columns = statuses
            .iter()
            .map(|status| BoardColumn {
                status: status.clone(),
                tickets: tickets
                    .iter()
                    .filter(|ticket| ticket.status_id() == status.id())
                    .cloned()
                    .collect(),
            })
            .collect();

        Self { columns }
    }

    /// Returns the columns in display order.
    #[must_use]
    pub fn columns(&self) -> &[BoardColumn] {
        self.columns.as_slice()
    }

    /// Returns one column by status id.
    #[must_use]
    pub fn column(&self, status_id: &StatusId) -> Option<&BoardColumn> {
        self.columns
            .iter()
            .find(|column| column.status.id() == status_id)
    }

    /// Returns the status id of the column currently showing the ticket.
    #[must_use]
    pub fn column_of(&self, ticket_id: &TicketId) -> Option<&StatusId> {
        self.columns
            .iter()
            .find(|column| column.tickets.iter().any(|ticket| ticket.id() == ticket_id))
            .map(|column| column.status.id())
    }
}
