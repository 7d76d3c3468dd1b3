use clap::{Parser, Subcommand};
use ticketflow_domain::{StatusId, TicketId};

#[derive(Debug, Parser)]
#[command(
    name = "ticketflow-board",
    version,
    about = "Ticket board with optimistic moves"
)]
pub struct BoardCli {
    #[command(subcommand)]
    command: Option<BoardCommand>,
}

impl BoardCli {
    /// Returns the requested command. No subcommand means `columns`.
    pub fn command(self) -> BoardCommand {
        self.command.unwrap_or(BoardCommand::Columns)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum BoardCommand {
    /// Print the board columns with their tickets.
    Columns,
    /// Print the visible statuses in order.
    Statuses,
    /// Move a ticket to another status.
    Move {
        #[arg(value_parser = parse_ticket_id)]
        ticket_id: TicketId,
        #[arg(value_parser = parse_status_id)]
        status_id: StatusId,
    },
    /// Reorder the statuses of one scope.
    Reorder {
        /// Every status id of the scope, comma separated, in the new order.
        #[arg(
            value_name = "ID,ID,...",
            value_delimiter = ',',
            num_args = 1..,
            required = true,
            value_parser = parse_status_id
        )]
        ordered_ids: Vec<StatusId>,
    },
}

fn parse_ticket_id(raw: &str) -> Result<TicketId, String> {
    TicketId::new(raw.trim()).map_err(|error| error.to_string())
}

fn parse_status_id(raw: &str) -> Result<StatusId, String> {
    StatusId::new(raw.trim()).map_err(|error| error.to_string())
}
