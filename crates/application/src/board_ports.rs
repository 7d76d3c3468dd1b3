mod inputs;
mod repository;
mod sink;

pub use inputs::{CreateStatusInput, CreateTicketInput};
pub use repository::{StatusRepository, TicketRepository};
pub use sink::TicketChangeSink;
