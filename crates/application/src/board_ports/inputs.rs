use chrono::NaiveDate;
use ticketflow_domain::{ProjectId, StatusId, StatusScope, TicketPriority};

/// Input payload for status creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStatusInput {
    /// Column label.
    pub label: String,
    /// Column colour, `#rgb` or `#rrggbb`.
    pub color: String,
    /// Scope the status is created in.
    pub scope: StatusScope,
    /// Zero-based insert position; `None` appends.
    pub requested_order: Option<u32>,
}

/// Input payload for ticket creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTicketInput {
    /// Short summary.
    pub title: String,
    /// Long-form body.
    pub description: String,
    /// Initial status; `None` picks the first visible status.
    pub status_id: Option<StatusId>,
    /// Urgency.
    pub priority: TicketPriority,
    /// Assigned subject, if any.
    pub assignee: Option<String>,
    /// Owning project, if any.
    pub project_id: Option<ProjectId>,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
}
