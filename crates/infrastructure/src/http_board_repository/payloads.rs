use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ticketflow_core::{AppError, AppResult};
use ticketflow_domain::{
    ProjectId, Status, StatusId, StatusInput, StatusScope, Ticket, TicketFilter, TicketId,
    TicketInput, TicketPriority,
};

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct Envelope<T> {
    pub(super) success: bool,
    pub(super) message: Option<String>,
    pub(super) data: Option<T>,
}

/// Wire shape of a status. A missing `project_id` means global scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(super) struct StatusPayload {
    pub(super) id: String,
    pub(super) label: String,
    pub(super) color: String,
    pub(super) order: u32,
    #[serde(default)]
    pub(super) project_id: Option<String>,
}

impl StatusPayload {
    pub(super) fn from_status(status: &Status) -> Self {
        Self {
            id: status.id().as_str().to_owned(),
            label: status.label().as_str().to_owned(),
            color: status.color().as_str().to_owned(),
            order: status.order(),
            project_id: status
                .scope()
                .project_id()
                .map(|project_id| project_id.as_str().to_owned()),
        }
    }

    pub(super) fn into_status(self) -> AppResult<Status> {
        let convert = || -> AppResult<Status> {
            let scope = match self.project_id {
                Some(project_id) => StatusScope::Project(ProjectId::new(project_id)?),
                None => StatusScope::Global,
            };

            Status::new(StatusInput {
                id: StatusId::new(self.id)?,
                label: self.label,
                color: self.color,
                order: self.order,
                scope,
            })
        };

        convert().map_err(|error| unusable("status", &error))
    }
}

/// Wire shape of a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(super) struct TicketPayload {
    pub(super) id: String,
    pub(super) title: String,
    #[serde(default)]
    pub(super) description: String,
    pub(super) status_id: String,
    pub(super) priority: TicketPriority,
    #[serde(default)]
    pub(super) assignee: Option<String>,
    pub(super) created_by: String,
    #[serde(default)]
    pub(super) project_id: Option<String>,
    #[serde(default)]
    pub(super) due_date: Option<NaiveDate>,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

impl TicketPayload {
    pub(super) fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id().as_str().to_owned(),
            title: ticket.title().as_str().to_owned(),
            description: ticket.description().to_owned(),
            status_id: ticket.status_id().as_str().to_owned(),
            priority: ticket.priority(),
            assignee: ticket.assignee().map(str::to_owned),
            created_by: ticket.created_by().to_owned(),
            project_id: ticket
                .project_id()
                .map(|project_id| project_id.as_str().to_owned()),
            due_date: ticket.due_date(),
            created_at: ticket.created_at(),
            updated_at: ticket.updated_at(),
        }
    }

    pub(super) fn into_ticket(self) -> AppResult<Ticket> {
        let convert = || -> AppResult<Ticket> {
            Ticket::new(TicketInput {
                id: TicketId::new(self.id)?,
                title: self.title,
                description: self.description,
                status_id: StatusId::new(self.status_id)?,
                priority: self.priority,
                assignee: self.assignee,
                created_by: self.created_by,
                project_id: self.project_id.map(ProjectId::new).transpose()?,
                due_date: self.due_date,
                created_at: self.created_at,
                updated_at: self.updated_at,
            })
        };

        convert().map_err(|error| unusable("ticket", &error))
    }
}

/// Body of `PUT api/statuses/order`.
#[derive(Debug, Serialize)]
pub(super) struct StatusOrderPayload {
    pub(super) scope: String,
    pub(super) ordered_ids: Vec<String>,
}

/// Data of `GET api/statuses/{id}/references`.
#[derive(Debug, Deserialize)]
pub(super) struct ReferenceCountPayload {
    pub(super) count: u64,
}

/// Query pairs for `GET api/tickets`.
pub(super) fn ticket_filter_query(filter: &TicketFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(status_id) = &filter.status_id {
        query.push(("status_id", status_id.as_str().to_owned()));
    }
    if let Some(priority) = filter.priority {
        query.push(("priority", priority.as_str().to_owned()));
    }
    if let Some(assignee) = &filter.assignee {
        query.push(("assignee", assignee.clone()));
    }
    if let Some(project_id) = &filter.project_id {
        query.push(("project_id", project_id.as_str().to_owned()));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim) {
        if !search.is_empty() {
            query.push(("search", search.to_owned()));
        }
    }

    query
}

fn unusable(kind: &str, error: &AppError) -> AppError {
    AppError::Internal(format!("persistence returned an unusable {kind}: {error}"))
}
