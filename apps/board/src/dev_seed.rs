use chrono::{Duration, Utc};
use ticketflow_application::{StatusRepository, TicketRepository};
use ticketflow_core::{AppResult, TenantId};
use ticketflow_domain::{
    StatusId, Ticket, TicketId, TicketInput, TicketPriority, default_statuses,
};
use ticketflow_infrastructure::InMemoryBoardRepository;
use tracing::info;

const DEV_SEED_REPORTER: &str = "dev-reporter";
const DEV_SEED_ASSIGNEE: &str = "dev-manager";

const DEV_SEED_TICKETS: &[(&str, &str, &str, TicketPriority)] = &[
    ("TCK-1", "Badge reader offline at north entrance", "open", TicketPriority::High),
    ("TCK-2", "Printer queue stuck on floor 3", "open", TicketPriority::Medium),
    ("TCK-3", "Rotate VPN certificates", "in_progress", TicketPriority::Urgent),
    ("TCK-4", "Archive Q2 audit exports", "resolved", TicketPriority::Low),
    ("TCK-5", "Replace conference room display", "closed", TicketPriority::Low),
];

/// Fills a fresh in-memory repository with the default columns and a handful of tickets.
pub async fn run(repository: &InMemoryBoardRepository, tenant_id: TenantId) -> AppResult<()> {
    for status in default_statuses() {
        repository.create_status(tenant_id, status).await?;
    }

    let now = Utc::now();
    for (offset, (id, title, status_id, priority)) in (0_i64..).zip(DEV_SEED_TICKETS) {
        let created_at = now - Duration::hours(24 - offset);
        let ticket = Ticket::new(TicketInput {
            id: TicketId::new(*id)?,
            title: (*title).to_owned(),
            description: String::new(),
            status_id: StatusId::new(*status_id)?,
            priority: *priority,
            assignee: (offset % 2 == 0).then(|| DEV_SEED_ASSIGNEE.to_owned()),
            created_by: DEV_SEED_REPORTER.to_owned(),
            project_id: None,
            due_date: None,
            created_at,
            updated_at: created_at,
        })?;
        repository.create_ticket(tenant_id, ticket).await?;
    }

    info!(
        tenant_id = %tenant_id,
        tickets = DEV_SEED_TICKETS.len(),
        "seeded in-memory board"
    );
    Ok(())
}
