use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ticketflow_core::{AppError, AppResult, NonEmptyString};
use uuid::Uuid;

use crate::{ProjectId, StatusId, StatusScope};

/// Opaque ticket identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketId(String);

impl TicketId {
    /// Creates a ticket identifier from a non-empty value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "ticket id must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Creates a random ticket identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for TicketId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Ticket urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    /// Can wait.
    Low,
    /// Default urgency.
    Medium,
    /// Should be picked up soon.
    High,
    /// Drop everything.
    Urgent,
}

impl TicketPriority {
    /// Returns a stable storage value for this priority.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for TicketPriority {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(AppError::Validation(format!(
                "unknown ticket priority '{value}'"
            ))),
        }
    }
}

/// Input payload used to construct a validated ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketInput {
    /// Ticket identifier.
    pub id: TicketId,
    /// Short summary.
    pub title: String,
    /// Long-form body.
    pub description: String,
    /// Current workflow stage.
    pub status_id: StatusId,
    /// Urgency.
    pub priority: TicketPriority,
    /// Assigned subject, if any.
    pub assignee: Option<String>,
    /// Subject that opened the ticket.
    pub created_by: String,
    /// Owning project, if any.
    pub project_id: Option<ProjectId>,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Tenant-scoped ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    id: TicketId,
    title: NonEmptyString,
    description: String,
    status_id: StatusId,
    priority: TicketPriority,
    assignee: Option<String>,
    created_by: String,
    project_id: Option<ProjectId>,
    due_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Creates a validated ticket.
    pub fn new(input: TicketInput) -> AppResult<Self> {
        let title = NonEmptyString::new(input.title)
            .map_err(|_| AppError::Validation("ticket title must not be empty".to_owned()))?;

        Ok(Self {
            id: input.id,
            title,
            description: input.description,
            status_id: input.status_id,
            priority: input.priority,
            assignee: input
                .assignee
                .filter(|assignee| !assignee.trim().is_empty()),
            created_by: input.created_by,
            project_id: input.project_id,
            due_date: input.due_date,
            created_at: input.created_at,
            updated_at: input.updated_at,
        })
    }

    /// Returns the ticket identifier.
    #[must_use]
    pub fn id(&self) -> &TicketId {
        &self.id
    }

    /// Returns the ticket title.
    #[must_use]
    pub fn title(&self) -> &NonEmptyString {
        &self.title
    }

    /// Returns the ticket description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.description.as_str()
    }

    /// Returns the current status id.
    #[must_use]
    pub fn status_id(&self) -> &StatusId {
        &self.status_id
    }

    /// Returns the priority.
    #[must_use]
    pub fn priority(&self) -> TicketPriority {
        self.priority
    }

    /// Returns the assigned subject.
    #[must_use]
    pub fn assignee(&self) -> Option<&str> {
        self.assignee.as_deref()
    }

    /// Returns the subject that opened the ticket.
    #[must_use]
    pub fn created_by(&self) -> &str {
        self.created_by.as_str()
    }

    /// Returns the owning project.
    #[must_use]
    pub fn project_id(&self) -> Option<&ProjectId> {
        self.project_id.as_ref()
    }

    /// Returns the due date.
    #[must_use]
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the status scope the ticket lives in.
    #[must_use]
    pub fn scope(&self) -> StatusScope {
        StatusScope::for_project(self.project_id.as_ref())
    }

    /// Returns whether the subject is the ticket's assignee.
    #[must_use]
    pub fn is_assigned_to(&self, subject: &str) -> bool {
        self.assignee.as_deref() == Some(subject)
    }

    /// Returns a copy moved to another status and stamped with `at`.
    #[must_use]
    pub fn moved_to(&self, status_id: StatusId, at: DateTime<Utc>) -> Self {
        let mut moved = self.clone();
        moved.status_id = status_id;
        moved.updated_at = at;
        moved
    }

    /// Returns a copy with the patch applied and stamped with `at`.
    pub fn apply_patch(&self, patch: &TicketPatch, at: DateTime<Utc>) -> AppResult<Self> {
        let mut patched = self.clone();
        if let Some(title) = &patch.title {
            patched.title = NonEmptyString::new(title.as_str())
                .map_err(|_| AppError::Validation("ticket title must not be empty".to_owned()))?;
        }
        if let Some(description) = &patch.description {
            patched.description.clone_from(description);
        }
        if let Some(status_id) = &patch.status_id {
            patched.status_id = status_id.clone();
        }
        if let Some(priority) = patch.priority {
            patched.priority = priority;
        }
        if let Some(assignee) = &patch.assignee {
            patched.assignee = assignee
                .clone()
                .filter(|assignee| !assignee.trim().is_empty());
        }
        if let Some(due_date) = patch.due_date {
            patched.due_date = due_date;
        }
        patched.updated_at = at;

        Ok(patched)
    }
}

/// Partial ticket update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketPatch {
    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_id: Option<StatusId>,
    /// New priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TicketPriority>,
    /// New assignee; `Some(None)` clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Option<String>>,
    /// New due date; `Some(None)` clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<NaiveDate>>,
}

impl TicketPatch {
    /// Returns a patch that only changes the status.
    #[must_use]
    pub fn status(status_id: StatusId) -> Self {
        Self {
            status_id: Some(status_id),
            ..Self::default()
        }
    }

    /// Returns whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status_id.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.due_date.is_none()
    }

    /// Returns whether the patch changes the assignee.
    #[must_use]
    pub fn changes_assignee(&self) -> bool {
        self.assignee.is_some()
    }
}

/// Composable ticket listing predicate. Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketFilter {
    /// Only tickets in this status.
    pub status_id: Option<StatusId>,
    /// Only tickets with this priority.
    pub priority: Option<TicketPriority>,
    /// Only tickets assigned to this subject.
    pub assignee: Option<String>,
    /// Only tickets in this project.
    pub project_id: Option<ProjectId>,
    /// Case-insensitive substring over title and description.
    pub search: Option<String>,
}

impl TicketFilter {
    /// Restricts to one status.
    #[must_use]
    pub fn with_status(mut self, status_id: StatusId) -> Self {
        self.status_id = Some(status_id);
        self
    }

    /// Restricts to one priority.
    #[must_use]
    pub fn with_priority(mut self, priority: TicketPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Restricts to one assignee.
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// Restricts to one project.
    #[must_use]
    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Restricts to tickets whose title or description contains the text.
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Returns whether the ticket satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, ticket: &Ticket) -> bool {
        if self
            .status_id
            .as_ref()
            .is_some_and(|status_id| ticket.status_id() != status_id)
        {
            return false;
        }

        if self
            .priority
            .is_some_and(|priority| ticket.priority() != priority)
        {
            return false;
        }

        if self
            .assignee
            .as_deref()
            .is_some_and(|assignee| !ticket.is_assigned_to(assignee))
        {
            return false;
        }

        if self
            .project_id
            .as_ref()
            .is_some_and(|project_id| ticket.project_id() != Some(project_id))
        {
            return false;
        }

        match self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
        {
            Some(search) => {
                let needle = search.to_lowercase();
                ticket.title().as_str().to_lowercase().contains(&needle)
                    || ticket.description().to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}
