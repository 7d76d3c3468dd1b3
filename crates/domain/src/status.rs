use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use ticketflow_core::{AppError, AppResult, NonEmptyString};
use uuid::Uuid;

/// Opaque status identifier assigned by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatusId(String);

impl StatusId {
    /// Creates a status identifier from a non-empty value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "status id must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Creates a random status identifier.
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

impl Display for StatusId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Opaque project identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(String);

impl ProjectId {
    /// Creates a project identifier from a non-empty value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "project id must not be empty".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ProjectId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Boundary within which a set of statuses is ordered and unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "project_id", rename_all = "snake_case")]
pub enum StatusScope {
    /// Statuses visible in every project.
    Global,
    /// Statuses visible only inside one project.
    Project(ProjectId),
}

impl StatusScope {
    /// Returns the scope for an optional project.
    #[must_use]
    pub fn for_project(project_id: Option<&ProjectId>) -> Self {
        project_id.map_or(Self::Global, |project_id| Self::Project(project_id.clone()))
    }

    /// Returns the project id for project scopes.
    #[must_use]
    pub fn project_id(&self) -> Option<&ProjectId> {
        match self {
            Self::Global => None,
            Self::Project(project_id) => Some(project_id),
        }
    }

    /// Returns a compact transport value: `global` or `project:<id>`.
    #[must_use]
    pub fn as_query_value(&self) -> String {
        match self {
            Self::Global => "global".to_owned(),
            Self::Project(project_id) => format!("project:{project_id}"),
        }
    }
}

impl Display for StatusScope {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_query_value().as_str())
    }
}

/// Validated `#rgb` or `#rrggbb` colour, stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusColor(String);

impl StatusColor {
    /// Creates a validated colour value.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into().trim().to_ascii_lowercase();
        let digits = value.strip_prefix('#').ok_or_else(|| {
            AppError::Validation(format!("status color '{value}' must start with '#'"))
        })?;

        if !matches!(digits.len(), 3 | 6) || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::Validation(format!(
                "status color '{value}' must be #rgb or #rrggbb hex"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the normalised colour string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Input payload used to construct a validated status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusInput {
    /// Status identifier.
    pub id: StatusId,
    /// Column label.
    pub label: String,
    /// Column colour.
    pub color: String,
    /// Zero-based position within the scope.
    pub order: u32,
    /// Scope the status belongs to.
    pub scope: StatusScope,
}

/// A named, coloured, ordered workflow stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    id: StatusId,
    label: NonEmptyString,
    color: StatusColor,
    order: u32,
    scope: StatusScope,
}

impl Status {
    /// Creates a validated status.
    pub fn new(input: StatusInput) -> AppResult<Self> {
        let label = NonEmptyString::new(input.label)
            .map_err(|_| AppError::Validation("status label must not be empty".to_owned()))?;

        Ok(Self {
            id: input.id,
            label,
            color: StatusColor::new(input.color)?,
            order: input.order,
            scope: input.scope,
        })
    }

    /// Returns the status identifier.
    #[must_use]
    pub fn id(&self) -> &StatusId {
        &self.id
    }

    /// Returns the column label.
    #[must_use]
    pub fn label(&self) -> &NonEmptyString {
        &self.label
    }

    /// Returns the column colour.
    #[must_use]
    pub fn color(&self) -> &StatusColor {
        &self.color
    }

    /// Returns the zero-based position within the scope.
    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Returns the owning scope.
    #[must_use]
    pub fn scope(&self) -> &StatusScope {
        &self.scope
    }

    /// Returns a copy with label and colour edits applied. Ordering is untouched.
    pub fn apply_patch(&self, patch: &StatusPatch) -> AppResult<Self> {
        let mut patched = self.clone();
        if let Some(label) = &patch.label {
            patched.label = NonEmptyString::new(label.as_str())
                .map_err(|_| AppError::Validation("status label must not be empty".to_owned()))?;
        }
        if let Some(color) = &patch.color {
            patched.color = StatusColor::new(color.as_str())?;
        }

        Ok(patched)
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

/// Label and colour edits for one status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPatch {
    /// New label.
    pub label: Option<String>,
    /// New colour.
    pub color: Option<String>,
}

impl StatusPatch {
    /// Returns whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.color.is_none()
    }
}

/// Assigns `order = index` to every status, producing a dense zero-based permutation.
pub fn renumber(statuses: &mut [Status]) {
    for (index, status) in statuses.iter_mut().enumerate() {
        status.set_order(u32::try_from(index).unwrap_or(u32::MAX));
    }
}

/// Inserts a status at the requested position (default: end) and renumbers the scope.
///
/// Requested positions past the end are clamped to the end.
pub fn insert_at_order(statuses: &mut Vec<Status>, status: Status, requested_order: Option<u32>) {
    let index = requested_order
        .and_then(|order| usize::try_from(order).ok())
        .map_or(statuses.len(), |order| order.min(statuses.len()));
    statuses.insert(index, status);
    renumber(statuses);
}

/// Returns whether the order values form a dense `0..n` permutation with no duplicates.
#[must_use]
pub fn is_dense_order(statuses: &[Status]) -> bool {
    let mut seen = vec![false; statuses.len()];
    statuses.iter().all(|status| {
        usize::try_from(status.order())
            .ok()
            .and_then(|order| seen.get_mut(order))
            .is_some_and(|slot| !std::mem::replace(slot, true))
    })
}

/// Returns the scope's statuses rearranged to match `ordered_ids`, renumbered.
///
/// The id set must match the current scope exactly: same size, no duplicates,
/// no foreign ids.
pub fn reorder_by_ids(current: &[Status], ordered_ids: &[StatusId]) -> AppResult<Vec<Status>> {
    if ordered_ids.len() != current.len() {
        return Err(AppError::Validation(format!(
            "reorder must list all {} statuses of the scope, got {}",
            current.len(),
            ordered_ids.len()
        )));
    }

    let mut seen = HashSet::with_capacity(ordered_ids.len());
    let mut reordered = Vec::with_capacity(ordered_ids.len());
    for status_id in ordered_ids {
        if !seen.insert(status_id) {
            return Err(AppError::Validation(format!(
                "status '{status_id}' appears more than once in reorder"
            )));
        }

        let status = current
            .iter()
            .find(|status| status.id() == status_id)
            .ok_or_else(|| {
                AppError::Validation(format!("status '{status_id}' does not belong to the scope"))
            })?;
        reordered.push(status.clone());
    }

    renumber(&mut reordered);
    Ok(reordered)
}

/// Built-in global statuses used when the remote store is unreachable.
#[must_use]
pub fn default_statuses() -> Vec<Status> {
    [
        ("open", "Open", "#3b82f6"),
        ("in_progress", "In Progress", "#f59e0b"),
        ("resolved", "Resolved", "#10b981"),
        ("closed", "Closed", "#6b7280"),
    ]
    .into_iter()
    .zip(0_u32..)
    .filter_map(|((id, label, color), order)| {
        Some(Status {
            id: StatusId(id.to_owned()),
            label: NonEmptyString::new(label).ok()?,
            color: StatusColor(color.to_owned()),
            order,
            scope: StatusScope::Global,
        })
    })
    .collect()
}
