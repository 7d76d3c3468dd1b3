use std::time::{Duration, Instant};

use ticketflow_domain::{StatusId, TicketId};
use tracing::trace;

/// Gesture thresholds for the drag controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragConfig {
    /// Maximum pointer travel, in pixels, for a press/release pair to count as a click.
    pub click_distance_px: f64,
    /// Maximum press duration for a click.
    pub click_window: Duration,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            click_distance_px: 5.0,
            click_window: Duration::from_millis(300),
        }
    }
}

/// Pointer coordinates in board space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerPosition {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl PointerPosition {
    /// Creates a pointer position.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn distance_to(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// What the pointer was over when the gesture started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerTarget {
    /// A ticket card sitting in a status column.
    Card {
        /// Card ticket.
        ticket_id: TicketId,
        /// Column the card sits in.
        status_id: StatusId,
    },
    /// Empty board background.
    Background,
}

/// A request to move one ticket to another status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    /// Ticket to move.
    pub ticket_id: TicketId,
    /// Destination status.
    pub target_status_id: StatusId,
}

/// Result of finishing a gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    /// Short press on a card; open or select it.
    Click(TicketId),
    /// Card dropped on a different column.
    Move(MoveIntent),
    /// Card drag ended without a usable target.
    Cancelled,
    /// Background scroll gesture ended.
    ScrollFinished,
    /// Event did not belong to any active gesture.
    Ignored,
}

/// Keyboard direction across the ordered columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    /// Previous column.
    Left,
    /// Next column.
    Right,
}

#[derive(Debug, Clone, PartialEq)]
enum Gesture {
    Idle,
    Pressed {
        ticket_id: TicketId,
        origin_status: StatusId,
        origin: PointerPosition,
        started_at: Instant,
    },
    DraggingCard {
        ticket_id: TicketId,
        origin_status: StatusId,
    },
    Scrolling {
        last_x: f64,
    },
    KeyboardCarry {
        ticket_id: TicketId,
        origin_status: StatusId,
        column_index: usize,
    },
}

/// Turns pointer and keyboard events into discrete move intents.
///
/// The initial pointer target selects the gesture mode: a card press becomes a
/// click or a card drag, a background press becomes a horizontal scroll.
#[derive(Debug, Clone)]
pub struct DragController {
    config: DragConfig,
    columns: Vec<StatusId>,
    gesture: Gesture,
}

impl DragController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new(config: DragConfig) -> Self {
        Self {
            config,
            columns: Vec::new(),
            gesture: Gesture::Idle,
        }
    }

    /// Sets the column order used for keyboard movement.
    pub fn set_columns(&mut self, columns: Vec<StatusId>) {
        self.columns = columns;
    }

    /// Returns whether a gesture is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.gesture != Gesture::Idle
    }

    /// Returns the ticket being dragged, if any.
    #[must_use]
    pub fn dragged_ticket(&self) -> Option<&TicketId> {
        match &self.gesture {
            Gesture::DraggingCard { ticket_id, .. } | Gesture::KeyboardCarry { ticket_id, .. } => {
                Some(ticket_id)
            }
            Gesture::Idle | Gesture::Pressed { .. } | Gesture::Scrolling { .. } => None,
        }
    }

    /// Starts a pointer gesture. Ignored while another gesture is active.
    pub fn pointer_down(&mut self, target: PointerTarget, position: PointerPosition, at: Instant) {
        if self.is_active() {
            trace!("pointer down ignored during active gesture");
            return;
        }

        self.gesture = match target {
            PointerTarget::Card {
                ticket_id,
                status_id,
            } => Gesture::Pressed {
                ticket_id,
                origin_status: status_id,
                origin: position,
                started_at: at,
            },
            PointerTarget::Background => Gesture::Scrolling { last_x: position.x },
        };
    }

    /// Tracks pointer movement and returns the horizontal scroll delta of a background drag.
    pub fn pointer_move(&mut self, position: PointerPosition) -> Option<f64> {
        match &mut self.gesture {
            Gesture::Pressed {
                ticket_id,
                origin_status,
                origin,
                ..
            } => {
                if origin.distance_to(position) > self.config.click_distance_px {
                    trace!(ticket_id = %ticket_id, "card drag started");
                    self.gesture = Gesture::DraggingCard {
                        ticket_id: ticket_id.clone(),
                        origin_status: origin_status.clone(),
                    };
                }
                None
            }
            Gesture::Scrolling { last_x } => {
                let delta = *last_x - position.x;
                *last_x = position.x;
                Some(delta)
            }
            Gesture::Idle | Gesture::DraggingCard { .. } | Gesture::KeyboardCarry { .. } => None,
        }
    }

    /// Finishes a pointer gesture. `column_under` is the status column under the pointer.
    pub fn pointer_up(
        &mut self,
        position: PointerPosition,
        column_under: Option<&StatusId>,
        at: Instant,
    ) -> DragOutcome {
        if matches!(self.gesture, Gesture::KeyboardCarry { .. }) {
            return DragOutcome::Ignored;
        }

        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Idle | Gesture::KeyboardCarry { .. } => DragOutcome::Ignored,
            Gesture::Scrolling { .. } => DragOutcome::ScrollFinished,
            Gesture::Pressed {
                ticket_id,
                origin_status,
                origin,
                started_at,
            } => {
                if origin.distance_to(position) > self.config.click_distance_px {
                    return resolve_drop(ticket_id, &origin_status, column_under);
                }
                if at.saturating_duration_since(started_at) <= self.config.click_window {
                    DragOutcome::Click(ticket_id)
                } else {
                    DragOutcome::Cancelled
                }
            }
            Gesture::DraggingCard {
                ticket_id,
                origin_status,
            } => resolve_drop(ticket_id, &origin_status, column_under),
        }
    }

    /// Aborts a pointer gesture, e.g. when the pointer leaves the window.
    pub fn pointer_cancel(&mut self) -> DragOutcome {
        match self.gesture {
            Gesture::Idle | Gesture::KeyboardCarry { .. } => DragOutcome::Ignored,
            Gesture::Scrolling { .. } => {
                self.gesture = Gesture::Idle;
                DragOutcome::ScrollFinished
            }
            Gesture::Pressed { .. } | Gesture::DraggingCard { .. } => {
                self.gesture = Gesture::Idle;
                DragOutcome::Cancelled
            }
        }
    }

    /// Picks up the focused card for a keyboard drag.
    ///
    /// Returns `false` when another gesture is active or the card's column is unknown.
    pub fn key_pick_up(&mut self, ticket_id: TicketId, status_id: StatusId) -> bool {
        if self.is_active() {
            return false;
        }
        let Some(column_index) = self.columns.iter().position(|column| column == &status_id)
        else {
            return false;
        };

        self.gesture = Gesture::KeyboardCarry {
            ticket_id,
            origin_status: status_id,
            column_index,
        };
        true
    }

    /// Moves a carried card one column and returns the column now under it.
    pub fn key_move(&mut self, direction: KeyDirection) -> Option<&StatusId> {
        let last = self.columns.len().checked_sub(1)?;
        let Gesture::KeyboardCarry { column_index, .. } = &mut self.gesture else {
            return None;
        };

        *column_index = match direction {
            KeyDirection::Left => column_index.saturating_sub(1),
            KeyDirection::Right => (*column_index + 1).min(last),
        };
        self.columns.get(*column_index)
    }

    /// Drops a carried card on the column under it.
    pub fn key_drop(&mut self) -> DragOutcome {
        if !matches!(self.gesture, Gesture::KeyboardCarry { .. }) {
            return DragOutcome::Ignored;
        }

        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::KeyboardCarry {
                ticket_id,
                origin_status,
                column_index,
            } => resolve_drop(ticket_id, &origin_status, self.columns.get(column_index)),
            _ => DragOutcome::Ignored,
        }
    }

    /// Puts a carried card back.
    pub fn key_cancel(&mut self) -> DragOutcome {
        if matches!(self.gesture, Gesture::KeyboardCarry { .. }) {
            self.gesture = Gesture::Idle;
            return DragOutcome::Cancelled;
        }

        DragOutcome::Ignored
    }
}

impl Default for DragController {
    fn default() -> Self {
        Self::new(DragConfig::default())
    }
}

fn resolve_drop(
    ticket_id: TicketId,
    origin_status: &StatusId,
    column_under: Option<&StatusId>,
) -> DragOutcome {
    match column_under {
        Some(target) if target != origin_status => DragOutcome::Move(MoveIntent {
            ticket_id,
            target_status_id: target.clone(),
        }),
        _ => DragOutcome::Cancelled,
    }
}
