use chrono::Utc;
use ticketflow_core::{AppError, AppResult, TenantId};
use ticketflow_domain::{StatusId, Ticket, TicketId, TicketPatch};
use tracing::{debug, info, warn};

use super::in_flight::InFlightGuard;
use super::{BoardSynchronizer, MoveOutcome, MoveState};
use crate::MoveIntent;

impl BoardSynchronizer {
    /// Moves a ticket to another status with optimistic local application.
    ///
    /// The local copy changes immediately; a failed, rejected or timed-out
    /// persistence call restores it before the error is returned.
    pub async fn move_ticket(
        &self,
        ticket_id: &TicketId,
        target_status_id: &StatusId,
    ) -> AppResult<MoveOutcome> {
        self.ensure_open()?;

        let tenant_id = self.actor.tenant_id();
        let _serial = self.store.lock_ticket(tenant_id, ticket_id).await;

        let previous = self.store.snapshot(tenant_id, ticket_id).await?;
        self.store
            .authorization()
            .require_ticket_edit(&self.actor, &previous)?;

        if previous.status_id() == target_status_id {
            debug!(ticket_id = %ticket_id, status_id = %target_status_id, "move is a no-op");
            return Ok(MoveOutcome::Unchanged);
        }

        let (_, _target_claim) = self
            .store
            .registry()
            .claim_visible_status(&self.actor, &previous.scope(), target_status_id)
            .await?;

        let _in_flight = InFlightGuard::enter(self.in_flight.clone());
        let optimistic = previous.moved_to(target_status_id.clone(), Utc::now());
        self.store
            .apply_optimistic(tenant_id, optimistic.clone())
            .await;
        self.set_move_state(ticket_id, MoveState::OptimisticallyApplied)
            .await;
        debug!(
            ticket_id = %ticket_id,
            from = %previous.status_id(),
            to = %target_status_id,
            "move applied optimistically"
        );

        let result = self
            .persist_move(tenant_id, ticket_id, target_status_id)
            .await;

        match result {
            Ok(confirmed) => {
                self.store.replace(tenant_id, confirmed.clone()).await;
                self.store.settle(tenant_id, ticket_id).await;
                if !self.is_open() {
                    debug!(ticket_id = %ticket_id, "move confirmed after board close");
                    return Ok(MoveOutcome::Discarded);
                }

                self.set_move_state(ticket_id, MoveState::Confirmed).await;
                if let Some(change_sink) = &self.change_sink {
                    change_sink.ticket_confirmed(&confirmed);
                }
                info!(
                    tenant_id = %tenant_id,
                    ticket_id = %ticket_id,
                    status_id = %confirmed.status_id(),
                    "ticket move confirmed"
                );
                Ok(MoveOutcome::Confirmed(confirmed))
            }
            Err(error) => {
                self.store
                    .reconcile_rollback(tenant_id, &optimistic, previous)
                    .await;
                self.store.settle(tenant_id, ticket_id).await;
                if !self.is_open() {
                    debug!(ticket_id = %ticket_id, error = %error, "move failed after board close");
                    return Ok(MoveOutcome::Discarded);
                }

                self.set_move_state(ticket_id, MoveState::RolledBack).await;
                if let Some(change_sink) = &self.change_sink {
                    change_sink.ticket_rolled_back(ticket_id, &error);
                }
                warn!(
                    tenant_id = %tenant_id,
                    ticket_id = %ticket_id,
                    error = %error,
                    "ticket move rolled back"
                );
                Err(error)
            }
        }
    }

    /// Applies a move intent produced by the drag controller.
    pub async fn apply_intent(&self, intent: &MoveIntent) -> AppResult<MoveOutcome> {
        self.move_ticket(&intent.ticket_id, &intent.target_status_id)
            .await
    }

    /// Edits ticket fields. The store serializes the edit with moves of the same ticket.
    pub async fn edit_ticket(&self, ticket_id: &TicketId, patch: TicketPatch) -> AppResult<Ticket> {
        self.ensure_open()?;
        self.store.patch(&self.actor, ticket_id, patch).await
    }

    async fn persist_move(
        &self,
        tenant_id: TenantId,
        ticket_id: &TicketId,
        target_status_id: &StatusId,
    ) -> AppResult<Ticket> {
        let patch = TicketPatch::status(target_status_id.clone());
        let mut attempt: u8 = 0;

        loop {
            let result = tokio::time::timeout(
                self.config.persist_timeout,
                self.store.remote_patch(tenant_id, ticket_id, &patch),
            )
            .await
            .unwrap_or_else(|_| {
                Err(AppError::TransientNetwork(format!(
                    "persisting ticket '{ticket_id}' timed out after {} ms",
                    self.config.persist_timeout.as_millis()
                )))
            });

            match result {
                Err(error) if error.is_transient() && attempt < self.config.transient_retries => {
                    attempt += 1;
                    warn!(
                        ticket_id = %ticket_id,
                        attempt,
                        error = %error,
                        "transient persistence failure, retrying move"
                    );
                }
                other => return other,
            }
        }
    }
}
