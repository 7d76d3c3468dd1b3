use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use ticketflow_core::{AppError, AppResult, TenantId};
use ticketflow_domain::StatusId;

type ClaimKey = (TenantId, StatusId);

#[derive(Debug, Default)]
struct ClaimState {
    claims: usize,
    deleting: bool,
}

type ClaimTable = Arc<Mutex<HashMap<ClaimKey, ClaimState>>>;

/// Tracks which statuses are the target of a write in flight and which are being deleted.
///
/// A status cannot be claimed while it is being deleted, and cannot be
/// deleted while claimed.
#[derive(Clone, Default)]
pub(crate) struct StatusClaims {
    table: ClaimTable,
}

impl StatusClaims {
    pub(crate) fn claim(&self, tenant_id: TenantId, status_id: &StatusId) -> AppResult<StatusClaim> {
        let key = (tenant_id, status_id.clone());
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let state = table.entry(key.clone()).or_default();
        if state.deleting {
            return Err(AppError::Conflict(format!(
                "status '{status_id}' is being deleted"
            )));
        }
        state.claims += 1;

        Ok(StatusClaim {
            key,
            table: self.table.clone(),
        })
    }

    pub(crate) fn begin_delete(
        &self,
        tenant_id: TenantId,
        status_id: &StatusId,
    ) -> AppResult<DeleteGuard> {
        let key = (tenant_id, status_id.clone());
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let state = table.entry(key.clone()).or_default();
        if state.claims > 0 {
            let claims = state.claims;
            return Err(AppError::Conflict(format!(
                "status '{status_id}' is the target of {claims} ticket write(s) in flight"
            )));
        }
        if state.deleting {
            return Err(AppError::Conflict(format!(
                "status '{status_id}' is already being deleted"
            )));
        }
        state.deleting = true;

        Ok(DeleteGuard {
            key,
            table: self.table.clone(),
        })
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Keeps a status from being deleted while a ticket write targets it.
pub(crate) struct StatusClaim {
    key: ClaimKey,
    table: ClaimTable,
}

impl Drop for StatusClaim {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = table.get_mut(&self.key) {
            state.claims = state.claims.saturating_sub(1);
            if state.claims == 0 && !state.deleting {
                table.remove(&self.key);
            }
        }
    }
}

/// Marks a status as being deleted until dropped.
pub(crate) struct DeleteGuard {
    key: ClaimKey,
    table: ClaimTable,
}

impl Drop for DeleteGuard {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = table.get_mut(&self.key) {
            state.deleting = false;
            if state.claims == 0 {
                table.remove(&self.key);
            }
        }
    }
}
