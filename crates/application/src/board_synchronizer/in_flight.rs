use std::sync::Arc;

use tokio::sync::watch;

/// Counts one in-flight move for as long as it lives.
pub(super) struct InFlightGuard {
    counter: Arc<watch::Sender<usize>>,
}

impl InFlightGuard {
    pub(super) fn enter(counter: Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|in_flight| *in_flight += 1);
        Self { counter }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter
            .send_modify(|in_flight| *in_flight = in_flight.saturating_sub(1));
    }
}
