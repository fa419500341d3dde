#[cfg(test)]
#[path = "cancellation_test.rs"]
mod tests;

use super::Applied;
use super::SessionAggregator;
use crate::domain::models::BackendBox;

/// Coordinates a user-initiated cancel against the session it targets.
pub struct CancellationController<'a> {
    backend: &'a BackendBox,
}

impl<'a> CancellationController<'a> {
    pub fn new(backend: &'a BackendBox) -> CancellationController<'a> {
        return CancellationController { backend };
    }

    /// Cancels an active session: flags it, aborts the transport by dropping
    /// it, tells the service which job to stop, then resolves the session as
    /// cancelled. Does nothing for idle, already cancelling or finished
    /// sessions.
    pub async fn cancel<T: Send>(
        &self,
        aggregator: &mut SessionAggregator,
        transport: &mut Option<T>,
    ) -> Applied {
        if !aggregator.request_cancel() {
            tracing::debug!(
                state = aggregator.state().to_string(),
                "Ignoring cancel request"
            );
            return Applied::Ignored;
        }

        if transport.take().is_some() {
            tracing::info!("Aborted recognition stream");
        }

        if let Some(job_id) = aggregator.job_id() {
            if let Err(err) = self.backend.cancel(&job_id).await {
                tracing::warn!(job_id = job_id, error = ?err, "Failed to notify service of cancellation");
            }
        }

        return aggregator.transport_closed(None);
    }
}
