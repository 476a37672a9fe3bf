//! Bounded awaiting for external calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Await `fut` for at most `limit`; `None` on timeout.
pub(crate) async fn bounded<F: Future>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> Option<F::Output> {
    match tokio::time::timeout(limit, fut).await {
        Ok(output) => Some(output),
        Err(_elapsed) => {
            warn!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "Operation timed out"
            );
            None
        }
    }
}
