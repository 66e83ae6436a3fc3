/// Shutdown-aware waiting built on a `watch<bool>` stop flag
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Result of an interruptible wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Cancelled,
}

/// Resolves once the stop flag is `true`.
///
/// If every sender is gone the flag can never flip, so this never resolves.
pub async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Sleep for `delay` unless shutdown is requested first.
pub async fn wait_or_cancel(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> WaitOutcome {
    if *shutdown.borrow() {
        return WaitOutcome::Cancelled;
    }

    tokio::select! {
        biased;
        _ = cancelled(shutdown) => {
            debug!(?delay, "Backoff wait interrupted by shutdown");
            WaitOutcome::Cancelled
        }
        _ = tokio::time::sleep(delay) => WaitOutcome::Elapsed,
    }
}
