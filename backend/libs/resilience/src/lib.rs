/// Resilience primitives for event consumers
///
/// - **Retry policy**: pure exponential backoff schedule with a bounded attempt budget
/// - **Shutdown-aware waits**: backoff sleeps that return early when the process is stopping
///
/// # Example: driving a bounded retry loop
///
/// ```rust,no_run
/// use resilience::{wait_or_cancel, RetryDecision, RetryPolicy, WaitOutcome};
/// use std::time::Duration;
/// use tokio::sync::watch;
///
/// #[tokio::main]
/// async fn main() {
///     let (_tx, mut shutdown) = watch::channel(false);
///     let policy = RetryPolicy::new(3, Duration::from_secs(1));
///
///     let mut attempt = 0;
///     loop {
///         attempt += 1;
///         if do_work().await.is_ok() {
///             break;
///         }
///         match policy.next(attempt) {
///             RetryDecision::RetryAfter(delay) => {
///                 if wait_or_cancel(delay, &mut shutdown).await == WaitOutcome::Cancelled {
///                     return;
///                 }
///             }
///             RetryDecision::Exhausted => break,
///         }
///     }
/// }
///
/// async fn do_work() -> Result<(), ()> { Ok(()) }
/// ```

pub mod retry;
pub mod shutdown;

pub use retry::{RetryDecision, RetryPolicy};
pub use shutdown::{cancelled, wait_or_cancel, WaitOutcome};
