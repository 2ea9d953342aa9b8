/*!
 * Task and timing helpers shared by the driver lanes.
 */
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, Instrument, Span};

use crate::error::{Error, Result};

/// Run a future with a timeout
///
/// # Arguments
///
/// * `duration` - The timeout duration
/// * `future` - The future to run
///
/// # Returns
///
/// The result of the future, or a timeout error if the timeout is reached
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(format!("Operation timed out after {:?}", duration))),
    }
}

/// Sleep for `duration` unless `shutdown` is cancelled first
///
/// Returns `true` when the full duration elapsed.
pub async fn sleep_unless_cancelled(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Spawn a task inside `span` and log how it ended
///
/// A task returning an error is logged at error level; nothing restarts it.
///
/// # Arguments
///
/// * `name` - A name for the task (for logging)
/// * `span` - The span the task runs in
/// * `fut` - The future to run
pub fn spawn_and_log<F, T, E>(name: &str, span: Span, fut: F) -> JoinHandle<()>
where
    F: Future<Output = std::result::Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let task_name = name.to_string();
    tokio::spawn(
        async move {
            match fut.await {
                Ok(_) => {
                    debug!("Task '{}' completed", task_name);
                }
                Err(e) => {
                    error!("Task '{}' terminated: {}", task_name, e);
                }
            }
        }
        .instrument(span),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), async { Ok::<_, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_failure() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, Error>(42)
        })
        .await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_cancellation() {
        let token = CancellationToken::new();
        assert!(sleep_unless_cancelled(Duration::from_secs(3), &token).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_by_cancellation() {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });
        assert!(!sleep_unless_cancelled(Duration::from_secs(60), &token).await);
    }

    #[tokio::test]
    async fn test_spawn_and_log_completes() {
        let handle = spawn_and_log("ok", Span::none(), async { Ok::<_, Error>(()) });
        tokio_test::assert_ok!(handle.await);

        let handle = spawn_and_log("fails", Span::none(), async {
            Err::<(), _>(Error::other("boom"))
        });
        tokio_test::assert_ok!(handle.await);
    }
}
