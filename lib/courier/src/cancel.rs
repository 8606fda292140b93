//! Deadline and cancellation guard shared by every blocking point.

use std::future::Future;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use courier_core::{Error, Result};

/// Run a future under an optional deadline and optional cancellation token.
///
/// Both are checked before the future is first polled, so an already
/// canceled or expired request fails before any work starts. While the
/// future runs, cancellation wins the race with [`Error::Canceled`] and an
/// elapsed deadline with [`Error::Timeout`].
pub(crate) async fn bounded<T, F>(
    deadline: Option<Instant>,
    cancellation: Option<&CancellationToken>,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if let Some(token) = cancellation
        && token.is_cancelled()
    {
        return Err(Error::Canceled);
    }
    if let Some(deadline) = deadline
        && Instant::now() >= deadline
    {
        return Err(Error::Timeout);
    }

    match (deadline, cancellation) {
        (None, None) => fut.await,
        (Some(deadline), None) => with_deadline(deadline, fut).await,
        (None, Some(token)) => {
            tokio::select! {
                () = token.cancelled() => Err(Error::Canceled),
                result = fut => result,
            }
        }
        (Some(deadline), Some(token)) => {
            tokio::select! {
                () = token.cancelled() => Err(Error::Canceled),
                result = with_deadline(deadline, fut) => result,
            }
        }
    }
}

async fn with_deadline<T, F>(deadline: Instant, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let deadline = tokio::time::Instant::from_std(deadline);
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn canceled_before_start_skips_the_future() {
        let token = CancellationToken::new();
        token.cancel();

        let polled = Arc::new(AtomicBool::new(false));
        let probe = Arc::clone(&polled);

        let result = bounded(None, Some(&token), async move {
            probe.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(Error::Canceled)));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn elapsed_deadline_skips_the_future() {
        let deadline = Instant::now() - Duration::from_millis(1);

        let polled = Arc::new(AtomicBool::new(false));
        let probe = Arc::clone(&polled);

        let result = bounded(Some(deadline), None, async move {
            probe.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(Error::Timeout)));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unconstrained_future_runs() {
        let result = bounded(None, None, async { Ok(7) }).await;
        assert_eq!(result.expect("value"), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_the_future_wins() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result: Result<()> = bounded(None, Some(&token), std::future::pending()).await;
        assert!(matches!(result, Err(Error::Canceled)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_the_future_wins() {
        let deadline = Instant::now() + Duration::from_millis(10);

        let result: Result<()> = bounded(Some(deadline), None, std::future::pending()).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn future_finishing_first_wins() {
        let deadline = Instant::now() + Duration::from_secs(60);
        let token = CancellationToken::new();

        let result = bounded(Some(deadline), Some(&token), async { Ok("done") }).await;
        assert_eq!(result.expect("value"), "done");
    }

    #[tokio::test]
    async fn inner_error_passes_through() {
        let result: Result<()> =
            bounded(None, None, async { Err(Error::connection("refused")) }).await;
        assert!(result.expect_err("inner error").is_connection());
    }
}
