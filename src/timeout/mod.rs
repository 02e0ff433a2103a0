//! Cancellable suspension and deadline guards.
//!
//! The resilience layer suspends in exactly two places: the backoff sleep
//! between retry attempts and the grace period of resource recovery. Both
//! go through [`sleep_cancellable`] so a caller-supplied
//! [`CancellationToken`] interrupts them. No lock is held across either.
//!
//! Nothing here enforces an overall wall-clock limit on its own; callers
//! that want one wrap the whole call in [`with_deadline`].

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::OrchestratorError;

/// How a cancellable sleep ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The full delay elapsed.
    Elapsed,
    /// The token fired first.
    Cancelled,
}

/// Sleeps for `delay`, returning early if `cancel` fires.
pub async fn sleep_cancellable(delay: Duration, cancel: Option<&CancellationToken>) -> SleepOutcome {
    match cancel {
        None => {
            tokio::time::sleep(delay).await;
            SleepOutcome::Elapsed
        }
        Some(token) => {
            if token.is_cancelled() {
                return SleepOutcome::Cancelled;
            }
            tokio::select! {
                _ = token.cancelled() => SleepOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => SleepOutcome::Elapsed,
            }
        }
    }
}

/// Runs `future` under an overall deadline.
///
/// If the deadline passes first the future is dropped and a fatal
/// `CANCELLED` error is returned.
pub async fn with_deadline<T, Fut>(deadline: Duration, future: Fut) -> Result<T, OrchestratorError>
where
    Fut: Future<Output = Result<T, OrchestratorError>>,
{
    match tokio::time::timeout(deadline, future).await {
        Ok(result) => result,
        Err(_) => Err(OrchestratorError::cancelled(format!(
            "deadline of {}ms exceeded",
            deadline.as_millis()
        ))
        .add_context("deadline_ms", deadline.as_millis().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_without_token_elapses() {
        let start = tokio::time::Instant::now();
        let outcome = sleep_cancellable(Duration::from_secs(5), None).await;
        assert_eq!(outcome, SleepOutcome::Elapsed);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_with_untriggered_token_elapses() {
        let token = CancellationToken::new();
        let outcome = sleep_cancellable(Duration::from_millis(250), Some(&token)).await;
        assert_eq!(outcome, SleepOutcome::Elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_interrupted_by_cancellation() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let outcome = sleep_cancellable(Duration::from_secs(60), Some(&token)).await;
        assert_eq!(outcome, SleepOutcome::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_already_cancelled_token_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome = sleep_cancellable(Duration::from_secs(3600), Some(&token)).await;
        assert_eq!(outcome, SleepOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_passes_result_through() {
        let result = with_deadline(Duration::from_secs(1), async { Ok::<_, OrchestratorError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_deadline_expires() {
        let result: Result<(), _> = with_deadline(Duration::from_millis(500), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        let error = result.unwrap_err();
        assert_eq!(error.code(), ErrorCode::Cancelled);
        assert!(error.is_fatal());
        assert!(error.message().contains("500ms"));
    }
}
