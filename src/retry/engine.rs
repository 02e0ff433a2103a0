//! The retry loop.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::RetryConfig;
use super::hooks::{DefaultRetryPolicy, NoopObserver, RetryObserver, RetryPolicy};
use crate::error::{normalize, ErrorCategory, Failure, OrchestratorError};
use crate::timeout::{sleep_cancellable, SleepOutcome};

/// A successful result plus what it took to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryOutcome<T> {
    pub value: T,
    /// Total invocations of the operation, including the successful one.
    pub attempts: u32,
    /// Category of the failure immediately before the success, if any.
    pub recovered_from: Option<ErrorCategory>,
}

impl<T> RetryOutcome<T> {
    pub fn first_try(value: T) -> Self {
        Self {
            value,
            attempts: 1,
            recovered_from: None,
        }
    }

    /// True when at least one retry was needed.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }
}

/// Re-invokes one asynchronous operation under exponential backoff.
///
/// The engine itself is stateless between calls: the attempt counter and
/// last error live on the stack of each `execute_*` call, so one engine
/// may serve any number of concurrent calls.
#[derive(Debug, Clone)]
pub struct RetryEngine {
    config: RetryConfig,
    policy: Arc<dyn RetryPolicy>,
    observer: Arc<dyn RetryObserver>,
}

impl Default for RetryEngine {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryEngine {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            policy: Arc::new(DefaultRetryPolicy),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replaces the retry predicate.
    pub fn with_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the retry observer.
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `operation` until it succeeds, fails fatally, is refused by the
    /// policy, or exhausts the retry budget.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        operation: F,
        context_label: Option<&str>,
    ) -> Result<T, OrchestratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        self.execute_detailed(operation, context_label, None)
            .await
            .map(|outcome| outcome.value)
    }

    /// Like [`execute_with_retry`](Self::execute_with_retry), but the
    /// backoff sleep ends early when `cancel` fires.
    pub async fn execute_with_cancel<T, E, F, Fut>(
        &self,
        operation: F,
        context_label: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<T, OrchestratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        self.execute_detailed(operation, context_label, Some(cancel))
            .await
            .map(|outcome| outcome.value)
    }

    /// The full retry loop, reporting attempt counts on success.
    ///
    /// Every returned error carries `retry_count` equal to the number of
    /// retries performed before it.
    pub async fn execute_detailed<T, E, F, Fut>(
        &self,
        mut operation: F,
        context_label: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<RetryOutcome<T>, OrchestratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        let label = context_label.unwrap_or("operation");
        let mut attempt: u32 = 0;
        let mut recovered_from = None;

        loop {
            debug!(context = label, attempt = attempt + 1, "Invoking operation");

            let failure = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            context = label,
                            attempts = attempt + 1,
                            "Operation succeeded after retry"
                        );
                    }
                    return Ok(RetryOutcome {
                        value,
                        attempts: attempt + 1,
                        recovered_from,
                    });
                }
                Err(failure) => failure,
            };

            let error = normalize(failure).with_retry_count(attempt);

            if error.is_fatal() {
                warn!(
                    context = label,
                    code = %error.code(),
                    attempt = attempt + 1,
                    "Fatal error, not retrying: {}",
                    error
                );
                return Err(error);
            }

            if !self.policy.should_retry(&error, attempt) {
                warn!(
                    context = label,
                    code = %error.code(),
                    attempt = attempt + 1,
                    "Retry policy declined: {}",
                    error
                );
                return Err(error);
            }

            if attempt >= self.config.max_retries {
                warn!(
                    context = label,
                    code = %error.code(),
                    retries = attempt,
                    "Retry budget exhausted: {}",
                    error
                );
                return Err(OrchestratorError::retries_exhausted(error, attempt));
            }

            let delay = self.config.calculate_delay(attempt);
            self.observer.on_retry(&error, attempt + 1, delay);
            warn!(
                context = label,
                code = %error.code(),
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Retryable error, backing off: {}",
                error
            );
            recovered_from = Some(error.category());

            if sleep_cancellable(delay, cancel).await == SleepOutcome::Cancelled {
                return Err(OrchestratorError::cancelled(format!(
                    "{} cancelled during retry backoff",
                    label
                ))
                .with_retry_count(attempt)
                .with_cause(error));
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig::default()
            .with_max_retries(max_retries)
            .with_jitter(false)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let engine = RetryEngine::new(fast_config(3));
        let outcome = engine
            .execute_detailed(|| async { Ok::<_, OrchestratorError>("done") }, None, None)
            .await
            .unwrap();

        assert_eq!(outcome.value, "done");
        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.was_retried());
        assert_eq!(outcome.recovered_from, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovered_from_records_last_category() {
        let engine = RetryEngine::new(fast_config(3));
        let calls = AtomicU32::new(0);

        let outcome = engine
            .execute_detailed(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(Failure::from("socket timeout"))
                        } else {
                            Ok(n)
                        }
                    }
                },
                Some("fetch"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.recovered_from, Some(ErrorCategory::Network));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_immediately() {
        let engine = RetryEngine::new(fast_config(5));
        let calls = AtomicU32::new(0);

        let error = engine
            .execute_with_retry(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("EACCES: permission denied") }
                },
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(error.code(), ErrorCode::PermissionError);
        assert_eq!(error.retry_count(), 0);
        assert!(!error.is_retry_exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_wraps_last_error() {
        let engine = RetryEngine::new(fast_config(2));

        let error = engine
            .execute_with_retry(
                || async { Err::<(), _>(OrchestratorError::network("connection reset")) },
                Some("upload"),
            )
            .await
            .unwrap_err();

        assert!(error.is_retry_exhausted());
        assert_eq!(error.retry_count(), 2);
        assert_eq!(error.code(), ErrorCode::NetworkError);
        assert!(error.message().contains("after 2 retries"));
        assert_eq!(
            error.cause().map(|c| c.to_string()).as_deref(),
            Some("connection reset")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_runs_once() {
        let engine = RetryEngine::new(fast_config(0));
        let calls = AtomicU32::new(0);

        let error = engine
            .execute_with_retry(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), _>("network down") }
                },
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(error.is_retry_exhausted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleeps_between_attempts() {
        let engine = RetryEngine::new(fast_config(2));
        let start = tokio::time::Instant::now();

        let _ = engine
            .execute_with_retry(|| async { Err::<(), _>("timeout") }, None)
            .await;

        // 1000ms + 2000ms of backoff
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let engine = RetryEngine::new(fast_config(5).with_initial_delay_ms(60_000));
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let error = engine
            .execute_with_cancel(|| async { Err::<(), _>("timeout") }, Some("sync"), &token)
            .await
            .unwrap_err();

        assert_eq!(error.code(), ErrorCode::Cancelled);
        assert!(error.message().contains("sync"));
        assert_eq!(error.cause().map(|c| c.to_string()).as_deref(), Some("timeout"));
    }
}
