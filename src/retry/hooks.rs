//! Retry decision and observation interfaces.
//!
//! Both are injected into a [`RetryEngine`](super::RetryEngine) at
//! construction and called synchronously from the retry loop, so
//! implementations must return promptly.

use std::fmt;
use std::time::Duration;

use tracing::info;

use crate::error::OrchestratorError;

/// Decides whether a non-fatal failure should be retried.
///
/// Fatal errors never reach the policy; the engine stops on them first.
pub trait RetryPolicy: Send + Sync {
    /// `attempt` is the 0-based index of the attempt that just failed.
    fn should_retry(&self, error: &OrchestratorError, attempt: u32) -> bool;
}

/// Retries everything that is not fatal, including unclassified failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, error: &OrchestratorError, _attempt: u32) -> bool {
        !error.is_fatal()
    }
}

/// Observes scheduled retries. Must not influence control flow.
pub trait RetryObserver: Send + Sync {
    /// Called once per scheduled retry, before the backoff sleep.
    /// `attempt` is the 1-based number of the retry about to happen.
    fn on_retry(&self, error: &OrchestratorError, attempt: u32, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl RetryObserver for NoopObserver {
    fn on_retry(&self, _error: &OrchestratorError, _attempt: u32, _delay: Duration) {}
}

/// Logs every scheduled retry at info level.
#[derive(Debug, Clone, Default)]
pub struct LoggingObserver {
    label: Option<String>,
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags every log line with `label`.
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
        }
    }
}

impl RetryObserver for LoggingObserver {
    fn on_retry(&self, error: &OrchestratorError, attempt: u32, delay: Duration) {
        info!(
            observer = self.label.as_deref().unwrap_or("retry"),
            code = %error.code(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Retrying after failure: {}",
            error
        );
    }
}

impl fmt::Debug for dyn RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetryPolicy")
    }
}

impl fmt::Debug for dyn RetryObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetryObserver")
    }
}
