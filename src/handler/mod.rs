//! The error handler: retry, then metrics, recovery and escalation.
//!
//! [`ErrorHandler`] is an ordinary value. Build one at startup and pass
//! it (or clones of it, which share the metrics store) to whatever needs
//! protection; tests build isolated instances.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{normalize, ErrorKind, Failure, OrchestratorError};
use crate::escalation::{EscalationCoordinator, EscalationNotifier, LoggingNotifier};
use crate::metrics::ErrorMetricsStore;
use crate::recovery::{RecoveryDispatcher, RecoveryOutcome};
use crate::retry::{RetryEngine, RetryObserver, RetryOutcome, RetryPolicy};
use crate::settings::ResilienceConfig;

/// Composes the retry engine, recovery dispatcher, escalation
/// coordinator and metrics store around one operation at a time.
#[derive(Debug, Clone)]
pub struct ErrorHandler {
    config: ResilienceConfig,
    retry: RetryEngine,
    recovery: RecoveryDispatcher,
    escalation: EscalationCoordinator,
    metrics: ErrorMetricsStore,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(ResilienceConfig::default())
    }
}

impl ErrorHandler {
    /// A handler with the default policy, no retry observer and the
    /// logging escalation notifier.
    pub fn new(config: ResilienceConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ErrorHandlerBuilder {
        ErrorHandlerBuilder::default()
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ErrorMetricsStore {
        &self.metrics
    }

    pub fn retry_engine(&self) -> &RetryEngine {
        &self.retry
    }

    /// Runs `operation` under the configured policy.
    ///
    /// On success the value is returned. On terminal failure the error is
    /// recorded, recovery is attempted, and the error is escalated and
    /// returned unless recovery produced a usable value.
    pub async fn handle_operation<T, E, F, Fut>(
        &self,
        operation: F,
        context_label: Option<&str>,
    ) -> Result<T, OrchestratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        self.run(operation, context_label, None).await
    }

    /// Like [`handle_operation`](Self::handle_operation), but both the
    /// retry backoff and the resource grace period end early when `cancel`
    /// fires. A cancelled operation is recorded but neither recovered nor
    /// escalated.
    pub async fn handle_operation_with_cancel<T, E, F, Fut>(
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
        self.run(operation, context_label, Some(cancel)).await
    }

    async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        context_label: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, OrchestratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        let result = if self.config.enable_retry {
            self.retry
                .execute_detailed(operation, context_label, cancel)
                .await
        } else {
            match operation().await {
                Ok(value) => Ok(RetryOutcome::first_try(value)),
                Err(failure) => Err(normalize(failure)),
            }
        };

        match result {
            Ok(outcome) => {
                if let Some(category) = outcome.recovered_from {
                    self.metrics.record_retry_success(category);
                }
                Ok(outcome.value)
            }
            Err(error) => self.handle_failure(error, context_label, cancel).await,
        }
    }

    async fn handle_failure<T>(
        &self,
        error: OrchestratorError,
        context_label: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> Result<T, OrchestratorError> {
        let category = error.category();
        let count = self.metrics.record_error(category);
        debug!(
            context = context_label.unwrap_or("operation"),
            category = %category,
            count,
            "Recorded terminal failure"
        );

        if matches!(error.kind(), ErrorKind::Cancelled) {
            return Err(error);
        }

        let mut recovery_note = None;
        if self.config.enable_recovery {
            let outcome: RecoveryOutcome<T> = match cancel {
                Some(token) => {
                    self.recovery
                        .attempt_recovery_with_cancel(&error, context_label, token)
                        .await
                }
                None => self.recovery.attempt_recovery(&error, context_label).await,
            };

            if outcome.is_resolved() {
                if let Some(value) = outcome.recovered_value {
                    info!(
                        context = context_label.unwrap_or("operation"),
                        category = %category,
                        "Recovered: {}",
                        outcome.message
                    );
                    self.metrics.record_recovery_success(category);
                    return Ok(value);
                }
            }
            recovery_note = Some(outcome.message);
        }

        if self.config.enable_escalation {
            self.escalation.escalate(
                &error,
                error.retry_count() + 1,
                context_label,
                recovery_note.as_deref(),
            );
        }

        Err(error)
    }
}

/// Builder for [`ErrorHandler`].
#[derive(Default)]
pub struct ErrorHandlerBuilder {
    config: ResilienceConfig,
    policy: Option<Arc<dyn RetryPolicy>>,
    observer: Option<Arc<dyn RetryObserver>>,
    notifier: Option<Arc<dyn EscalationNotifier>>,
    metrics: Option<ErrorMetricsStore>,
}

impl ErrorHandlerBuilder {
    pub fn config(mut self, config: ResilienceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn retry_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn EscalationNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Shares an existing metrics store instead of creating a fresh one.
    pub fn metrics(mut self, metrics: ErrorMetricsStore) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> ErrorHandler {
        let mut retry = RetryEngine::new(self.config.retry.clone());
        if let Some(policy) = self.policy {
            retry = retry.with_policy(policy);
        }
        if let Some(observer) = self.observer {
            retry = retry.with_observer(observer);
        }

        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(LoggingNotifier) as Arc<dyn EscalationNotifier>);

        ErrorHandler {
            recovery: RecoveryDispatcher::new(self.config.recovery.clone()),
            escalation: EscalationCoordinator::from_config(&self.config.escalation, notifier),
            metrics: self.metrics.unwrap_or_default(),
            retry,
            config: self.config,
        }
    }
}
