//! Category-specific recovery strategies.
//!
//! Recovery never re-runs the failed operation. Each category maps to a
//! bounded action that yields guidance and, where a strategy can produce
//! one, a usable replacement value. No current strategy produces a value:
//! recovery is advisory and its message feeds the escalation event.
//! Callers must check [`RecoveryOutcome::is_resolved`] before treating an
//! error as handled.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ErrorCode, ErrorKind, OrchestratorError, ResourceType};
use crate::timeout::{sleep_cancellable, SleepOutcome};

/// Recovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// How long resource-exhaustion recovery waits for memory/CPU to free up.
    pub grace_period_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: 5000,
        }
    }
}

/// Result of a recovery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryOutcome<T> {
    /// Whether the strategy considers the error resolved.
    pub success: bool,
    /// Guidance for the operator.
    pub message: String,
    /// A value the caller may use in place of the failed result.
    pub recovered_value: Option<T>,
}

impl<T> RecoveryOutcome<T> {
    /// An outcome that only carries guidance.
    pub fn advisory(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            recovered_value: None,
        }
    }

    /// An outcome with a usable replacement value.
    pub fn recovered(value: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            recovered_value: Some(value),
        }
    }

    /// True only when the strategy succeeded and produced a value.
    pub fn is_resolved(&self) -> bool {
        self.success && self.recovered_value.is_some()
    }

    /// The replacement value, if the outcome is resolved.
    pub fn into_value(self) -> Option<T> {
        if self.success {
            self.recovered_value
        } else {
            None
        }
    }
}

/// Dispatches classified errors to their recovery strategy.
#[derive(Debug, Clone, Default)]
pub struct RecoveryDispatcher {
    config: RecoveryConfig,
}

impl RecoveryDispatcher {
    pub fn new(config: RecoveryConfig) -> Self {
        Self { config }
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.config.grace_period_ms)
    }

    /// Attempts recovery for `error`.
    pub async fn attempt_recovery<T>(
        &self,
        error: &OrchestratorError,
        context_label: Option<&str>,
    ) -> RecoveryOutcome<T> {
        self.dispatch(error, context_label, None).await
    }

    /// Like [`attempt_recovery`](Self::attempt_recovery), but the resource
    /// grace period ends early when `cancel` fires.
    pub async fn attempt_recovery_with_cancel<T>(
        &self,
        error: &OrchestratorError,
        context_label: Option<&str>,
        cancel: &CancellationToken,
    ) -> RecoveryOutcome<T> {
        self.dispatch(error, context_label, Some(cancel)).await
    }

    async fn dispatch<T>(
        &self,
        error: &OrchestratorError,
        context_label: Option<&str>,
        cancel: Option<&CancellationToken>,
    ) -> RecoveryOutcome<T> {
        let label = context_label.unwrap_or("operation");
        debug!(context = label, code = %error.code(), "Attempting recovery");

        match error.kind() {
            ErrorKind::LlmApi { provider, .. } => match error.code() {
                ErrorCode::RateLimit => {
                    info!(context = label, provider = %provider, "Rate limited by provider");
                    RecoveryOutcome::advisory("retry with backoff")
                }
                ErrorCode::AuthError => RecoveryOutcome::advisory("check credentials"),
                _ => RecoveryOutcome::advisory("no recovery strategy available"),
            },
            ErrorKind::ExternalTool { command, .. } => {
                debug!(context = label, command = %command, "External tool failures need an operator");
                RecoveryOutcome::advisory("manual intervention required")
            }
            ErrorKind::StateCorruption { .. } => {
                RecoveryOutcome::advisory("restore from history recommended")
            }
            ErrorKind::ResourceExhausted { resource_type, .. }
                if matches!(resource_type, ResourceType::Memory | ResourceType::Cpu) =>
            {
                self.wait_for_resources(resource_type, label, cancel).await
            }
            ErrorKind::ResourceExhausted { .. }
            | ErrorKind::Network
            | ErrorKind::Permission
            | ErrorKind::Unknown
            | ErrorKind::Parse { .. }
            | ErrorKind::Cancelled => RecoveryOutcome::advisory("no recovery strategy available"),
        }
    }

    async fn wait_for_resources<T>(
        &self,
        resource_type: &ResourceType,
        label: &str,
        cancel: Option<&CancellationToken>,
    ) -> RecoveryOutcome<T> {
        let grace = self.grace_period();
        info!(
            context = label,
            resource = %resource_type,
            grace_ms = grace.as_millis() as u64,
            "Waiting for resources to free up"
        );
        match sleep_cancellable(grace, cancel).await {
            SleepOutcome::Elapsed => {
                RecoveryOutcome::advisory("waited for resources - retry operation")
            }
            SleepOutcome::Cancelled => {
                RecoveryOutcome::advisory("resource wait cancelled - retry operation")
            }
        }
    }
}
