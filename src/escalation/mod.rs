//! Escalation of unrecovered errors to a human-facing channel.
//!
//! Each unrecovered error is classified exactly once into a severity
//! [`EscalationLevel`], paired with ordered remediation suggestions, and
//! handed to the configured [`EscalationNotifier`].

pub mod dedup;
pub mod notifier;
pub mod renderer;
pub mod suggestions;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::OrchestratorError;

pub use dedup::DedupNotifier;
pub use notifier::{ConsoleNotifier, EscalationNotifier, LoggingNotifier, NoopNotifier};
pub use renderer::EscalationRenderer;
pub use suggestions::suggested_actions;

/// Retry count at or above which a non-fatal error escalates.
pub const ESCALATION_RETRY_THRESHOLD: u32 = 3;

/// Severity of an escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscalationLevel {
    /// Worth a look; the workflow may continue.
    Warning,
    /// Repeated failure; a human should step in.
    Escalation,
    /// Fatal or security-related; stop and fix.
    Critical,
}

impl EscalationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "WARNING",
            Self::Escalation => "ESCALATION",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for EscalationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assigns a severity, in precedence order:
///
/// 1. `CRITICAL` for fatal errors and `AUTH_ERROR`/`PERMISSION_ERROR` codes
/// 2. `ESCALATION` when `retry_count >= 3`
/// 3. `WARNING` otherwise
pub fn determine_escalation_level(error: &OrchestratorError) -> EscalationLevel {
    if error.is_fatal() || error.code().is_security() {
        EscalationLevel::Critical
    } else if error.retry_count() >= ESCALATION_RETRY_THRESHOLD {
        EscalationLevel::Escalation
    } else {
        EscalationLevel::Warning
    }
}

/// One escalation, created exactly once per unrecovered error.
#[derive(Debug, Clone)]
pub struct EscalationEvent {
    pub level: EscalationLevel,
    pub error: OrchestratorError,
    /// Invocations of the operation before giving up.
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
    /// Ordered remediation steps; the universal steps come last.
    pub suggested_actions: Vec<String>,
    pub context_label: Option<String>,
    /// Guidance returned by the recovery strategy, if recovery ran.
    pub recovery_note: Option<String>,
}

impl EscalationEvent {
    /// Builds the event for `error`, computing its level and suggestions.
    pub fn new(error: OrchestratorError, attempts: u32, context_label: Option<&str>) -> Self {
        Self {
            level: determine_escalation_level(&error),
            suggested_actions: suggested_actions(&error),
            error,
            attempts,
            timestamp: Utc::now(),
            context_label: context_label.map(str::to_string),
            recovery_note: None,
        }
    }

    pub fn with_recovery_note(mut self, note: impl Into<String>) -> Self {
        self.recovery_note = Some(note.into());
        self
    }

    /// One-line summary suitable for a log line or a chat message.
    pub fn summary(&self) -> String {
        format!(
            "[{}] {}: {} ({}, {} attempt{})",
            self.level,
            self.context_label.as_deref().unwrap_or("operation"),
            self.error,
            self.error.code(),
            self.attempts,
            if self.attempts == 1 { "" } else { "s" }
        )
    }
}

/// Largest de-duplication window, in seconds, a [`chrono::Duration`] can hold.
pub const MAX_DEDUP_WINDOW_SECS: u64 = (i64::MAX / 1000) as u64;

/// Escalation settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Suppress repeat escalations of the same category and level within
    /// this many seconds. `None` disables de-duplication.
    pub dedup_window_secs: Option<u64>,
}

/// Builds escalation events and delivers them to the notifier.
#[derive(Debug, Clone)]
pub struct EscalationCoordinator {
    notifier: Arc<dyn EscalationNotifier>,
}

impl Default for EscalationCoordinator {
    fn default() -> Self {
        Self::new(Arc::new(LoggingNotifier))
    }
}

impl EscalationCoordinator {
    pub fn new(notifier: Arc<dyn EscalationNotifier>) -> Self {
        Self { notifier }
    }

    /// Builds a coordinator from config, wrapping `notifier` in a
    /// [`DedupNotifier`] when a window is configured.
    pub fn from_config(config: &EscalationConfig, notifier: Arc<dyn EscalationNotifier>) -> Self {
        match config.dedup_window_secs {
            Some(secs) => {
                let window = i64::try_from(secs)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                    .unwrap_or_else(|| {
                        warn!(secs, "Dedup window out of range, clamping to maximum");
                        chrono::Duration::MAX
                    });
                Self::new(Arc::new(DedupNotifier::new(notifier, window)))
            }
            None => Self::new(notifier),
        }
    }

    pub fn determine_level(&self, error: &OrchestratorError) -> EscalationLevel {
        determine_escalation_level(error)
    }

    /// Escalates `error`, invoking the notifier exactly once.
    pub fn escalate(
        &self,
        error: &OrchestratorError,
        attempts: u32,
        context_label: Option<&str>,
        recovery_note: Option<&str>,
    ) -> EscalationEvent {
        let mut event = EscalationEvent::new(error.clone(), attempts, context_label);
        if let Some(note) = recovery_note {
            event = event.with_recovery_note(note);
        }
        debug!(level = %event.level, code = %error.code(), "Escalating error");
        self.notifier.notify(&event);
        event
    }
}
