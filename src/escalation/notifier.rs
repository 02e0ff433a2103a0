//! Notification channels for escalation events.

use std::fmt;
use std::io::Write;

use tracing::{error, warn};

use super::renderer::EscalationRenderer;
use super::{EscalationEvent, EscalationLevel};

/// Delivers escalation events to a human-facing channel.
///
/// Called synchronously, once per escalation. Implementations must return
/// promptly and must not panic; validate anything that could fail when the
/// notifier is constructed.
pub trait EscalationNotifier: Send + Sync {
    fn notify(&self, event: &EscalationEvent);
}

impl fmt::Debug for dyn EscalationNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EscalationNotifier")
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl EscalationNotifier for NoopNotifier {
    fn notify(&self, _event: &EscalationEvent) {}
}

/// Default notifier: logs the event and its ordered suggestions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl EscalationNotifier for LoggingNotifier {
    fn notify(&self, event: &EscalationEvent) {
        let suggestions = event.suggested_actions.join("; ");
        let context = event.context_label.as_deref().unwrap_or("operation");
        match event.level {
            EscalationLevel::Critical => error!(
                level = %event.level,
                context,
                code = %event.error.code(),
                attempts = event.attempts,
                suggestions = %suggestions,
                "{}",
                event.error
            ),
            EscalationLevel::Escalation | EscalationLevel::Warning => warn!(
                level = %event.level,
                context,
                code = %event.error.code(),
                attempts = event.attempts,
                suggestions = %suggestions,
                "{}",
                event.error
            ),
        }
    }
}

/// Prints a rendered panel to stderr.
#[derive(Debug, Clone, Default)]
pub struct ConsoleNotifier {
    renderer: EscalationRenderer,
}

impl ConsoleNotifier {
    pub fn new(renderer: EscalationRenderer) -> Self {
        Self { renderer }
    }
}

impl EscalationNotifier for ConsoleNotifier {
    fn notify(&self, event: &EscalationEvent) {
        let panel = self.renderer.render(event);
        // Nothing sensible to do if stderr is gone.
        let _ = writeln!(std::io::stderr().lock(), "{}", panel);
    }
}
