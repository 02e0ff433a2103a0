//! Suppression of repeat escalations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::notifier::EscalationNotifier;
use super::{EscalationEvent, EscalationLevel};
use crate::error::ErrorCategory;

type DedupKey = (ErrorCategory, EscalationLevel);

/// Forwards an event only if no event with the same category and level
/// was forwarded within `window`, measured by event timestamps.
#[derive(Debug)]
pub struct DedupNotifier {
    inner: Arc<dyn EscalationNotifier>,
    window: Duration,
    seen: Mutex<HashMap<DedupKey, DateTime<Utc>>>,
}

impl DedupNotifier {
    pub fn new(inner: Arc<dyn EscalationNotifier>, window: Duration) -> Self {
        Self {
            inner,
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Forgets every forwarded event.
    pub fn clear(&self) {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Records the event and reports whether it should be forwarded.
    fn admit(&self, event: &EscalationEvent) -> bool {
        let key = (event.error.category(), event.level);
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let window = self.window;
        seen.retain(|_, forwarded_at| event.timestamp - *forwarded_at < window);

        if seen.contains_key(&key) {
            return false;
        }
        seen.insert(key, event.timestamp);
        true
    }
}

impl EscalationNotifier for DedupNotifier {
    fn notify(&self, event: &EscalationEvent) {
        if self.admit(event) {
            self.inner.notify(event);
        } else {
            debug!(
                level = %event.level,
                category = %event.error.category(),
                "Suppressed duplicate escalation"
            );
        }
    }
}
