//! Resilience core for orchestrated automation workflows.
//!
//! Failures are normalized into a closed taxonomy ([`error`]), retried
//! with exponential backoff and jitter ([`retry`]), handed to bounded
//! category-specific recovery ([`recovery`]) and, when unrecovered,
//! escalated with a severity level and remediation steps
//! ([`escalation`]). [`handler::ErrorHandler`] composes all of it and
//! records per-category counters in [`metrics`].

pub mod error;
pub mod escalation;
pub mod handler;
pub mod logging;
pub mod metrics;
pub mod recovery;
pub mod retry;
pub mod settings;
pub mod timeout;

pub use error::{normalize, OrchestratorError};
pub use handler::ErrorHandler;
pub use settings::ResilienceConfig;
