//! Retry engine with exponential backoff and jitter.
//!
//! A caller hands the engine a zero-argument async operation. On failure
//! the error is normalized; fatal errors and policy refusals return
//! immediately, everything else is retried after
//! `min(initial * multiplier^attempt, max)` milliseconds (optionally
//! jittered) until the budget of `max_retries` is spent.

pub mod backoff;
pub mod engine;
pub mod hooks;

pub use backoff::RetryConfig;
pub use engine::{RetryEngine, RetryOutcome};
pub use hooks::{DefaultRetryPolicy, LoggingObserver, NoopObserver, RetryObserver, RetryPolicy};
