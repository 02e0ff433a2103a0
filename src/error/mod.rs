//! Error taxonomy and classification.
//!
//! This module defines the closed set of error kinds an orchestrated
//! operation can fail with, the retryable/fatal split, and `normalize`,
//! which maps arbitrary failures onto the taxonomy.

pub mod classifier;
pub mod taxonomy;

// Re-export main types for convenient access
pub use classifier::{
    is_fatal, is_retryable, normalize, Classifier, ClassifierRule, Failure, RuleTarget,
};
pub use taxonomy::{
    BoxError, Classification, ErrorCategory, ErrorCode, ErrorKind, OrchestratorError,
    ResourceType, SharedError,
};
