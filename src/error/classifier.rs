//! Mapping of raw failures onto the error taxonomy.
//!
//! Native failures are classified by matching their lower-cased message
//! against an ordered rule list. Order matters: the first matching rule
//! wins, and anything unmatched becomes a retryable `UNKNOWN_ERROR`.

use std::error::Error as StdError;
use std::sync::OnceLock;

use regex::Regex;

use super::taxonomy::{BoxError, Classification, OrchestratorError};

/// A failure as it leaves a protected operation.
#[derive(Debug)]
pub enum Failure {
    /// Already part of the taxonomy; passed through untouched.
    Classified(OrchestratorError),
    /// Anything else. Classified by message.
    Native(BoxError),
}

impl Failure {
    /// Wraps an arbitrary error. A taxonomy value stays classified.
    pub fn native<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::from(Box::new(error) as BoxError)
    }
}

impl From<OrchestratorError> for Failure {
    fn from(error: OrchestratorError) -> Self {
        Self::Classified(error)
    }
}

impl From<BoxError> for Failure {
    fn from(error: BoxError) -> Self {
        match error.downcast::<OrchestratorError>() {
            Ok(classified) => Self::Classified(*classified),
            Err(native) => Self::Native(native),
        }
    }
}

impl From<std::io::Error> for Failure {
    fn from(error: std::io::Error) -> Self {
        Self::Native(Box::new(error))
    }
}

impl From<serde_json::Error> for Failure {
    fn from(error: serde_json::Error) -> Self {
        Self::Native(Box::new(error))
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self::Native(message.into())
    }
}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Self::Native(message.into())
    }
}

/// Taxonomy kinds a message-based rule may assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    Network,
    Permission,
}

impl RuleTarget {
    fn build(self, message: String) -> OrchestratorError {
        match self {
            Self::Network => OrchestratorError::network(message),
            Self::Permission => OrchestratorError::permission(message),
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Pattern(Regex),
    /// Lower-cased literals, any of which may appear in the text.
    Keywords(Vec<String>),
}

/// One entry in the ordered classification rule list.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    matcher: Matcher,
    target: RuleTarget,
    description: String,
}

impl ClassifierRule {
    /// Creates a rule from a regex pattern. Matching is case-insensitive.
    pub fn new(
        pattern: &str,
        target: RuleTarget,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            matcher: Matcher::Pattern(Regex::new(&format!("(?i){}", pattern))?),
            target,
            description: description.into(),
        })
    }

    /// Creates a rule matching any of the given literal substrings,
    /// ignoring case.
    pub fn keywords(keywords: &[&str], target: RuleTarget, description: impl Into<String>) -> Self {
        Self {
            matcher: Matcher::Keywords(keywords.iter().map(|k| k.to_lowercase()).collect()),
            target,
            description: description.into(),
        }
    }

    pub fn target(&self) -> RuleTarget {
        self.target
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn matches(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Pattern(regex) => regex.is_match(text),
            Matcher::Keywords(keywords) => {
                let lowered = text.to_lowercase();
                keywords.iter().any(|k| lowered.contains(k.as_str()))
            }
        }
    }
}

/// Ordered, first-match-wins classifier for native failures.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassifierRule>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            rules: Self::default_rules(),
        }
    }
}

impl Classifier {
    /// Creates a classifier with custom rules (checked in order).
    pub fn with_rules(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    /// Builds a classifier whose `extra` rules are checked before the defaults.
    pub fn with_leading_rules(extra: Vec<ClassifierRule>) -> Self {
        let mut rules = extra;
        rules.extend(Self::default_rules());
        Self { rules }
    }

    /// The process-wide default classifier. Immutable.
    pub fn shared() -> &'static Classifier {
        static SHARED: OnceLock<Classifier> = OnceLock::new();
        SHARED.get_or_init(Classifier::default)
    }

    fn default_rules() -> Vec<ClassifierRule> {
        vec![
            ClassifierRule::keywords(
                &["timeout", "network", "econnreset"],
                RuleTarget::Network,
                "Network or timeout failure",
            ),
            ClassifierRule::keywords(
                &["permission", "eacces"],
                RuleTarget::Permission,
                "Permission denied",
            ),
        ]
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Classifies a bare message into a new taxonomy error.
    pub fn classify_message(&self, message: impl Into<String>) -> OrchestratorError {
        let message = message.into();
        match self.rules.iter().find(|rule| rule.matches(&message)) {
            Some(rule) => rule.target.build(message),
            None => OrchestratorError::unknown(message),
        }
    }

    /// Maps any failure onto the taxonomy.
    ///
    /// Taxonomy values are returned unchanged. Native failures are
    /// classified by message and kept as the cause of the new error.
    pub fn normalize(&self, failure: impl Into<Failure>) -> OrchestratorError {
        match failure.into() {
            Failure::Classified(error) => error,
            Failure::Native(native) => match native.downcast::<OrchestratorError>() {
                Ok(classified) => *classified,
                Err(native) => {
                    let message = native.to_string();
                    self.classify_message(message)
                        .with_shared_cause(native.into())
                }
            },
        }
    }

    /// Classification a failure would receive, without consuming it.
    pub fn classification_of(&self, failure: &Failure) -> Classification {
        match failure {
            Failure::Classified(error) => error.classification(),
            Failure::Native(native) => {
                if let Some(classified) = native.downcast_ref::<OrchestratorError>() {
                    return classified.classification();
                }
                let message = native.to_string();
                match self.rules.iter().find(|rule| rule.matches(&message)) {
                    Some(rule) if rule.target == RuleTarget::Permission => Classification::Fatal,
                    _ => Classification::Retryable,
                }
            }
        }
    }
}

/// Maps any failure onto the taxonomy using the default rules.
pub fn normalize(failure: impl Into<Failure>) -> OrchestratorError {
    Classifier::shared().normalize(failure)
}

/// True when the failure would be classified as fatal.
pub fn is_fatal(failure: &Failure) -> bool {
    Classifier::shared().classification_of(failure) == Classification::Fatal
}

/// True when the failure would be classified as retryable.
pub fn is_retryable(failure: &Failure) -> bool {
    Classifier::shared().classification_of(failure) == Classification::Retryable
}
