//! Error taxonomy for orchestrated operations.
//!
//! Every failure that leaves the resilience layer is an [`OrchestratorError`].
//! Its [`ErrorKind`] is a closed set of categories, and each kind carries a
//! fixed [`Classification`] (retryable or fatal) and a code drawn from a
//! finite vocabulary.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A boxed native failure, as produced by arbitrary I/O or library code.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// A shared, cloneable error used for cause chains.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Whether an error may be attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// The operation may succeed if attempted again.
    Retryable,
    /// No retry will help; the failure needs intervention.
    Fatal,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retryable => write!(f, "retryable"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NetworkError,
    PermissionError,
    UnknownError,
    /// Provider rejected the request with HTTP 429.
    RateLimit,
    /// Provider rejected the credentials (HTTP 401/403).
    AuthError,
    LlmApiError,
    ExternalToolError,
    ParseError,
    StateCorruption,
    ResourceExhausted,
    Cancelled,
}

impl ErrorCode {
    /// Returns the wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::PermissionError => "PERMISSION_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::RateLimit => "RATE_LIMIT",
            Self::AuthError => "AUTH_ERROR",
            Self::LlmApiError => "LLM_API_ERROR",
            Self::ExternalToolError => "EXTERNAL_TOOL_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::StateCorruption => "STATE_CORRUPTION",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Codes that always indicate a security or credential problem.
    pub fn is_security(&self) -> bool {
        matches!(self, Self::AuthError | Self::PermissionError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of resource that ran out. Serialized as its plain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceType {
    Memory,
    Cpu,
    Disk,
    Network,
    /// Any other named resource (file handles, GPU, quota units...).
    Other(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Memory => "memory",
            Self::Cpu => "cpu",
            Self::Disk => "disk",
            Self::Network => "network",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ResourceType {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "memory" => Self::Memory,
            "cpu" => Self::Cpu,
            "disk" => Self::Disk,
            "network" => Self::Network,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ResourceType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<ResourceType> for String {
    fn from(value: ResourceType) -> Self {
        match value {
            ResourceType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

/// Category of an error, without its payload. Used as the metrics key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Permission,
    Unknown,
    LlmApi,
    ExternalTool,
    Parse,
    StateCorruption,
    ResourceExhausted,
    Cancelled,
}

impl ErrorCategory {
    /// All categories, in declaration order.
    pub const ALL: [ErrorCategory; 9] = [
        Self::Network,
        Self::Permission,
        Self::Unknown,
        Self::LlmApi,
        Self::ExternalTool,
        Self::Parse,
        Self::StateCorruption,
        Self::ResourceExhausted,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Permission => "permission",
            Self::Unknown => "unknown",
            Self::LlmApi => "llm_api",
            Self::ExternalTool => "external_tool",
            Self::Parse => "parse",
            Self::StateCorruption => "state_corruption",
            Self::ResourceExhausted => "resource_exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The concrete variant of an [`OrchestratorError`] and its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Connectivity failures: timeouts, resets, DNS.
    Network,
    /// Access was denied by the OS or a remote service.
    Permission,
    /// Nothing more specific matched. Treated as transient.
    Unknown,
    /// A language-model provider call failed.
    LlmApi {
        status_code: Option<u16>,
        provider: String,
    },
    /// An external command (git, a formatter, a test runner) failed.
    ExternalTool { command: String, stderr: String },
    /// A document or config file could not be parsed.
    Parse {
        file_path: Option<PathBuf>,
        line_number: Option<u32>,
    },
    /// Persisted workflow state is unreadable or inconsistent.
    StateCorruption {
        state_file_path: PathBuf,
        corruption_type: String,
    },
    /// A host resource hit its limit.
    ResourceExhausted {
        resource_type: ResourceType,
        current_usage: f64,
        limit: f64,
    },
    /// The caller cancelled the operation or its deadline passed.
    Cancelled,
}

impl ErrorKind {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network => ErrorCategory::Network,
            Self::Permission => ErrorCategory::Permission,
            Self::Unknown => ErrorCategory::Unknown,
            Self::LlmApi { .. } => ErrorCategory::LlmApi,
            Self::ExternalTool { .. } => ErrorCategory::ExternalTool,
            Self::Parse { .. } => ErrorCategory::Parse,
            Self::StateCorruption { .. } => ErrorCategory::StateCorruption,
            Self::ResourceExhausted { .. } => ErrorCategory::ResourceExhausted,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// The retryable/fatal split for this kind.
    pub fn classification(&self) -> Classification {
        match self {
            Self::Network
            | Self::Unknown
            | Self::LlmApi { .. }
            | Self::ExternalTool { .. }
            | Self::ResourceExhausted { .. } => Classification::Retryable,
            Self::Permission
            | Self::Parse { .. }
            | Self::StateCorruption { .. }
            | Self::Cancelled => Classification::Fatal,
        }
    }

    fn default_code(&self) -> ErrorCode {
        match self {
            Self::Network => ErrorCode::NetworkError,
            Self::Permission => ErrorCode::PermissionError,
            Self::Unknown => ErrorCode::UnknownError,
            Self::LlmApi { status_code, .. } => match status_code {
                Some(429) => ErrorCode::RateLimit,
                Some(401) | Some(403) => ErrorCode::AuthError,
                _ => ErrorCode::LlmApiError,
            },
            Self::ExternalTool { .. } => ErrorCode::ExternalToolError,
            Self::Parse { .. } => ErrorCode::ParseError,
            Self::StateCorruption { .. } => ErrorCode::StateCorruption,
            Self::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            Self::Cancelled => ErrorCode::Cancelled,
        }
    }
}

/// A classified failure with message, code, context and cause chain.
///
/// Values are immutable once built: the `with_*`/`add_context` methods
/// consume `self` and return a new value.
#[derive(Debug, Clone)]
pub struct OrchestratorError {
    kind: ErrorKind,
    code: ErrorCode,
    message: String,
    context: HashMap<String, String>,
    retry_count: u32,
    retries_exhausted: bool,
    cause: Option<SharedError>,
}

impl OrchestratorError {
    fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let code = kind.default_code();
        Self {
            kind,
            code,
            message: message.into(),
            context: HashMap::new(),
            retry_count: 0,
            retries_exhausted: false,
            cause: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::Network, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::Permission, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::Unknown, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::Cancelled, message)
    }

    /// Creates an LLM provider error. The code is derived from the status:
    /// 429 maps to `RATE_LIMIT`, 401/403 to `AUTH_ERROR`.
    pub fn llm_api(
        message: impl Into<String>,
        provider: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::from_kind(
            ErrorKind::LlmApi {
                status_code,
                provider: provider.into(),
            },
            message,
        )
    }

    pub fn external_tool(
        message: impl Into<String>,
        command: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::from_kind(
            ErrorKind::ExternalTool {
                command: command.into(),
                stderr: stderr.into(),
            },
            message,
        )
    }

    pub fn parse(
        message: impl Into<String>,
        file_path: Option<PathBuf>,
        line_number: Option<u32>,
    ) -> Self {
        Self::from_kind(
            ErrorKind::Parse {
                file_path,
                line_number,
            },
            message,
        )
    }

    pub fn state_corruption(
        message: impl Into<String>,
        state_file_path: impl Into<PathBuf>,
        corruption_type: impl Into<String>,
    ) -> Self {
        Self::from_kind(
            ErrorKind::StateCorruption {
                state_file_path: state_file_path.into(),
                corruption_type: corruption_type.into(),
            },
            message,
        )
    }

    pub fn resource_exhausted(
        message: impl Into<String>,
        resource_type: impl Into<ResourceType>,
        current_usage: f64,
        limit: f64,
    ) -> Self {
        Self::from_kind(
            ErrorKind::ResourceExhausted {
                resource_type: resource_type.into(),
                current_usage,
                limit,
            },
            message,
        )
    }

    /// Wraps the last failure of an operation whose retry budget ran out.
    ///
    /// The new error keeps the kind and code of `last` so recovery and
    /// escalation still see the underlying category, and chains `last`
    /// as its cause.
    pub fn retries_exhausted(last: OrchestratorError, retries: u32) -> Self {
        Self {
            kind: last.kind.clone(),
            code: last.code,
            message: format!("operation failed after {} retries: {}", retries, last.message),
            context: last.context.clone(),
            retry_count: retries,
            retries_exhausted: true,
            cause: Some(Arc::new(last)),
        }
    }

    /// Adds a context key-value pair to the error.
    pub fn add_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Chains `cause` as the underlying error.
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_shared_cause(mut self, cause: SharedError) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Records how many retries preceded this error.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &HashMap<String, String> {
        &self.context
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    pub fn classification(&self) -> Classification {
        self.kind.classification()
    }

    pub fn is_fatal(&self) -> bool {
        self.classification() == Classification::Fatal
    }

    pub fn is_retryable(&self) -> bool {
        self.classification() == Classification::Retryable
    }

    /// True when this error was produced by exhausting the retry budget.
    pub fn is_retry_exhausted(&self) -> bool {
        self.retries_exhausted
    }

    /// Messages of this error and every cause beneath it, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.message.clone()];
        let mut current = StdError::source(self);
        while let Some(err) = current {
            messages.push(err.to_string());
            current = err.source();
        }
        messages
    }
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for OrchestratorError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_kind() -> Vec<OrchestratorError> {
        vec![
            OrchestratorError::network("socket closed"),
            OrchestratorError::permission("denied"),
            OrchestratorError::unknown("???"),
            OrchestratorError::llm_api("slow down", "anthropic", Some(429)),
            OrchestratorError::external_tool("push failed", "git push", "rejected"),
            OrchestratorError::parse("bad yaml", Some(PathBuf::from("a.yaml")), Some(3)),
            OrchestratorError::state_corruption("bad state", "/tmp/state.json", "truncated"),
            OrchestratorError::resource_exhausted("oom", "memory", 15.5, 16.0),
            OrchestratorError::cancelled("stopped"),
        ]
    }

    #[test]
    fn test_fatal_and_retryable_are_mutually_exclusive() {
        for error in every_kind() {
            assert_ne!(
                error.is_fatal(),
                error.is_retryable(),
                "{:?} must be exactly one of fatal/retryable",
                error.category()
            );
        }
    }

    #[test]
    fn test_every_category_is_covered() {
        let categories: Vec<ErrorCategory> = every_kind().iter().map(|e| e.category()).collect();
        assert_eq!(categories, ErrorCategory::ALL.to_vec());
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(OrchestratorError::permission("x").is_fatal());
        assert!(OrchestratorError::parse("x", None, None).is_fatal());
        assert!(OrchestratorError::state_corruption("x", "s.json", "checksum").is_fatal());
        assert!(OrchestratorError::cancelled("x").is_fatal());
        assert!(OrchestratorError::network("x").is_retryable());
        assert!(OrchestratorError::unknown("x").is_retryable());
    }

    #[test]
    fn test_llm_code_follows_status() {
        assert_eq!(
            OrchestratorError::llm_api("x", "p", Some(429)).code(),
            ErrorCode::RateLimit
        );
        assert_eq!(
            OrchestratorError::llm_api("x", "p", Some(401)).code(),
            ErrorCode::AuthError
        );
        assert_eq!(
            OrchestratorError::llm_api("x", "p", Some(403)).code(),
            ErrorCode::AuthError
        );
        assert_eq!(
            OrchestratorError::llm_api("x", "p", Some(500)).code(),
            ErrorCode::LlmApiError
        );
        assert_eq!(
            OrchestratorError::llm_api("x", "p", None).code(),
            ErrorCode::LlmApiError
        );
    }

    #[test]
    fn test_resource_type_serializes_as_plain_name() {
        assert_eq!(
            serde_json::to_string(&ResourceType::Other("gpu".to_string())).unwrap(),
            "\"gpu\""
        );
        assert_eq!(serde_json::to_string(&ResourceType::Disk).unwrap(), "\"disk\"");

        let memory: ResourceType = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(memory, ResourceType::Memory);
        let other: ResourceType = serde_json::from_str("\"file_handles\"").unwrap();
        assert_eq!(other, ResourceType::Other("file_handles".to_string()));
    }

    #[test]
    fn test_code_strings() {
        assert_eq!(ErrorCode::NetworkError.as_str(), "NETWORK_ERROR");
        assert_eq!(ErrorCode::PermissionError.to_string(), "PERMISSION_ERROR");
        assert_eq!(
            serde_json::to_string(&ErrorCode::LlmApiError).unwrap(),
            "\"LLM_API_ERROR\""
        );
        assert!(ErrorCode::AuthError.is_security());
        assert!(ErrorCode::PermissionError.is_security());
        assert!(!ErrorCode::RateLimit.is_security());
    }

    #[test]
    fn test_add_context() {
        let error = OrchestratorError::network("reset")
            .add_context("endpoint", "/v1/messages")
            .add_context("attempt", "2");

        assert_eq!(error.context().len(), 2);
        assert_eq!(
            error.context().get("endpoint"),
            Some(&"/v1/messages".to_string())
        );
    }

    #[test]
    fn test_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "econnreset");
        let error = OrchestratorError::network("request failed").with_cause(io);

        assert!(StdError::source(&error).is_some());
        assert_eq!(error.chain(), vec!["request failed", "econnreset"]);
    }

    #[test]
    fn test_retries_exhausted_preserves_last_failure() {
        let last = OrchestratorError::llm_api("429 from provider", "anthropic", Some(429))
            .add_context("model", "large");
        let wrapped = OrchestratorError::retries_exhausted(last, 3);

        assert!(wrapped.is_retry_exhausted());
        assert_eq!(wrapped.retry_count(), 3);
        assert_eq!(wrapped.code(), ErrorCode::RateLimit);
        assert_eq!(wrapped.category(), ErrorCategory::LlmApi);
        assert!(wrapped.message().contains("3 retries"));
        assert!(wrapped.message().contains("429 from provider"));
        assert_eq!(wrapped.cause().map(|c| c.to_string()).as_deref(), Some("429 from provider"));
        assert_eq!(wrapped.context().get("model"), Some(&"large".to_string()));
    }

    #[test]
    fn test_resource_type_from_str() {
        assert_eq!(ResourceType::from("Memory"), ResourceType::Memory);
        assert_eq!(ResourceType::from("cpu"), ResourceType::Cpu);
        assert_eq!(
            ResourceType::from("gpu"),
            ResourceType::Other("gpu".to_string())
        );
        assert_eq!(ResourceType::Other("gpu".to_string()).as_str(), "gpu");
    }

    #[test]
    fn test_display_is_message() {
        let error = OrchestratorError::unknown("something odd");
        assert_eq!(format!("{}", error), "something odd");
    }
}
