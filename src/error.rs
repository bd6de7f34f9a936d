use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Closed set of error categories used across the crate. Everything a
/// component reports outward is classified into exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Permission,
    Dom,
    AiApi,
    Automation,
    ContentScript,
    Background,
    Storage,
    Validation,
    Timeout,
    Unknown,
}

impl ErrorCategory {
    fn default_code(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "ERR_NETWORK",
            ErrorCategory::Permission => "ERR_PERMISSION",
            ErrorCategory::Dom => "ERR_DOM",
            ErrorCategory::AiApi => "ERR_AI_API",
            ErrorCategory::Automation => "ERR_AUTOMATION",
            ErrorCategory::ContentScript => "ERR_CONTENT_SCRIPT",
            ErrorCategory::Background => "ERR_BACKGROUND",
            ErrorCategory::Storage => "ERR_STORAGE",
            ErrorCategory::Validation => "ERR_VALIDATION",
            ErrorCategory::Timeout => "ERR_TIMEOUT",
            ErrorCategory::Unknown => "ERR_UNKNOWN",
        }
    }

    fn default_severity(&self) -> ErrorSeverity {
        match self {
            ErrorCategory::Permission | ErrorCategory::Background => ErrorSeverity::High,
            ErrorCategory::ContentScript => ErrorSeverity::High,
            ErrorCategory::Validation => ErrorSeverity::Low,
            ErrorCategory::Unknown => ErrorSeverity::High,
            _ => ErrorSeverity::Medium,
        }
    }

    fn default_recovery(&self) -> RecoveryStrategy {
        match self {
            ErrorCategory::Network | ErrorCategory::Dom | ErrorCategory::Automation => {
                RecoveryStrategy::Retry
            }
            ErrorCategory::Timeout => RecoveryStrategy::Retry,
            ErrorCategory::AiApi | ErrorCategory::ContentScript => RecoveryStrategy::Fallback,
            ErrorCategory::Storage => RecoveryStrategy::Skip,
            ErrorCategory::Permission => RecoveryStrategy::UserIntervention,
            ErrorCategory::Background | ErrorCategory::Validation | ErrorCategory::Unknown => {
                RecoveryStrategy::Abort
            }
        }
    }

    fn default_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Network
                | ErrorCategory::Dom
                | ErrorCategory::AiApi
                | ErrorCategory::Automation
                | ErrorCategory::ContentScript
                | ErrorCategory::Storage
                | ErrorCategory::Timeout
        )
    }

    fn default_max_retries(&self) -> u32 {
        match self {
            ErrorCategory::Network => 3,
            ErrorCategory::Dom
            | ErrorCategory::AiApi
            | ErrorCategory::Automation
            | ErrorCategory::Timeout => 2,
            ErrorCategory::ContentScript | ErrorCategory::Storage => 1,
            _ => 0,
        }
    }

    fn default_user_message(&self) -> &'static str {
        match self {
            ErrorCategory::Network => {
                "Network connection issue. Please check your connection and try again."
            }
            ErrorCategory::Permission => {
                "Permission denied. Please review the extension's site permissions."
            }
            ErrorCategory::Dom => {
                "A page element could not be handled. The site layout may have changed."
            }
            ErrorCategory::AiApi => "AI service temporarily unavailable. Please try again shortly.",
            ErrorCategory::Automation => "An automation step failed. Retrying may help.",
            ErrorCategory::ContentScript => {
                "The page could not be reached. Try reloading the tab."
            }
            ErrorCategory::Background => "An internal error occurred.",
            ErrorCategory::Storage => "Saved data could not be accessed.",
            ErrorCategory::Validation => "The request was not valid.",
            ErrorCategory::Timeout => "The operation timed out. Please try again.",
            ErrorCategory::Unknown => "Something went wrong.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Retry,
    Fallback,
    Skip,
    Abort,
    UserIntervention,
}

/// The structured error that crosses component boundaries: carried in
/// execution records, session snapshots and user-facing surfaces.
/// Serialization is a lossless serde round-trip over all fields.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[error("[{code}] {message}")]
#[serde(rename_all = "camelCase")]
pub struct AgentError {
    pub message: String,
    pub code: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub recovery_strategy: RecoveryStrategy,
    #[serde(default)]
    pub context: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub max_retries: u32,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl AgentError {
    pub fn new(message: impl Into<String>, category: ErrorCategory) -> Self {
        Self {
            message: message.into(),
            code: category.default_code().to_string(),
            category,
            severity: category.default_severity(),
            recovery_strategy: category.default_recovery(),
            context: HashMap::new(),
            timestamp: Utc::now(),
            retry_count: 0,
            max_retries: category.default_max_retries(),
            retryable: category.default_retryable(),
            user_message: None,
            cause: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCategory::Network)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCategory::Validation)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCategory::Timeout)
    }

    pub fn automation(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCategory::Automation)
    }

    pub fn ai_api(message: impl Into<String>) -> Self {
        Self::new(message, ErrorCategory::AiApi)
    }

    /// Classify a native error, keeping its rendering as the cause.
    pub fn wrap<E: std::fmt::Display>(error: E, category: ErrorCategory) -> Self {
        let rendered = error.to_string();
        Self {
            cause: Some(rendered.clone()),
            ..Self::new(rendered, category)
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_recovery_strategy(mut self, recovery_strategy: RecoveryStrategy) -> Self {
        self.recovery_strategy = recovery_strategy;
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self.retryable = max_retries > 0;
        self
    }

    pub fn with_user_message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = Some(user_message.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn should_retry(&self) -> bool {
        self.retryable && self.retry_count < self.max_retries
    }

    /// A copy of this error one retry later, with extra context merged
    /// in. The original is untouched.
    pub fn with_retry(&self, context: HashMap<String, Value>) -> Self {
        let mut next = self.clone();
        next.retry_count += 1;
        next.context.extend(context);
        next
    }

    /// The message shown to a person, falling back to the category's
    /// stock phrasing.
    pub fn user_message(&self) -> &str {
        self.user_message
            .as_deref()
            .unwrap_or_else(|| self.category.default_user_message())
    }

    pub fn serialize(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Null)
    }

    pub fn from_serialized(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_roundtrip_is_lossless() {
        let error = AgentError::network("connection reset")
            .with_context("url", "https://example.com")
            .with_user_message("We could not reach the site.")
            .with_cause("reqwest::Error: connection reset by peer");

        let restored = AgentError::from_serialized(error.serialize()).unwrap();
        assert_eq!(restored, error);
    }

    #[test]
    fn test_should_retry_respects_budget() {
        let error = AgentError::network("flaky");
        assert!(error.should_retry());

        let exhausted = error
            .with_retry(HashMap::new())
            .with_retry(HashMap::new())
            .with_retry(HashMap::new());
        assert_eq!(exhausted.retry_count, 3);
        assert!(!exhausted.should_retry());
    }

    #[test]
    fn test_with_retry_does_not_mutate_original() {
        let error = AgentError::timeout("slow tool");
        let mut context = HashMap::new();
        context.insert("attempt".to_string(), Value::from(1));
        let next = error.with_retry(context);

        assert_eq!(error.retry_count, 0);
        assert_eq!(next.retry_count, 1);
        assert!(next.context.contains_key("attempt"));
        assert!(!error.context.contains_key("attempt"));
    }

    #[test]
    fn test_validation_is_not_retryable() {
        let error = AgentError::validation("bad input");
        assert!(!error.retryable);
        assert!(!error.should_retry());
        assert_eq!(error.recovery_strategy, RecoveryStrategy::Abort);
    }

    #[test]
    fn test_user_message_falls_back_to_category() {
        let error = AgentError::ai_api("503 from upstream");
        assert_eq!(
            error.user_message(),
            "AI service temporarily unavailable. Please try again shortly."
        );
        let custom = error.with_user_message("The model is overloaded.");
        assert_eq!(custom.user_message(), "The model is overloaded.");
    }

    #[test]
    fn test_wrap_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline elapsed");
        let error = AgentError::wrap(io, ErrorCategory::Timeout);
        assert_eq!(error.category, ErrorCategory::Timeout);
        assert_eq!(error.cause.as_deref(), Some("deadline elapsed"));
        assert!(error.retryable);
    }
}
