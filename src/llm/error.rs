use regex::Regex;
use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use tokio::time::error::Elapsed;

use crate::keypool::KeyFailure;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Network request failed: {0}")]
    RequestError(#[from] ReqwestError),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeError(#[from] SerdeJsonError),

    #[error("Operation timed out")]
    Timeout(#[from] Elapsed),

    #[error("Content not found in response: Expected at {0}")]
    ContentNotFound(String),
}

impl LlmError {
    /// Wire-level error type label for surfaces that speak the
    /// `{ok, text, errorType}` contract.
    pub fn error_type(&self) -> &'static str {
        match self {
            LlmError::AuthenticationError(_) => "authentication_error",
            LlmError::QuotaExceeded(_) => "quota_exceeded",
            LlmError::RequestError(_) | LlmError::Timeout(_) => "network_error",
            _ => "model_error",
        }
    }

    /// How this error should be reported against the key that produced
    /// it. Errors unrelated to the key return None.
    pub fn key_failure(&self) -> Option<KeyFailure> {
        match self {
            LlmError::AuthenticationError(_) => Some(KeyFailure::Authentication),
            LlmError::QuotaExceeded(_) => Some(KeyFailure::Quota),
            _ => None,
        }
    }
}

/// Map an HTTP status and response body onto the error taxonomy. Body
/// text is consulted because some gateways return errors with a 200- or
/// 400-class status and an explanatory message.
pub fn classify_response_error(status: u16, body: &str) -> LlmError {
    let auth = Regex::new(r"(?i)unauthenticated|permission|invalid api key").unwrap();
    let quota = Regex::new(r"(?i)rate limit|quota|too many requests|billing").unwrap();
    let not_found = Regex::new(r"NOT_FOUND|is not found").unwrap();

    if status == 401 || status == 403 || auth.is_match(body) {
        LlmError::AuthenticationError(snippet(body))
    } else if status == 429 || status == 402 || quota.is_match(body) {
        LlmError::QuotaExceeded(snippet(body))
    } else if status == 404 || not_found.is_match(body) {
        LlmError::ModelError("The selected model is not supported by the API".to_string())
    } else {
        LlmError::ModelError(snippet(body))
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() > 300 {
        let mut cut = 300;
        while !trimmed.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &trimmed[..cut])
    } else {
        trimmed.to_string()
    }
}
