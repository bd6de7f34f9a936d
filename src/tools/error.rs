use thiserror::Error;

use crate::error::{AgentError, ErrorCategory};

use super::BrowserError;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid input for tool '{tool}': {reason}")]
    InvalidInput { tool: String, reason: String },

    #[error("Error while running tool: {0}")]
    ExecutionError(Box<dyn std::error::Error + Send + Sync>),

    #[error("Browser error: {0}")]
    BrowserError(#[from] BrowserError),

    #[error("Input parsing error: {0}")]
    InputParseError(#[from] serde_json::Error),
}

impl ToolError {
    pub fn execution_error<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ToolError::ExecutionError(Box::new(error))
    }

    /// Classification of the control-flow error into the shared taxonomy.
    pub fn to_agent_error(&self) -> AgentError {
        let category = match self {
            ToolError::ToolNotFound(_)
            | ToolError::InvalidInput { .. }
            | ToolError::InputParseError(_) => ErrorCategory::Validation,
            ToolError::BrowserError(_) => ErrorCategory::Dom,
            ToolError::ExecutionError(_) => ErrorCategory::Automation,
        };
        AgentError::new(self.to_string(), category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_classification() {
        let unknown = ToolError::ToolNotFound("ghost".to_string()).to_agent_error();
        assert_eq!(unknown.category, ErrorCategory::Validation);
        assert!(!unknown.retryable);

        let browser = ToolError::BrowserError(BrowserError::NoSuchElement("#x".to_string()))
            .to_agent_error();
        assert_eq!(browser.category, ErrorCategory::Dom);
        assert!(browser.retryable);

        let execution = ToolError::ExecutionError("boom".into()).to_agent_error();
        assert_eq!(execution.category, ErrorCategory::Automation);
        assert!(execution.message.contains("boom"));
    }
}
