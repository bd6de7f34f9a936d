use thiserror::Error;

use crate::error::AgentError;
use crate::llm::LlmError;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("LLM error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),

    #[error("Plan references unknown tool: {0}")]
    UnknownTool(String),

    #[error("Serde json error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl PlanError {
    pub fn to_agent_error(&self) -> AgentError {
        match self {
            PlanError::LlmError(e) => {
                AgentError::ai_api(e.to_string()).with_cause(e.to_string())
            }
            other => AgentError::validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_taxonomy_classification() {
        let parse = PlanError::InvalidResponse("no JSON".to_string()).to_agent_error();
        assert_eq!(parse.category, ErrorCategory::Validation);

        let upstream =
            PlanError::LlmError(LlmError::QuotaExceeded("billing".to_string())).to_agent_error();
        assert_eq!(upstream.category, ErrorCategory::AiApi);
        assert!(upstream.cause.is_some());
    }
}
