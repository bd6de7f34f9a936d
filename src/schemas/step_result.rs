use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one step of an execution, including skips.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
}

impl StepResult {
    pub fn success(step_id: impl Into<String>, result: Value, execution_time: u64) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            result: Some(result),
            error: None,
            execution_time,
            retry_attempt: None,
            skipped: None,
        }
    }

    pub fn failure(step_id: impl Into<String>, error: impl Into<String>, execution_time: u64) -> Self {
        Self {
            step_id: step_id.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            execution_time,
            retry_attempt: None,
            skipped: None,
        }
    }

    /// A condition-skipped step counts as successful but records why it
    /// did not run.
    pub fn skipped(step_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            result: Some(serde_json::json!({
                "skipped": true,
                "reason": reason.into(),
            })),
            error: None,
            execution_time: 0,
            retry_attempt: None,
            skipped: Some(true),
        }
    }

    pub fn with_retry_attempt(mut self, retry_attempt: u32) -> Self {
        self.retry_attempt = Some(retry_attempt);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skipped_result_shape() {
        let result = StepResult::skipped("a", "condition not met");
        assert!(result.success);
        assert_eq!(result.skipped, Some(true));
        assert_eq!(
            result.result.unwrap()["reason"],
            serde_json::json!("condition not met")
        );
    }
}
