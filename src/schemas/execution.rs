use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{StepResult, Workflow};

/// Runtime state of one workflow instance. Owned by the engine; the
/// workflow itself is referenced, never copied.
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: String,
    pub workflow: Arc<Workflow>,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub current_step: Option<String>,
    pub completed_steps: Vec<String>,
    pub failed_steps: Vec<String>,
    pub variables: HashMap<String, Value>,
    pub results: HashMap<String, Value>,
    pub errors: Vec<ExecutionError>,
    pub logs: Vec<String>,
    pub history: Vec<StepResult>,
}

impl Execution {
    pub fn new(workflow: Arc<Workflow>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            variables: workflow.variables.clone(),
            workflow,
            status: ExecutionStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            current_step: None,
            completed_steps: Vec::new(),
            failed_steps: Vec::new(),
            results: HashMap::new(),
            errors: Vec::new(),
            logs: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Pending → Running. Any other starting state is left untouched.
    pub fn mark_running(&mut self) -> bool {
        if self.status == ExecutionStatus::Pending {
            self.status = ExecutionStatus::Running;
            true
        } else {
            false
        }
    }

    /// Move to a terminal state, stamping `end_time` exactly once.
    /// Returns whether a transition occurred.
    pub fn finish(&mut self, status: ExecutionStatus) -> bool {
        debug_assert!(status.is_terminal());
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.end_time = Some(Utc::now());
        true
    }

    pub fn record_error(&mut self, step_id: impl Into<String>, message: impl Into<String>, retry_attempt: u32) {
        self.errors.push(ExecutionError {
            step_id: step_id.into(),
            message: message.into(),
            timestamp: Utc::now(),
            retry_attempt,
        });
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// One recorded step failure, including which attempt produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionError {
    pub step_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub retry_attempt: u32,
}
