use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Step;

/// A named, static plan: a DAG of steps plus initial variables and the
/// error-handling policy. Immutable once execution begins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<Step>,
    /// Initial variable bindings. Steps read these through `{{name}}`
    /// placeholders and may write through `storeAs`. Two steps in the
    /// same wave writing the same key is last-writer-wins by completion
    /// order; authors should avoid it.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub error_handling: ErrorHandling,
}

impl Workflow {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: None,
            steps,
            variables: HashMap::new(),
            error_handling: ErrorHandling::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = error_handling;
        self
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// What the engine does when a step fails terminally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorHandling {
    #[serde(default)]
    pub strategy: ErrorStrategy,
    /// Executed in reverse order on abort when the strategy is
    /// `rollback_on_error`. Each id must name a step of the workflow.
    #[serde(default)]
    pub rollback_steps: Vec<String>,
}

impl Default for ErrorHandling {
    fn default() -> Self {
        Self {
            strategy: ErrorStrategy::FailFast,
            rollback_steps: Vec::new(),
        }
    }
}

impl ErrorHandling {
    pub fn fail_fast() -> Self {
        Self::default()
    }

    pub fn continue_on_error() -> Self {
        Self {
            strategy: ErrorStrategy::ContinueOnError,
            rollback_steps: Vec::new(),
        }
    }

    pub fn rollback_on_error(rollback_steps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            strategy: ErrorStrategy::RollbackOnError,
            rollback_steps: rollback_steps.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStrategy {
    #[default]
    FailFast,
    ContinueOnError,
    RollbackOnError,
}

/// Persisted template catalog: template name to workflow, stored under
/// the `workflow_templates` key.
pub type WorkflowTemplates = HashMap<String, Workflow>;
