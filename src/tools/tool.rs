use std::collections::HashMap;
use std::error::Error;

use async_trait::async_trait;
use indoc::formatdoc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::InputSchema;

/// How many times the registry re-runs a failing tool body and how the
/// linear backoff between attempts grows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_ms,
        }
    }
}

/// Result of a tool's precondition check. A failed check short-circuits
/// the invocation without running the body.
#[derive(Debug, Clone)]
pub struct Precondition {
    pub ok: bool,
    pub observation: Option<String>,
}

impl Precondition {
    pub fn satisfied() -> Self {
        Self {
            ok: true,
            observation: None,
        }
    }

    pub fn failed(observation: impl Into<String>) -> Self {
        Self {
            ok: false,
            observation: Some(observation.into()),
        }
    }
}

/// Per-invocation context handed to a tool: which execution and step it
/// serves and a read-only snapshot of the execution variables.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub execution_id: Option<String>,
    pub step_id: Option<String>,
    pub variables: HashMap<String, Value>,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_step(
        execution_id: impl Into<String>,
        step_id: impl Into<String>,
        variables: HashMap<String, Value>,
    ) -> Self {
        Self {
            execution_id: Some(execution_id.into()),
            step_id: Some(step_id.into()),
            variables,
        }
    }
}

/// A named capability the engine can invoke. Definitions are immutable
/// after registration; re-registering an id replaces the whole tool.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry id, unique among registered tools.
    fn id(&self) -> String;

    /// What the tool does and when to use it; shown to the planner.
    fn description(&self) -> String;

    /// Schema the registry validates inputs against before running.
    ///
    /// Defaults to a single required string field named `input`.
    fn input_schema(&self) -> InputSchema {
        InputSchema::default_input()
    }

    /// Capability tags (e.g. "dom", "navigation") used by catalogs.
    fn capabilities(&self) -> Vec<String> {
        Vec::new()
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Checked once per invocation, before any attempt.
    async fn preconditions(&self, _ctx: &ToolContext, _input: &Value) -> Precondition {
        Precondition::satisfied()
    }

    /// The tool body. A string return becomes the observation; an object
    /// may carry `observation`, artifact keys and `warnings`.
    async fn run(
        &self,
        ctx: &ToolContext,
        input: Value,
    ) -> Result<Value, Box<dyn Error + Send + Sync>>;

    /// Catalog entry enumerated into the planner prompt.
    fn to_catalog_entry(&self) -> String {
        formatdoc! {"
            > {}: {}
            The input for this tool MUST be in the following format:
            {}",
            self.id(),
            self.description(),
            self.input_schema().properties_description()
        }
    }
}

impl<T> From<T> for Box<dyn Tool>
where
    T: Tool + 'static,
{
    fn from(tool: T) -> Self {
        Box::new(tool)
    }
}
