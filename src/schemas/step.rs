use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::WaitCondition;

/// A unit of work: binds a registered tool, its arguments, and the
/// policies that govern one node of the DAG.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Unique within the workflow.
    pub id: String,
    /// Id of a tool in the registry.
    pub tool: String,
    /// Argument mapping; string values may contain `{{var}}` placeholders.
    /// A string-valued `storeAs` key additionally routes the step result
    /// into the execution variables.
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Ids of steps that must complete before this one starts.
    #[serde(default)]
    pub depends: Vec<String>,
    /// Limited expression evaluated after substitution; false skips the
    /// step without touching variables or results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub on_error: OnError,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<WaitCondition>,
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    30_000
}

impl Step {
    pub fn new(id: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tool: tool.into(),
            args: Map::new(),
            depends: Vec::new(),
            condition: None,
            on_error: OnError::default(),
            retry_count: 0,
            retry_delay: default_retry_delay(),
            timeout: default_timeout(),
            wait_for: None,
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    pub fn with_args(mut self, args: Map<String, Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_depends(mut self, depends: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.depends = depends.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_on_error(mut self, on_error: OnError) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_retries(mut self, retry_count: u32, retry_delay: u64) -> Self {
        self.retry_count = retry_count;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_wait_for(mut self, wait_for: WaitCondition) -> Self {
        self.wait_for = Some(wait_for);
        self
    }

    /// The variable name this step stores its result under, when its
    /// args carry a string-valued `storeAs`.
    pub fn store_as(&self) -> Option<&str> {
        self.args.get("storeAs").and_then(Value::as_str)
    }
}

/// Escalation policy for a terminally failed step attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    #[default]
    Fail,
    Retry,
    Continue,
    Rollback,
}
