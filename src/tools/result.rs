use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Artifact keys recognized during normalization and lifted out of a
/// tool's raw output.
const ARTIFACT_KEYS: [&str; 5] = ["tabs", "links", "report", "data", "content"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
}

/// The single result shape every tool invocation is normalized into,
/// regardless of what the tool body returned or threw.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedToolResult {
    pub ok: bool,
    pub status: ToolStatus,
    /// Wall-clock across all attempts, including backoff sleeps.
    pub duration_ms: u64,
    pub observation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

impl NormalizedToolResult {
    /// Normalize a successful tool output. A plain string becomes the
    /// observation; an object may carry its own `observation` plus
    /// recognized artifact keys (`dataUrl` marks a screenshot).
    pub fn from_output(value: Value, duration_ms: u64) -> Self {
        let mut observation = None;
        let mut artifacts = Map::new();
        let mut warnings = Vec::new();

        match value {
            Value::String(s) => observation = Some(s),
            Value::Object(obj) => {
                if let Some(Value::String(s)) = obj.get("observation") {
                    observation = Some(s.clone());
                }
                if let Some(data_url) = obj.get("dataUrl") {
                    artifacts.insert("screenshot".into(), Value::Bool(true));
                    artifacts.insert("dataUrl".into(), data_url.clone());
                }
                for key in ARTIFACT_KEYS {
                    if let Some(v) = obj.get(key) {
                        artifacts.insert(key.into(), v.clone());
                    }
                }
                if let Some(Value::Array(ws)) = obj.get("warnings") {
                    warnings.extend(ws.iter().map(stringify));
                }
            }
            Value::Null => {}
            other => {
                // Bare scalars and arrays are kept as a data artifact.
                artifacts.insert("data".into(), other);
            }
        }

        Self {
            ok: true,
            status: ToolStatus::Success,
            duration_ms,
            observation: observation.unwrap_or_else(|| "OK".to_string()),
            artifacts: if artifacts.is_empty() {
                None
            } else {
                Some(artifacts)
            },
            errors: None,
            warnings: if warnings.is_empty() {
                None
            } else {
                Some(warnings)
            },
        }
    }

    pub fn failure(observation: impl Into<String>, errors: Vec<String>, duration_ms: u64) -> Self {
        let observation = observation.into();
        let observation = if observation.is_empty() {
            "ERROR".to_string()
        } else {
            observation
        };
        Self {
            ok: false,
            status: ToolStatus::Error,
            duration_ms,
            observation,
            artifacts: None,
            errors: if errors.is_empty() { None } else { Some(errors) },
            warnings: None,
        }
    }

    /// The first string-valued artifact, in recognized-key order.
    pub fn first_textual_artifact(&self) -> Option<&str> {
        let artifacts = self.artifacts.as_ref()?;
        ARTIFACT_KEYS
            .iter()
            .chain(["dataUrl"].iter())
            .find_map(|key| artifacts.get(*key).and_then(Value::as_str))
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
