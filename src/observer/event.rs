use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cap on any single text payload, keeping every event well under the
/// 4 KiB event budget.
const MAX_TEXT_LEN: usize = 2048;

/// One record of the execution trace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: TraceEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEventKind {
    RunState {
        execution_id: String,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    ToolStarted {
        tool: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_id: Option<String>,
    },
    ToolResult {
        tool: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step_id: Option<String>,
        ok: bool,
        duration_ms: u64,
        observation: String,
    },
    Generic {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Value>,
    },
}

impl TraceEvent {
    pub fn new(kind: TraceEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn run_state(execution_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::new(TraceEventKind::RunState {
            execution_id: execution_id.into(),
            status: status.into(),
            detail: None,
        })
    }

    pub fn run_state_detail(
        execution_id: impl Into<String>,
        status: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(TraceEventKind::RunState {
            execution_id: execution_id.into(),
            status: status.into(),
            detail: Some(truncate(detail.into())),
        })
    }

    pub fn tool_started(tool: impl Into<String>, step_id: Option<String>) -> Self {
        Self::new(TraceEventKind::ToolStarted {
            tool: tool.into(),
            step_id,
        })
    }

    pub fn tool_result(
        tool: impl Into<String>,
        step_id: Option<String>,
        ok: bool,
        duration_ms: u64,
        observation: impl Into<String>,
    ) -> Self {
        Self::new(TraceEventKind::ToolResult {
            tool: tool.into(),
            step_id,
            ok,
            duration_ms,
            observation: truncate(observation.into()),
        })
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(TraceEventKind::Generic {
            message: truncate(message.into()),
            data: None,
        })
    }

    pub fn generic_with_data(message: impl Into<String>, data: Value) -> Self {
        Self::new(TraceEventKind::Generic {
            message: truncate(message.into()),
            data: Some(data),
        })
    }
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_TEXT_LEN {
        let mut cut = MAX_TEXT_LEN;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push('…');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tag_names() {
        let event = TraceEvent::run_state("exec-1", "running");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "run_state");
        assert_eq!(value["execution_id"], "exec-1");

        let event = TraceEvent::tool_result("click", Some("a".into()), true, 12, "OK");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "tool_result");
        assert_eq!(value["duration_ms"], 12);
    }

    #[test]
    fn test_long_observations_are_truncated() {
        let event = TraceEvent::tool_result("scrape", None, true, 1, "x".repeat(10_000));
        if let TraceEventKind::ToolResult { observation, .. } = &event.kind {
            assert!(observation.len() <= MAX_TEXT_LEN + '…'.len_utf8());
        } else {
            panic!("expected tool_result");
        }
    }
}
