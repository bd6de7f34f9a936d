use serde::{Deserialize, Serialize};

/// A post-condition polled after a step's tool call succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaitCondition {
    #[serde(rename = "type")]
    pub kind: WaitKind,
    #[serde(default = "default_wait_timeout")]
    pub timeout: u64,
    #[serde(default = "default_wait_interval")]
    pub interval: u64,
    /// Element waits: CSS selector to check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Element waits: required element state (e.g. "visible").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Element waits: required text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Navigation waits: substring the active URL must contain. Omitted
    /// means any navigation satisfies the wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Custom waits: expression evaluated in the page context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

fn default_wait_timeout() -> u64 {
    30_000
}

fn default_wait_interval() -> u64 {
    500
}

impl WaitCondition {
    pub fn new(kind: WaitKind) -> Self {
        Self {
            kind,
            timeout: default_wait_timeout(),
            interval: default_wait_interval(),
            selector: None,
            state: None,
            text: None,
            url: None,
            expression: None,
        }
    }

    pub fn element(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::new(WaitKind::Element)
        }
    }

    pub fn navigation(url: Option<String>) -> Self {
        Self {
            url,
            ..Self::new(WaitKind::Navigation)
        }
    }

    pub fn network_idle() -> Self {
        Self::new(WaitKind::NetworkIdle)
    }

    pub fn custom(expression: impl Into<String>) -> Self {
        Self {
            expression: Some(expression.into()),
            ..Self::new(WaitKind::Custom)
        }
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    /// Polling faster than the deadline makes no sense; `interval` must
    /// not exceed `timeout`.
    pub fn is_valid(&self) -> bool {
        self.interval <= self.timeout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitKind {
    Element,
    NetworkIdle,
    Navigation,
    Custom,
}

impl std::fmt::Display for WaitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitKind::Element => write!(f, "element"),
            WaitKind::NetworkIdle => write!(f, "network_idle"),
            WaitKind::Navigation => write!(f, "navigation"),
            WaitKind::Custom => write!(f, "custom"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wait_condition_defaults() {
        let wait: WaitCondition =
            serde_json::from_value(json!({"type": "network_idle"})).unwrap();
        assert_eq!(wait.kind, WaitKind::NetworkIdle);
        assert_eq!(wait.timeout, 30_000);
        assert_eq!(wait.interval, 500);
        assert!(wait.is_valid());
    }

    #[test]
    fn test_interval_bounded_by_timeout() {
        let wait = WaitCondition::element("#done")
            .with_timeout(100)
            .with_interval(500);
        assert!(!wait.is_valid());
    }

    #[test]
    fn test_wire_kind_names() {
        let wait: WaitCondition = serde_json::from_value(json!({
            "type": "element",
            "selector": "#submit",
            "state": "visible"
        }))
        .unwrap();
        assert_eq!(wait.kind, WaitKind::Element);
        assert_eq!(wait.selector.as_deref(), Some("#submit"));
        assert_eq!(wait.kind.to_string(), "element");
    }
}
