use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::schemas::{
    Execution, ExecutionError, ExecutionStatus, StepResult, Workflow, WorkflowTemplates,
};

use super::SnapshotBackend;

const TEMPLATES_KEY: &str = "workflow_templates";
const MAX_SNAPSHOT_ERRORS: usize = 100;
const MAX_SNAPSHOT_LOGS: usize = 100;
const MAX_SNAPSHOT_HISTORY: usize = 20;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("No session stored under {0}")]
    NotFound(String),

    #[error("Serde json error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

/// What survives of an execution across the snapshot boundary. Bounded
/// on purpose: only the most recent errors, logs and step results are
/// kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSnapshot {
    pub id: String,
    pub workflow: Workflow,
    pub status: ExecutionStatus,
    pub variables: HashMap<String, Value>,
    pub results: HashMap<String, Value>,
    pub completed_steps: Vec<String>,
    pub failed_steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
    #[serde(default)]
    pub errors: Vec<ExecutionError>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub history: Vec<StepResult>,
}

impl From<&Execution> for ExecutionSnapshot {
    fn from(execution: &Execution) -> Self {
        Self {
            id: execution.id.clone(),
            workflow: (*execution.workflow).clone(),
            status: execution.status,
            variables: execution.variables.clone(),
            results: execution.results.clone(),
            completed_steps: execution.completed_steps.clone(),
            failed_steps: execution.failed_steps.clone(),
            current_step: execution.current_step.clone(),
            errors: tail(&execution.errors, MAX_SNAPSHOT_ERRORS),
            logs: tail(&execution.logs, MAX_SNAPSHOT_LOGS),
            history: tail(&execution.history, MAX_SNAPSHOT_HISTORY),
        }
    }
}

fn tail<T: Clone>(items: &[T], limit: usize) -> Vec<T> {
    let skip = items.len().saturating_sub(limit);
    items[skip..].to_vec()
}

pub fn session_key(execution_id: &str) -> String {
    format!("session_{execution_id}")
}

/// Snapshot persistence over a pluggable backend. Restored sessions
/// always come back cancelled; nothing resumes as running behind the
/// engine's back.
pub struct SessionStore {
    backend: Arc<dyn SnapshotBackend>,
}

impl SessionStore {
    pub fn new(backend: impl Into<Box<dyn SnapshotBackend>>) -> Self {
        Self {
            backend: Arc::from(backend.into()),
        }
    }

    pub async fn save(&self, execution: &Execution) -> Result<(), SessionError> {
        let snapshot = ExecutionSnapshot::from(execution);
        let value = serde_json::to_value(&snapshot)?;
        self.backend.save(&session_key(&execution.id), value).await
    }

    pub async fn restore(&self, execution_id: &str) -> Result<ExecutionSnapshot, SessionError> {
        let key = session_key(execution_id);
        let value = self
            .backend
            .load(&key)
            .await?
            .ok_or_else(|| SessionError::NotFound(key))?;
        let mut snapshot: ExecutionSnapshot = serde_json::from_value(value)?;
        snapshot.status = ExecutionStatus::Cancelled;
        Ok(snapshot)
    }

    pub async fn remove(&self, execution_id: &str) -> Result<(), SessionError> {
        self.backend.remove(&session_key(execution_id)).await
    }

    pub async fn save_templates(&self, templates: &WorkflowTemplates) -> Result<(), SessionError> {
        let value = serde_json::to_value(templates)?;
        self.backend.save(TEMPLATES_KEY, value).await
    }

    pub async fn load_templates(&self) -> Result<WorkflowTemplates, SessionError> {
        match self.backend.load(TEMPLATES_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(WorkflowTemplates::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::schemas::Step;
    use crate::session::InMemoryBackend;

    fn execution() -> Execution {
        let workflow = Arc::new(
            Workflow::new(
                "snap",
                vec![Step::new("a", "t"), Step::new("b", "t").with_depends(["a"])],
            )
            .with_variable("city", "Oslo"),
        );
        let mut execution = Execution::new(workflow);
        execution.mark_running();
        execution.completed_steps.push("a".to_string());
        execution.failed_steps.push("b".to_string());
        execution
            .results
            .insert("a".to_string(), json!({"rows": 2}));
        execution.record_error("b", "boom", 1);
        execution.log("step 'b' failed: boom");
        execution
            .history
            .push(StepResult::success("a", json!("ok"), 3));
        execution.finish(ExecutionStatus::Failed);
        execution
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_restores_cancelled() {
        let store = SessionStore::new(InMemoryBackend::new());
        let execution = execution();

        store.save(&execution).await.unwrap();
        let restored = store.restore(&execution.id).await.unwrap();

        assert_eq!(restored.status, ExecutionStatus::Cancelled);
        assert_eq!(restored.id, execution.id);
        assert_eq!(restored.workflow, *execution.workflow);
        assert_eq!(restored.variables, execution.variables);
        assert_eq!(restored.results, execution.results);
        assert_eq!(restored.completed_steps, execution.completed_steps);
        assert_eq!(restored.failed_steps, execution.failed_steps);
        assert_eq!(restored.errors, execution.errors);
        assert_eq!(restored.history, execution.history);
    }

    #[tokio::test]
    async fn test_restore_missing_session() {
        let store = SessionStore::new(InMemoryBackend::new());
        let err = store.restore("ghost").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_snapshot_truncates_histories() {
        let store = SessionStore::new(InMemoryBackend::new());
        let mut execution = execution();
        for i in 0..250 {
            execution.record_error("b", format!("err {i}"), 1);
            execution.log(format!("line {i}"));
            execution
                .history
                .push(StepResult::success("a", json!(i), 1));
        }

        store.save(&execution).await.unwrap();
        let restored = store.restore(&execution.id).await.unwrap();

        assert_eq!(restored.errors.len(), 100);
        assert_eq!(restored.logs.len(), 100);
        assert_eq!(restored.history.len(), 20);
        // Newest entries win.
        assert_eq!(restored.errors.last().unwrap().message, "err 249");
        assert_eq!(restored.history.last().unwrap().result, Some(json!(249)));
    }

    #[tokio::test]
    async fn test_template_catalog_roundtrip() {
        let store = SessionStore::new(InMemoryBackend::new());
        assert!(store.load_templates().await.unwrap().is_empty());

        let mut templates = WorkflowTemplates::new();
        templates.insert(
            "login".to_string(),
            Workflow::new("login", vec![Step::new("open", "navigate")]),
        );
        store.save_templates(&templates).await.unwrap();

        let loaded = store.load_templates().await.unwrap();
        assert_eq!(loaded, templates);
    }

    #[tokio::test]
    async fn test_remove_session() {
        let store = SessionStore::new(InMemoryBackend::new());
        let execution = execution();
        store.save(&execution).await.unwrap();
        store.remove(&execution.id).await.unwrap();
        assert!(store.restore(&execution.id).await.is_err());
    }
}
