use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::Value;

use crate::observer::{Observer, TraceEvent};
use crate::schemas::{
    ErrorStrategy, Execution, ExecutionStatus, OnError, Step, StepResult, Workflow,
};
use crate::session::SessionStore;
use crate::tools::{BrowserDriver, NormalizedToolResult, ToolContext, ToolRegistry};

use super::wait::{wait_for, WaitOutcome};
use super::{
    evaluate_condition, partition_waves, substitute_value, topological_order, EngineError,
};

struct ExecutionHandle {
    state: Mutex<Execution>,
    cancelled: AtomicBool,
}

impl ExecutionHandle {
    fn lock(&self) -> std::sync::MutexGuard<'_, Execution> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escalation {
    /// Recorded, not propagated (`on_error: continue`).
    Swallowed,
    Fail,
    Rollback,
}

enum StepOutcome {
    Completed(StepResult),
    Failed {
        result: StepResult,
        escalation: Escalation,
    },
    Cancelled,
}

enum AttemptOutcome {
    Success(Value),
    Failure(String),
    Cancelled,
}

/// The execution core: turns a validated workflow into waves of
/// concurrently running steps, enforcing per-step retry, condition,
/// wait-for and rollback policy along the way.
///
/// Collaborators are injected once at construction; the engine keeps no
/// global state.
pub struct WorkflowEngine {
    registry: Arc<ToolRegistry>,
    observer: Arc<Observer>,
    driver: Option<Arc<dyn BrowserDriver>>,
    sessions: Option<Arc<SessionStore>>,
    executions: Mutex<HashMap<String, Arc<ExecutionHandle>>>,
}

impl WorkflowEngine {
    pub fn new(registry: Arc<ToolRegistry>, observer: Arc<Observer>) -> Self {
        Self {
            registry,
            observer,
            driver: None,
            sessions: None,
            executions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_driver(mut self, driver: Arc<dyn BrowserDriver>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn with_session_store(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Run a workflow to a terminal state. Structural problems (cycles,
    /// missing dependencies, unknown tools) fail here, before any tool
    /// runs; step failures are resolved through the workflow's error
    /// handling and reported on the returned execution instead.
    pub async fn execute(&self, workflow: Workflow) -> Result<Execution, EngineError> {
        let order = topological_order(&workflow)?;
        let waves = partition_waves(&workflow, &order)?;
        self.validate_tools(&workflow)?;

        let workflow = Arc::new(workflow);
        let handle = Arc::new(ExecutionHandle {
            state: Mutex::new(Execution::new(workflow.clone())),
            cancelled: AtomicBool::new(false),
        });
        let execution_id = handle.lock().id.clone();
        self.track(&execution_id, handle.clone());

        {
            let mut state = handle.lock();
            state.mark_running();
            state.log(format!("workflow '{}' started", workflow.name));
        }
        self.observer
            .emit(TraceEvent::run_state(&execution_id, "running"));
        log::info!(
            "execution {execution_id} running workflow '{}' ({} steps, {} waves)",
            workflow.name,
            workflow.steps.len(),
            waves.len()
        );

        let mut abort: Option<(String, String)> = None;
        let mut rollback_requested = false;

        'waves: for wave in &waves {
            if handle.is_cancelled() {
                break;
            }

            let steps: Vec<&Step> = wave.iter().filter_map(|id| workflow.step(id)).collect();
            let outcomes = join_all(
                steps
                    .iter()
                    .map(|step| self.run_step(&handle, step)),
            )
            .await;

            for (step, outcome) in steps.iter().zip(outcomes) {
                match outcome {
                    StepOutcome::Completed(_) => {}
                    StepOutcome::Cancelled => break 'waves,
                    StepOutcome::Failed { result, escalation } => match escalation {
                        Escalation::Swallowed => {}
                        Escalation::Fail | Escalation::Rollback => {
                            let message = result
                                .error
                                .clone()
                                .unwrap_or_else(|| "step failed".to_string());
                            match workflow.error_handling.strategy {
                                ErrorStrategy::ContinueOnError => {
                                    log::warn!(
                                        "step '{}' failed, continuing: {message}",
                                        step.id
                                    );
                                }
                                ErrorStrategy::FailFast => {
                                    rollback_requested = escalation == Escalation::Rollback;
                                    abort = Some((step.id.clone(), message));
                                    break 'waves;
                                }
                                ErrorStrategy::RollbackOnError => {
                                    rollback_requested = true;
                                    abort = Some((step.id.clone(), message));
                                    break 'waves;
                                }
                            }
                        }
                    },
                }
            }
        }

        if let Some((step_id, message)) = &abort {
            log::error!("execution {execution_id} aborted at step '{step_id}': {message}");
            handle
                .lock()
                .log(format!("aborted at step '{step_id}': {message}"));
            if rollback_requested {
                self.run_rollback(&handle, &workflow).await;
            }
        }

        let final_execution = {
            let mut state = handle.lock();
            if abort.is_some() {
                state.finish(ExecutionStatus::Failed);
            } else {
                // A cancelled execution is already terminal; finish is a
                // no-op then and the status stays cancelled.
                state.finish(ExecutionStatus::Completed);
            }
            state.current_step = None;
            state.clone()
        };

        self.observer.emit(TraceEvent::run_state(
            &execution_id,
            final_execution.status.as_str(),
        ));
        log::info!(
            "execution {execution_id} finished: {}",
            final_execution.status.as_str()
        );

        if let Some(sessions) = &self.sessions {
            if let Err(e) = sessions.save(&final_execution).await {
                log::warn!("session snapshot for {execution_id} failed: {e}");
            }
        }

        Ok(final_execution)
    }

    /// Mark an execution cancelled. Running tool calls are left to
    /// complete, but no new steps, retries or waves are started and
    /// pending waits exit at their next poll tick. Idempotent; returns
    /// whether this call performed the transition.
    pub fn cancel(&self, execution_id: &str) -> bool {
        let handle = {
            let executions = self.lock_executions();
            executions.get(execution_id).cloned()
        };
        let Some(handle) = handle else {
            return false;
        };

        handle.cancelled.store(true, Ordering::SeqCst);
        let transitioned = handle.lock().finish(ExecutionStatus::Cancelled);
        if transitioned {
            log::info!("execution {execution_id} cancelled");
            self.observer
                .emit(TraceEvent::run_state(execution_id, "cancelled"));
        }
        transitioned
    }

    pub fn get_execution(&self, execution_id: &str) -> Option<Execution> {
        let executions = self.lock_executions();
        executions.get(execution_id).map(|h| h.lock().clone())
    }

    pub fn list_executions(&self) -> Vec<Execution> {
        let executions = self.lock_executions();
        executions.values().map(|h| h.lock().clone()).collect()
    }

    /// Drop every execution that is not currently running; returns how
    /// many were removed.
    pub fn clear_completed(&self) -> usize {
        let mut executions = self.lock_executions();
        let before = executions.len();
        executions.retain(|_, handle| handle.lock().status == ExecutionStatus::Running);
        before - executions.len()
    }

    fn validate_tools(&self, workflow: &Workflow) -> Result<(), EngineError> {
        for step in &workflow.steps {
            if !self.registry.contains(&step.tool) {
                return Err(EngineError::UnknownTool {
                    tool: step.tool.clone(),
                    step: step.id.clone(),
                });
            }
            if let Some(wait) = &step.wait_for {
                if !wait.is_valid() {
                    return Err(EngineError::InvalidWaitCondition {
                        step: step.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Rollback steps run through the full per-step path, so they keep
    /// their own conditions and retry budgets. Their failures are
    /// logged, never propagated.
    async fn run_rollback(&self, handle: &Arc<ExecutionHandle>, workflow: &Arc<Workflow>) {
        let rollback_steps = &workflow.error_handling.rollback_steps;
        if rollback_steps.is_empty() {
            return;
        }

        self.observer.emit(TraceEvent::generic(format!(
            "rolling back {} steps",
            rollback_steps.len()
        )));
        handle.lock().log("rollback started".to_string());

        for id in rollback_steps.iter().rev() {
            let Some(step) = workflow.step(id) else {
                log::warn!("rollback step '{id}' not found in workflow, skipping");
                continue;
            };
            match self.run_step(handle, step).await {
                StepOutcome::Cancelled => break,
                StepOutcome::Failed { result, .. } => {
                    log::warn!(
                        "rollback step '{id}' failed: {}",
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
                StepOutcome::Completed(_) => {}
            }
        }
    }

    async fn run_step(&self, handle: &Arc<ExecutionHandle>, step: &Step) -> StepOutcome {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            if handle.is_cancelled() {
                return StepOutcome::Cancelled;
            }

            let variables = handle.lock().variables.clone();

            if let Some(condition) = &step.condition {
                if !evaluate_condition(condition, &variables) {
                    let result = StepResult::skipped(&step.id, "condition not met");
                    {
                        let mut state = handle.lock();
                        state.completed_steps.push(step.id.clone());
                        state.history.push(result.clone());
                        state.log(format!("step '{}' skipped: condition not met", step.id));
                    }
                    self.observer.emit(TraceEvent::generic(format!(
                        "step '{}' skipped: condition not met",
                        step.id
                    )));
                    return StepOutcome::Completed(result);
                }
            }

            match self.attempt_step(handle, step, &variables).await {
                AttemptOutcome::Cancelled => return StepOutcome::Cancelled,
                AttemptOutcome::Success(value) => {
                    let execution_time = started.elapsed().as_millis() as u64;
                    let mut result = StepResult::success(&step.id, value, execution_time);
                    if attempt > 0 {
                        result = result.with_retry_attempt(attempt);
                    }
                    {
                        let mut state = handle.lock();
                        state.completed_steps.push(step.id.clone());
                        state.history.push(result.clone());
                    }
                    return StepOutcome::Completed(result);
                }
                AttemptOutcome::Failure(message) => {
                    handle.lock().record_error(&step.id, &message, attempt + 1);

                    if step.on_error == OnError::Continue {
                        let execution_time = started.elapsed().as_millis() as u64;
                        let result = StepResult::failure(&step.id, &message, execution_time)
                            .with_retry_attempt(attempt);
                        {
                            let mut state = handle.lock();
                            state.failed_steps.push(step.id.clone());
                            state.history.push(result.clone());
                            state.log(format!("step '{}' failed, continuing: {message}", step.id));
                        }
                        return StepOutcome::Failed {
                            result,
                            escalation: Escalation::Swallowed,
                        };
                    }

                    if attempt < step.retry_count {
                        attempt += 1;
                        log::warn!(
                            "step '{}' failed, retry {attempt}/{} in {}ms: {message}",
                            step.id,
                            step.retry_count,
                            step.retry_delay
                        );
                        self.observer.emit(TraceEvent::generic(format!(
                            "step '{}' retry {attempt}/{}",
                            step.id, step.retry_count
                        )));
                        if handle.is_cancelled() {
                            return StepOutcome::Cancelled;
                        }
                        tokio::time::sleep(Duration::from_millis(step.retry_delay)).await;
                        continue;
                    }

                    let execution_time = started.elapsed().as_millis() as u64;
                    let result = StepResult::failure(&step.id, &message, execution_time)
                        .with_retry_attempt(attempt);
                    {
                        let mut state = handle.lock();
                        state.failed_steps.push(step.id.clone());
                        state.history.push(result.clone());
                        state.log(format!("step '{}' failed: {message}", step.id));
                    }
                    let escalation = if step.on_error == OnError::Rollback {
                        Escalation::Rollback
                    } else {
                        Escalation::Fail
                    };
                    return StepOutcome::Failed { result, escalation };
                }
            }
        }
    }

    /// One attempt of the invoke → parse/store → wait pipeline.
    async fn attempt_step(
        &self,
        handle: &Arc<ExecutionHandle>,
        step: &Step,
        variables: &HashMap<String, Value>,
    ) -> AttemptOutcome {
        let args = substitute_value(&Value::Object(step.args.clone()), variables);

        let execution_id = {
            let mut state = handle.lock();
            state.current_step = Some(step.id.clone());
            state.id.clone()
        };

        self.observer
            .emit(TraceEvent::tool_started(&step.tool, Some(step.id.clone())));
        let ctx = ToolContext::for_step(execution_id, &step.id, variables.clone());

        let invocation = self.registry.run(&step.tool, &ctx, args);
        let normalized =
            match tokio::time::timeout(Duration::from_millis(step.timeout), invocation).await {
                Err(_) => {
                    self.observer.emit(TraceEvent::tool_result(
                        &step.tool,
                        Some(step.id.clone()),
                        false,
                        step.timeout,
                        "timeout",
                    ));
                    return AttemptOutcome::Failure(format!(
                        "Step '{}' timed out after {}ms",
                        step.id, step.timeout
                    ));
                }
                Ok(Err(tool_error)) => {
                    self.observer.emit(TraceEvent::tool_result(
                        &step.tool,
                        Some(step.id.clone()),
                        false,
                        0,
                        tool_error.to_string(),
                    ));
                    return AttemptOutcome::Failure(tool_error.to_string());
                }
                Ok(Ok(normalized)) => normalized,
            };

        self.observer.emit(TraceEvent::tool_result(
            &step.tool,
            Some(step.id.clone()),
            normalized.ok,
            normalized.duration_ms,
            &normalized.observation,
        ));

        if !normalized.ok {
            let message = normalized
                .errors
                .as_ref()
                .and_then(|errors| errors.last().cloned())
                .unwrap_or_else(|| normalized.observation.clone());
            return AttemptOutcome::Failure(message);
        }

        let parsed = parse_result(&normalized);
        {
            let mut state = handle.lock();
            state.results.insert(step.id.clone(), parsed.clone());
            if let Some(variable) = step.store_as() {
                state
                    .variables
                    .insert(variable.to_string(), parsed.clone());
            }
        }

        if let Some(wait) = &step.wait_for {
            match wait_for(wait, self.driver.as_ref(), variables, &handle.cancelled).await {
                WaitOutcome::Met => {}
                WaitOutcome::Cancelled => return AttemptOutcome::Cancelled,
                WaitOutcome::TimedOut(message) => return AttemptOutcome::Failure(message),
            }
        }

        AttemptOutcome::Success(parsed)
    }

    fn track(&self, execution_id: &str, handle: Arc<ExecutionHandle>) {
        let mut executions = self.lock_executions();
        executions.insert(execution_id.to_string(), handle);
    }

    fn lock_executions(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ExecutionHandle>>> {
        self.executions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The value a step contributes to `results` (and `storeAs`): the
/// observation or first textual artifact, parsed as JSON when it parses,
/// kept as a string otherwise.
fn parse_result(result: &NormalizedToolResult) -> Value {
    let text = if result.observation != "OK" {
        result.observation.as_str()
    } else {
        result
            .first_textual_artifact()
            .unwrap_or(result.observation.as_str())
    };
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
