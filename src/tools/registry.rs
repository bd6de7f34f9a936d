use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value;

use super::{NormalizedToolResult, Tool, ToolContext, ToolError};

/// Process-wide catalog of tools. Registration replaces by id
/// atomically; definitions are immutable once stored.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any earlier registration with the
    /// same id.
    pub fn register(&self, tool: impl Into<Box<dyn Tool>>) {
        let tool: Arc<dyn Tool> = Arc::from(tool.into());
        let id = tool.id();
        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        if tools.insert(id.clone(), tool).is_some() {
            log::debug!("tool '{id}' replaced in registry");
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tools
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }

    /// All registered tools, sorted by id for stable catalogs.
    pub fn list(&self) -> Vec<Arc<dyn Tool>> {
        let tools = self.tools.read().unwrap_or_else(|e| e.into_inner());
        let mut list: Vec<_> = tools.values().cloned().collect();
        list.sort_by_key(|t| t.id());
        list
    }

    pub fn catalog(&self) -> String {
        self.list()
            .iter()
            .map(|t| t.to_catalog_entry())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Validate, check preconditions, then execute with the tool's own
    /// retry policy, normalizing whatever comes back.
    pub async fn run(
        &self,
        id: &str,
        ctx: &ToolContext,
        input: Value,
    ) -> Result<NormalizedToolResult, ToolError> {
        let start = Instant::now();

        let tool = self
            .get(id)
            .ok_or_else(|| ToolError::ToolNotFound(id.to_string()))?;

        if let Err(reason) = tool.input_schema().validate(&input) {
            return Err(ToolError::InvalidInput {
                tool: id.to_string(),
                reason,
            });
        }

        let precondition = tool.preconditions(ctx, &input).await;
        if !precondition.ok {
            let observation = precondition
                .observation
                .unwrap_or_else(|| "precondition failed".to_string());
            log::debug!("tool '{id}' precondition failed: {observation}");
            return Ok(NormalizedToolResult::failure(
                observation,
                Vec::new(),
                elapsed_ms(start),
            ));
        }

        let policy = tool.retry_policy();
        let attempts = policy.max_attempts.max(1);
        let mut errors: Vec<String> = Vec::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(policy.backoff_ms * attempt as u64))
                    .await;
            }

            match tool.run(ctx, input.clone()).await {
                Ok(output) => {
                    return Ok(NormalizedToolResult::from_output(output, elapsed_ms(start)))
                }
                Err(e) => {
                    log::warn!(
                        "tool '{id}' attempt {}/{attempts} failed: {e}",
                        attempt + 1
                    );
                    errors.push(e.to_string());
                }
            }
        }

        let observation = errors.last().cloned().unwrap_or_default();
        Ok(NormalizedToolResult::failure(
            observation,
            errors,
            elapsed_ms(start),
        ))
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
