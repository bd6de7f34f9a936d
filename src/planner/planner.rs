use std::sync::Arc;

use crate::llm::LanguageModel;
use crate::schemas::{Step, Workflow};
use crate::tools::{InteractiveElement, ToolRegistry};

use super::{extract_json, PlanError, PlanResponse, PLANNER_PROMPT};

pub const DEFAULT_MAX_STEPS: usize = 6;

/// What the planner knows about the page when it plans.
#[derive(Debug, Clone, Default)]
pub struct PlanContext {
    pub url: Option<String>,
    pub title: Option<String>,
    pub elements: Vec<InteractiveElement>,
    pub content_preview: Option<String>,
}

impl PlanContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, title: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self.title = Some(title.into());
        self
    }

    pub fn with_elements(mut self, elements: Vec<InteractiveElement>) -> Self {
        self.elements = elements;
        self
    }

    pub fn with_content_preview(mut self, content: impl Into<String>) -> Self {
        self.content_preview = Some(content.into());
        self
    }
}

/// Turns a goal plus page context into a validated workflow whose steps
/// reference only registered tools, chained sequentially for safety.
pub struct Planner {
    model: Box<dyn LanguageModel>,
    registry: Arc<ToolRegistry>,
    max_steps: usize,
}

impl Planner {
    pub fn new(model: impl Into<Box<dyn LanguageModel>>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            model: model.into(),
            registry,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub async fn plan(&self, goal: &str, context: &PlanContext) -> Result<Workflow, PlanError> {
        let prompt = self.build_prompt(goal, context);
        let response = self.model.generate(&prompt).await?;

        let value = extract_json(&response).ok_or_else(|| {
            PlanError::InvalidResponse("no JSON object found in model output".to_string())
        })?;
        let plan: PlanResponse = serde_json::from_value(value)
            .map_err(|e| PlanError::InvalidResponse(format!("plan shape mismatch: {e}")))?;

        if plan.steps.is_empty() {
            return Err(PlanError::InvalidResponse(
                "plan contains no steps".to_string(),
            ));
        }

        let mut planned = plan.steps;
        if planned.len() > self.max_steps {
            log::warn!(
                "plan has {} steps, truncating to {}",
                planned.len(),
                self.max_steps
            );
            planned.truncate(self.max_steps);
        }

        for step in &planned {
            if !self.registry.contains(&step.tool) {
                return Err(PlanError::UnknownTool(step.tool.clone()));
            }
        }

        let steps = planned
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                if let Some(rationale) = &p.rationale {
                    log::debug!("step_{} ({}): {rationale}", i + 1, p.tool);
                }
                let mut step = Step::new(format!("step_{}", i + 1), p.tool).with_args(p.params);
                if i > 0 {
                    // Sequential by default: parallelism is opt-in for
                    // hand-authored workflows, never for planned ones.
                    step = step.with_depends([format!("step_{i}")]);
                }
                step
            })
            .collect();

        let mut workflow = Workflow::new(plan_name(goal), steps);
        if !plan.thought.is_empty() {
            workflow = workflow.with_description(plan.thought);
        }
        Ok(workflow)
    }

    fn build_prompt(&self, goal: &str, context: &PlanContext) -> String {
        let elements = if context.elements.is_empty() {
            "(none)".to_string()
        } else {
            context
                .elements
                .iter()
                .map(|e| {
                    format!(
                        "- {} <{}> {}",
                        e.selector,
                        e.tag,
                        e.text.as_deref().unwrap_or("")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };

        PLANNER_PROMPT
            .replace("{{goal}}", goal)
            .replace("{{url}}", context.url.as_deref().unwrap_or("(unknown)"))
            .replace("{{title}}", context.title.as_deref().unwrap_or("(unknown)"))
            .replace("{{elements}}", &elements)
            .replace(
                "{{content}}",
                context.content_preview.as_deref().unwrap_or("(none)"),
            )
            .replace("{{tools}}", &self.registry.catalog())
            .replace("{{max_steps}}", &self.max_steps.to_string())
    }
}

fn plan_name(goal: &str) -> String {
    let trimmed = goal.trim();
    if trimmed.chars().count() <= 48 {
        trimmed.to_string()
    } else {
        let prefix: String = trimmed.chars().take(48).collect();
        format!("{prefix}…")
    }
}
