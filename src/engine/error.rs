use thiserror::Error;

/// Structural rejections raised before any tool runs. Step-level
/// failures never surface here; they are resolved through the
/// workflow's error-handling policy.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Circular dependency detected involving step: {0}")]
    CircularDependency(String),

    #[error("Step dependency not found: {dep} required by {step}")]
    MissingDependency { dep: String, step: String },

    #[error("Deadlock detected in workflow dependencies")]
    Deadlock,

    #[error("Duplicate step id: {0}")]
    DuplicateStepId(String),

    #[error("Workflow references unregistered tool '{tool}' in step {step}")]
    UnknownTool { tool: String, step: String },

    #[error("Invalid wait condition on step {step}: interval exceeds timeout")]
    InvalidWaitCondition { step: String },
}
