use async_trait::async_trait;

use super::LlmError;

/// The single capability the core needs from a language model: prompt
/// in, text out. The planner and boundaries depend on this trait, never
/// on a concrete client.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

impl<L> From<L> for Box<dyn LanguageModel>
where
    L: 'static + LanguageModel,
{
    fn from(model: L) -> Self {
        Box::new(model)
    }
}
