use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::keypool::{mask_secret, KeyPool};
use crate::llm::{classify_response_error, LanguageModel, LlmError};

use super::models::{ApiResponse, Payload};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Every external call is bounded; a hung transport surfaces as a
/// timeout error rather than a stuck execution.
const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(60);

/// Generate-text client for the `generateContent` wire protocol, keyed
/// through the pool. Authentication and quota failures rotate to the
/// next usable key; anything else is returned after the first try.
pub struct GeminiClient {
    client: Client,
    model: String,
    base_url: String,
    pool: Arc<KeyPool>,
}

impl GeminiClient {
    pub fn new(pool: Arc<KeyPool>) -> Self {
        Self {
            client: Client::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            pool,
        }
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn call(&self, prompt: &str) -> Result<String, LlmError> {
        let attempts = self.pool.active_count().max(1);
        let mut last_error = None;

        for _ in 0..attempts {
            let Some(lease) = self.pool.get_current() else {
                return Err(LlmError::AuthenticationError(
                    "no usable API key in the pool".to_string(),
                ));
            };

            match self.generate_with_key(prompt, &lease.secret).await {
                Ok(text) => {
                    self.pool.report_success(&lease.id);
                    return Ok(text);
                }
                Err(e) => match e.key_failure() {
                    Some(kind) => {
                        log::warn!(
                            "model call failed ({}) on key {}, rotating",
                            e.error_type(),
                            mask_secret(lease.secret.expose_secret())
                        );
                        self.pool.report_failure(&lease.id, kind);
                        last_error = Some(e);
                    }
                    None => return Err(e),
                },
            }
        }

        Err(last_error.unwrap_or_else(|| {
            LlmError::AuthenticationError("no usable API key in the pool".to_string())
        }))
    }

    async fn generate_with_key(
        &self,
        prompt: &str,
        secret: &SecretString,
    ) -> Result<String, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            self.model,
            secret.expose_secret()
        );
        let payload = Payload::user_text(prompt);

        let response = tokio::time::timeout(
            TRANSPORT_TIMEOUT,
            self.client.post(&url).json(&payload).send(),
        )
        .await??;

        let status = response.status().as_u16();
        let body = tokio::time::timeout(TRANSPORT_TIMEOUT, response.text()).await??;

        if !(200..300).contains(&status) {
            return Err(classify_response_error(status, &body));
        }

        let api: ApiResponse = serde_json::from_str(&body)?;
        api.first_text().ok_or_else(|| {
            LlmError::ContentNotFound("candidates[0].content.parts[*].text".to_string())
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.call(prompt).await
    }
}
