use std::future::Future;
use std::time::Duration;

use crate::error::AgentError;

/// Advisory scope tag for a boundary; feeds log context only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    Component,
    Operation,
    Global,
}

impl IsolationLevel {
    fn as_str(&self) -> &'static str {
        match self {
            IsolationLevel::Component => "component",
            IsolationLevel::Operation => "operation",
            IsolationLevel::Global => "global",
        }
    }
}

type ErrorHook = Box<dyn Fn(&AgentError) + Send + Sync>;

/// Named retry-and-fallback wrapper for async operations outside the
/// workflow engine, with the same retry semantics a step gets.
pub struct ErrorBoundary {
    name: String,
    max_retries: u32,
    retry_delay: Duration,
    isolation_level: IsolationLevel,
    on_error: Option<ErrorHook>,
}

impl ErrorBoundary {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_retries: 0,
            retry_delay: Duration::from_millis(1000),
            isolation_level: IsolationLevel::default(),
            on_error: None,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_isolation_level(mut self, isolation_level: IsolationLevel) -> Self {
        self.isolation_level = isolation_level;
        self
    }

    pub fn with_on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&AgentError) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(on_error));
        self
    }

    /// Run the operation, retrying up to `max_retries` times with a
    /// fixed delay. The last error is returned when the budget runs out.
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T, AgentError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if let Some(on_error) = &self.on_error {
                        on_error(&error);
                    }
                    log::warn!(
                        "boundary '{}' ({}) attempt {} failed: {error}",
                        self.name,
                        self.isolation_level.as_str(),
                        attempt + 1
                    );

                    if attempt < self.max_retries {
                        attempt += 1;
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Retry as in [`run`](Self::run); a still-failing operation yields
    /// the fallback value instead of an error.
    pub async fn run_with_fallback<T, F, Fut, FB>(&self, operation: F, fallback: FB) -> T
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
        FB: FnOnce() -> T,
    {
        match self.run(operation).await {
            Ok(value) => value,
            Err(error) => {
                log::warn!("boundary '{}' exhausted, serving fallback: {error}", self.name);
                fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let boundary = ErrorBoundary::new("flaky-fetch")
            .with_max_retries(3)
            .with_retry_delay(Duration::from_millis(10));

        let seen = calls.clone();
        let value = boundary
            .run(move || {
                let seen = seen.clone();
                async move {
                    if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AgentError::network("not yet"))
                    } else {
                        Ok("finally")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, "finally");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let boundary = ErrorBoundary::new("hopeless")
            .with_max_retries(2)
            .with_retry_delay(Duration::from_millis(1));

        let seen = calls.clone();
        let err = boundary
            .run(move || {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(AgentError::network("still down"))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(err.message, "still down");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_on_error_hook_sees_every_failure() {
        let seen = Arc::new(AtomicU32::new(0));
        let hook_seen = seen.clone();
        let boundary = ErrorBoundary::new("observed")
            .with_max_retries(1)
            .with_retry_delay(Duration::from_millis(0))
            .with_on_error(move |_| {
                hook_seen.fetch_add(1, Ordering::SeqCst);
            });

        let _ = boundary
            .run(|| async { Err::<(), _>(AgentError::network("x")) })
            .await;
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fallback_on_exhaustion() {
        let boundary = ErrorBoundary::new("fallible").with_retry_delay(Duration::from_millis(0));
        let value = boundary
            .run_with_fallback(
                || async { Err::<i32, _>(AgentError::network("down")) },
                || -1,
            )
            .await;
        assert_eq!(value, -1);
    }
}
