use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{AgentError, ErrorCategory, RecoveryStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probing: bool,
}

enum Gate {
    Proceed,
    Rejected,
}

/// Failure-thresholded wrapper for risky calls. Consecutive failures
/// open the circuit; after the recovery timeout a single half-open probe
/// decides whether it closes again.
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probing: false,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run the operation unless the circuit is open. An open circuit
    /// fails immediately with a recoverable error.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, AgentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        match self.before_call() {
            Gate::Rejected => Err(open_error()),
            Gate::Proceed => {
                let outcome = operation().await;
                self.after_call(outcome.is_ok());
                outcome
            }
        }
    }

    /// Like [`execute`](Self::execute), but an open circuit yields the
    /// fallback value instead of an error.
    pub async fn execute_with_fallback<T, F, Fut, FB>(
        &self,
        operation: F,
        fallback: FB,
    ) -> Result<T, AgentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
        FB: FnOnce() -> T,
    {
        match self.before_call() {
            Gate::Rejected => {
                log::debug!("circuit open, serving fallback");
                Ok(fallback())
            }
            Gate::Proceed => {
                let outcome = operation().await;
                self.after_call(outcome.is_ok());
                outcome
            }
        }
    }

    fn before_call(&self) -> Gate {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Gate::Proceed,
            CircuitState::Open => {
                let recovered = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.recovery_timeout);
                if recovered {
                    inner.state = CircuitState::HalfOpen;
                    inner.probing = true;
                    Gate::Proceed
                } else {
                    Gate::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if inner.probing {
                    Gate::Rejected
                } else {
                    inner.probing = true;
                    Gate::Proceed
                }
            }
        }
    }

    fn after_call(&self, ok: bool) {
        let mut inner = self.lock();
        inner.probing = false;

        if ok {
            inner.state = CircuitState::Closed;
            inner.consecutive_failures = 0;
            inner.opened_at = None;
            return;
        }

        match inner.state {
            CircuitState::HalfOpen => {
                log::warn!("half-open probe failed, circuit re-opened");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            _ => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    log::warn!(
                        "circuit opened after {} consecutive failures",
                        inner.consecutive_failures
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn open_error() -> AgentError {
    AgentError::new("circuit breaker is open", ErrorCategory::Unknown)
        .with_code("ERR_CIRCUIT_OPEN")
        .with_recovery_strategy(RecoveryStrategy::Fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing() -> Result<(), AgentError> {
        Err(AgentError::network("down"))
    }

    async fn trip(breaker: &CircuitBreaker, times: u32) {
        for _ in 0..times {
            let _ = breaker.execute(|| async { failing() }).await;
        }
    }

    #[tokio::test]
    async fn test_opens_after_threshold() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60));
        assert_eq!(breaker.state(), CircuitState::Closed);

        trip(&breaker, 2).await;
        assert_eq!(breaker.state(), CircuitState::Closed);

        trip(&breaker, 1).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        let err = breaker
            .execute(|| async { Ok::<_, AgentError>(1) })
            .await
            .unwrap_err();
        assert_eq!(err.code, "ERR_CIRCUIT_OPEN");
    }

    #[tokio::test]
    async fn test_open_circuit_serves_fallback() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60));
        trip(&breaker, 1).await;

        let value = breaker
            .execute_with_fallback(|| async { failing().map(|_| 0) }, || 42)
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_closes_on_success() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(100));
        trip(&breaker, 1).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let value = breaker
            .execute(|| async { Ok::<_, AgentError>("recovered") })
            .await
            .unwrap();
        assert_eq!(value, "recovered");
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(100));
        trip(&breaker, 1).await;

        tokio::time::sleep(Duration::from_millis(150)).await;
        trip(&breaker, 1).await;
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(60));
        trip(&breaker, 1).await;
        breaker
            .execute(|| async { Ok::<_, AgentError>(()) })
            .await
            .unwrap();
        trip(&breaker, 1).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
