use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::schemas::{WaitCondition, WaitKind};
use crate::tools::{BrowserDriver, BrowserError, ElementCheck};

use super::substitute_str;

#[derive(Debug, PartialEq, Eq)]
pub(super) enum WaitOutcome {
    Met,
    Cancelled,
    TimedOut(String),
}

/// Poll the wait predicate at `interval` until it holds, the timeout
/// elapses, or the execution is cancelled. Poll errors are logged and
/// retried; only the deadline fails the wait.
pub(super) async fn wait_for(
    condition: &WaitCondition,
    driver: Option<&Arc<dyn BrowserDriver>>,
    variables: &HashMap<String, Value>,
    cancelled: &AtomicBool,
) -> WaitOutcome {
    let deadline = Instant::now() + Duration::from_millis(condition.timeout);
    let interval = Duration::from_millis(condition.interval.max(1));

    loop {
        if cancelled.load(Ordering::SeqCst) {
            return WaitOutcome::Cancelled;
        }

        match check(condition, driver, variables).await {
            Ok(true) => return WaitOutcome::Met,
            Ok(false) => {}
            Err(e) => log::debug!("wait poll for {} failed ({e}), retrying", condition.kind),
        }

        if Instant::now() + interval > deadline {
            return WaitOutcome::TimedOut(format!(
                "Condition timeout: {} after {}ms",
                condition.kind, condition.timeout
            ));
        }
        tokio::time::sleep(interval).await;
    }
}

async fn check(
    condition: &WaitCondition,
    driver: Option<&Arc<dyn BrowserDriver>>,
    variables: &HashMap<String, Value>,
) -> Result<bool, BrowserError> {
    let Some(driver) = driver else {
        return Err(BrowserError::Driver("no browser driver attached".to_string()));
    };

    match condition.kind {
        WaitKind::Element => {
            let selector =
                substitute_str(condition.selector.as_deref().unwrap_or_default(), variables);
            driver
                .check_element(&ElementCheck {
                    selector,
                    state: condition.state.clone(),
                    text: condition.text.clone(),
                })
                .await
        }
        WaitKind::NetworkIdle => driver.network_idle().await,
        WaitKind::Navigation => {
            let tab = driver.active_tab().await?;
            Ok(match &condition.url {
                Some(url) => tab.url.contains(&substitute_str(url, variables)),
                None => true,
            })
        }
        WaitKind::Custom => {
            let expression =
                substitute_str(condition.expression.as_deref().unwrap_or_default(), variables);
            Ok(driver.eval_expression(&expression).await? == Value::Bool(true))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;

    use super::*;
    use crate::tools::{
        ElementQuery, InteractiveElement, Screenshot, ScreenshotOptions, TabInfo,
    };

    /// Driver whose element check succeeds after a configured number of
    /// polls; everything else is canned.
    struct CountingDriver {
        succeed_after: u32,
        polls: AtomicU32,
        url: String,
    }

    impl CountingDriver {
        fn new(succeed_after: u32) -> Self {
            Self {
                succeed_after,
                polls: AtomicU32::new(0),
                url: "https://example.com/dashboard".to_string(),
            }
        }
    }

    #[async_trait]
    impl BrowserDriver for CountingDriver {
        async fn navigate(&self, _url: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn click(&self, _selector: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn type_text(&self, _selector: &str, _text: &str) -> Result<(), BrowserError> {
            Ok(())
        }

        async fn scrape(&self, _selector: Option<&str>) -> Result<String, BrowserError> {
            Ok(String::new())
        }

        async fn interactive_elements(
            &self,
            _query: ElementQuery,
        ) -> Result<Vec<InteractiveElement>, BrowserError> {
            Ok(Vec::new())
        }

        async fn screenshot(
            &self,
            _options: ScreenshotOptions,
        ) -> Result<Screenshot, BrowserError> {
            Ok(Screenshot {
                data_url: String::new(),
            })
        }

        async fn check_element(&self, _check: &ElementCheck) -> Result<bool, BrowserError> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(poll >= self.succeed_after)
        }

        async fn eval_expression(&self, expression: &str) -> Result<Value, BrowserError> {
            Ok(Value::Bool(expression == "true"))
        }

        async fn active_tab(&self) -> Result<TabInfo, BrowserError> {
            Ok(TabInfo {
                id: 1,
                url: self.url.clone(),
                title: "Example".to_string(),
            })
        }

        async fn network_idle(&self) -> Result<bool, BrowserError> {
            Ok(true)
        }
    }

    fn driver(succeed_after: u32) -> Arc<dyn BrowserDriver> {
        Arc::new(CountingDriver::new(succeed_after))
    }

    #[tokio::test]
    async fn test_element_wait_polls_until_met() {
        let driver = driver(2);
        let condition = WaitCondition::element("#done")
            .with_timeout(1000)
            .with_interval(10);

        let outcome = wait_for(
            &condition,
            Some(&driver),
            &HashMap::new(),
            &AtomicBool::new(false),
        )
        .await;
        assert_eq!(outcome, WaitOutcome::Met);
    }

    #[tokio::test]
    async fn test_wait_times_out_with_message() {
        let driver = driver(u32::MAX);
        let condition = WaitCondition::element("#never")
            .with_timeout(50)
            .with_interval(10);

        let outcome = wait_for(
            &condition,
            Some(&driver),
            &HashMap::new(),
            &AtomicBool::new(false),
        )
        .await;
        assert_eq!(
            outcome,
            WaitOutcome::TimedOut("Condition timeout: element after 50ms".to_string())
        );
    }

    #[tokio::test]
    async fn test_cancellation_exits_at_poll_tick() {
        let driver = driver(u32::MAX);
        let condition = WaitCondition::element("#never")
            .with_timeout(60_000)
            .with_interval(10);
        let cancelled = AtomicBool::new(true);

        let outcome = wait_for(&condition, Some(&driver), &HashMap::new(), &cancelled).await;
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_navigation_wait_matches_url_substring() {
        let driver = driver(0);
        let condition = WaitCondition::navigation(Some("dashboard".to_string()))
            .with_timeout(100)
            .with_interval(10);

        let outcome = wait_for(
            &condition,
            Some(&driver),
            &HashMap::new(),
            &AtomicBool::new(false),
        )
        .await;
        assert_eq!(outcome, WaitOutcome::Met);
    }

    #[tokio::test]
    async fn test_custom_wait_requires_boolean_true() {
        let driver = driver(0);
        let met = WaitCondition::custom("true").with_timeout(100).with_interval(10);
        let not_met = WaitCondition::custom("1 + 1")
            .with_timeout(50)
            .with_interval(10);

        assert_eq!(
            wait_for(&met, Some(&driver), &HashMap::new(), &AtomicBool::new(false)).await,
            WaitOutcome::Met
        );
        assert!(matches!(
            wait_for(
                &not_met,
                Some(&driver),
                &HashMap::new(),
                &AtomicBool::new(false)
            )
            .await,
            WaitOutcome::TimedOut(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_driver_polls_are_swallowed_until_timeout() {
        let condition = WaitCondition::network_idle()
            .with_timeout(30)
            .with_interval(10);

        let outcome = wait_for(&condition, None, &HashMap::new(), &AtomicBool::new(false)).await;
        assert!(matches!(outcome, WaitOutcome::TimedOut(_)));
    }
}
