use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("No such element: {0}")]
    NoSuchElement(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Script evaluation failed: {0}")]
    EvalFailed(String),

    #[error("No active tab")]
    NoActiveTab,

    #[error("Driver error: {0}")]
    Driver(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TabInfo {
    pub id: i64,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveElement {
    pub selector: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default)]
    pub include_coordinates: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotOptions {
    pub name: String,
    #[serde(default)]
    pub full_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default)]
    pub store_base64: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub data_url: String,
}

/// What an element wait asks the page about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementCheck {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// The narrow surface the core needs from a page driver. Implementations
/// live outside this crate (a content-script bridge, a CDP client, a
/// test double); the engine and browser-backed tools only see this trait.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    /// Text content of the matched element, or of the page when no
    /// selector is given.
    async fn scrape(&self, selector: Option<&str>) -> Result<String, BrowserError>;

    async fn interactive_elements(
        &self,
        query: ElementQuery,
    ) -> Result<Vec<InteractiveElement>, BrowserError>;

    async fn screenshot(&self, options: ScreenshotOptions) -> Result<Screenshot, BrowserError>;

    /// Whether the element currently satisfies the check.
    async fn check_element(&self, check: &ElementCheck) -> Result<bool, BrowserError>;

    /// Evaluate an expression in the page context. Used by `custom`
    /// wait conditions.
    async fn eval_expression(&self, expression: &str) -> Result<Value, BrowserError>;

    async fn active_tab(&self) -> Result<TabInfo, BrowserError>;

    /// Whether the page has had no active requests for a sustained
    /// interval. Fidelity depends entirely on the driver's request
    /// tracking; drivers without it should return true once the page
    /// settles.
    async fn network_idle(&self) -> Result<bool, BrowserError>;
}
