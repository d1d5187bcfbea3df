//! Browser abstraction consumed by the table helpers and scenario steps
//!
//! The traits here mirror the small slice of Playwright the harness needs.
//! [`crate::playwright::PlaywrightSession`] drives a real browser; tests use
//! an in-memory implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;

/// A chained element query, resolved lazily by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub selector: String,

    /// Text filters, applied in order. An element must contain all of them.
    #[serde(default)]
    pub has_text: Vec<String>,

    #[serde(default)]
    pub nth: Option<usize>,

    /// Child query resolved inside the matches of this one
    #[serde(default)]
    pub inner: Option<Box<Locator>>,
}

impl Locator {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            has_text: Vec::new(),
            nth: None,
            inner: None,
        }
    }

    pub fn has_text(mut self, text: impl Into<String>) -> Self {
        self.has_text.push(text.into());
        self
    }

    pub fn nth(mut self, index: usize) -> Self {
        self.nth = Some(index);
        self
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }

    /// Query `selector` inside this locator's matches.
    pub fn locator(&self, selector: impl Into<String>) -> Self {
        let mut outer = self.clone();
        let child = Locator::new(selector);
        outer.set_innermost(child);
        outer
    }

    fn set_innermost(&mut self, child: Locator) {
        match self.inner.as_mut() {
            Some(inner) => inner.set_innermost(child),
            None => self.inner = Some(Box::new(child)),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector)?;
        for text in &self.has_text {
            write!(f, " >> has-text={:?}", text)?;
        }
        if let Some(n) = self.nth {
            write!(f, " >> nth={}", n)?;
        }
        if let Some(inner) = &self.inner {
            write!(f, " >> {}", inner)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

/// Predicate over network responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMatcher {
    pub url_contains: String,
    pub statuses: Vec<u16>,
}

impl ResponseMatcher {
    pub fn new(url_contains: impl Into<String>, statuses: &[u16]) -> Self {
        Self {
            url_contains: url_contains.into(),
            statuses: statuses.to_vec(),
        }
    }

    pub fn matches(&self, url: &str, status: u16) -> bool {
        url.contains(&self.url_contains) && self.statuses.contains(&status)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

/// A request issued from inside the authenticated browser context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: u16,
    #[serde(default)]
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> E2eResult<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// DOM queries and user actions against the current page
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a path relative to the base URL
    async fn goto(&self, path: &str) -> E2eResult<()>;

    async fn reload(&self) -> E2eResult<()>;

    async fn wait_for(&self, locator: &Locator, state: WaitState, timeout: Duration) -> E2eResult<()>;

    async fn attribute(&self, locator: &Locator, name: &str) -> E2eResult<Option<String>>;

    async fn click(&self, locator: &Locator) -> E2eResult<()>;

    async fn fill(&self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn select_option(&self, locator: &Locator, label: &str) -> E2eResult<()>;

    async fn check(&self, locator: &Locator) -> E2eResult<()>;

    async fn count(&self, locator: &Locator) -> E2eResult<usize>;

    async fn text_contents(&self, locator: &Locator) -> E2eResult<Vec<String>>;

    async fn text_content(&self, locator: &Locator) -> E2eResult<Option<String>>;

    async fn is_enabled(&self, locator: &Locator) -> E2eResult<bool>;

    async fn wait_for_enabled(&self, locator: &Locator, timeout: Duration) -> E2eResult<()>;

    /// Scroll a container to its end, triggering any lazy loading bound to it
    async fn scroll_to_end(&self, container: &Locator) -> E2eResult<()>;

    async fn scroll_into_view(&self, locator: &Locator) -> E2eResult<()>;

    /// Wait until the page URL matches a glob such as `**/pessoa`
    async fn wait_for_url(&self, pattern: &str, timeout: Duration) -> E2eResult<()>;
}

/// Observation of responses received by the page
#[async_trait]
pub trait NetworkObserver: Send + Sync {
    /// Forget every response seen so far. Call before the action that should
    /// trigger the response being waited for.
    async fn mark(&self) -> E2eResult<()>;

    /// Wait for a response matching `matcher` received after the last mark.
    ///
    /// Returns `Ok(false)` when nothing matched within `timeout`.
    async fn wait_for_response(&self, matcher: &ResponseMatcher, timeout: Duration) -> E2eResult<bool>;
}

/// HTTP requests sharing the browser's cookies
#[async_trait]
pub trait RequestContext: Send + Sync {
    async fn cookie(&self, name: &str) -> E2eResult<Option<String>>;

    async fn request(&self, request: ApiRequest) -> E2eResult<ApiResponse>;
}

/// Everything a scenario step needs from a browser
pub trait BrowserSession: PageDriver + NetworkObserver + RequestContext {}

impl<T: PageDriver + NetworkObserver + RequestContext> BrowserSession for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_chaining() {
        let row = Locator::new("tbody tr").has_text("Desc_1").has_text("42").first();
        let button = row.locator("[data-cy=\"entityEditButton\"]");

        assert_eq!(button.selector, "tbody tr");
        assert_eq!(button.has_text, vec!["Desc_1", "42"]);
        assert_eq!(button.nth, Some(0));
        assert_eq!(button.inner.as_ref().unwrap().selector, "[data-cy=\"entityEditButton\"]");

        let nested = button.locator("svg");
        let inner = nested.inner.as_ref().unwrap();
        assert_eq!(inner.inner.as_ref().unwrap().selector, "svg");
    }

    #[test]
    fn test_response_matcher() {
        let matcher = ResponseMatcher::new("/api/pessoas", &[200, 201]);
        assert!(matcher.matches("http://localhost:8080/api/pessoas?page=1", 200));
        assert!(!matcher.matches("http://localhost:8080/api/pessoas/3", 204));
        assert!(!matcher.matches("http://localhost:8080/api/account", 200));
    }
}
