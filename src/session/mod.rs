//! Page session capability consumed by the harvest engine.
//!
//! One session is one isolated browsing context. Sessions are exclusively
//! owned: a harvest worker holds its session for the lifetime of a batch,
//! and the pagination controller holds its own for the whole run.

#[cfg(feature = "browser")]
pub mod chrome;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SessionError;

/// How to find something in the rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// CSS selector, evaluated from the document root.
    Css(String),
    /// XPath expression, for sibling/text relations CSS cannot express.
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css {s}"),
            Self::XPath(s) => write!(f, "xpath {s}"),
        }
    }
}

/// Handle to one element in the current document.
///
/// Relative queries (`find_one`/`find_all`) are CSS only and scoped to
/// the element's subtree.
#[async_trait]
pub trait ElementHandle: Send + Sync {
    /// Rendered text content, trimmed.
    async fn text(&self) -> Result<String, SessionError>;

    async fn attribute(&self, name: &str) -> Result<Option<String>, SessionError>;

    async fn click(&self) -> Result<(), SessionError>;

    async fn find_one(&self, css: &str) -> Result<Option<Box<dyn ElementHandle>>, SessionError>;

    async fn find_all(&self, css: &str) -> Result<Vec<Box<dyn ElementHandle>>, SessionError>;
}

/// One isolated browsing context.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate to `url` and wait for the document to settle.
    async fn open(&mut self, url: &str) -> Result<(), SessionError>;

    /// Find the first match, `None` when absent.
    async fn find_one(
        &self,
        locator: &Locator,
    ) -> Result<Option<Box<dyn ElementHandle>>, SessionError>;

    /// Find all current matches; empty when none.
    async fn find_all(&self, locator: &Locator)
        -> Result<Vec<Box<dyn ElementHandle>>, SessionError>;

    /// Evaluate JavaScript in the page, returning its JSON result.
    async fn execute_script(&self, code: &str) -> Result<serde_json::Value, SessionError>;

    /// Send a key press (e.g. "Escape") to the document body.
    async fn press_key(&self, key: &str) -> Result<(), SessionError>;

    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Creates isolated page sessions.
///
/// Session creation is the expensive, resource-bounded step: the worker
/// pool never holds more live sessions than its worker count.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn PageSession>, SessionError>;
}

/// Bounded-wait parameters for element polls.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll: Duration::from_millis(250),
        }
    }
}

/// Poll for an element until it is present or the timeout elapses.
pub async fn wait_visible(
    session: &dyn PageSession,
    locator: &Locator,
    policy: WaitPolicy,
) -> Result<Box<dyn ElementHandle>, SessionError> {
    let deadline = tokio::time::Instant::now() + policy.timeout;
    loop {
        if let Some(element) = session.find_one(locator).await? {
            return Ok(element);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(SessionError::Timeout {
                what: locator.to_string(),
                timeout: policy.timeout,
            });
        }
        tokio::time::sleep(policy.poll).await;
    }
}

/// Poll for an element that can be clicked.
///
/// Presence is the gate: the protocol-level click scrolls the element
/// into view itself.
pub async fn wait_clickable(
    session: &dyn PageSession,
    locator: &Locator,
    policy: WaitPolicy,
) -> Result<Box<dyn ElementHandle>, SessionError> {
    wait_visible(session, locator, policy).await
}
