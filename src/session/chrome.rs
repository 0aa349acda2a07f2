//! Chromium-backed page sessions over the DevTools protocol.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures::StreamExt;
use tracing::{debug, warn};

use super::{ElementHandle, Locator, PageSession, SessionFactory};
use crate::error::SessionError;

/// JavaScript to wait for page ready state.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Launches one headless browser and hands out isolated pages.
pub struct ChromeSessionFactory {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromeSessionFactory {
    /// Launch the browser that backs all sessions of a run.
    pub async fn launch(headless: bool) -> Result<Self, SessionError> {
        let mut builder = BrowserConfig::builder()
            .window_size(1920, 1080)
            .args(vec!["--no-sandbox", "--disable-dev-shm-usage"]);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        // The handler drives the CDP websocket; it must be polled for the
        // lifetime of the browser.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Close the browser and stop the handler loop.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("browser close failed: {}", e);
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn create(&self) -> Result<Box<dyn PageSession>, SessionError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(Box::new(ChromePageSession { page }))
    }
}

/// One browser tab, exclusively owned by its worker.
pub struct ChromePageSession {
    page: Page,
}

impl ChromePageSession {
    async fn find_css(&self, selector: &str) -> Option<Element> {
        // Not-found and protocol errors are indistinguishable here; both
        // mean "no element right now" to a polling caller.
        self.page.find_element(selector).await.ok()
    }
}

#[async_trait]
impl PageSession for ChromePageSession {
    async fn open(&mut self, url: &str) -> Result<(), SessionError> {
        self.page.goto(url).await.map_err(|e| SessionError::Open {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        match self.page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()).await {
            Ok(result) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("page ready state: {}", state);
            }
            Err(e) => debug!("could not check ready state: {}", e),
        }
        Ok(())
    }

    async fn find_one(
        &self,
        locator: &Locator,
    ) -> Result<Option<Box<dyn ElementHandle>>, SessionError> {
        let found = match locator {
            Locator::Css(selector) => self.find_css(selector).await,
            Locator::XPath(expression) => self.page.find_xpath(expression).await.ok(),
        };
        Ok(found.map(|element| Box::new(ChromeElement { element }) as Box<dyn ElementHandle>))
    }

    async fn find_all(
        &self,
        locator: &Locator,
    ) -> Result<Vec<Box<dyn ElementHandle>>, SessionError> {
        let found = match locator {
            Locator::Css(selector) => self.page.find_elements(selector).await,
            Locator::XPath(expression) => self.page.find_xpaths(expression).await,
        };
        Ok(found
            .unwrap_or_default()
            .into_iter()
            .map(|element| Box::new(ChromeElement { element }) as Box<dyn ElementHandle>)
            .collect())
    }

    async fn execute_script(&self, code: &str) -> Result<serde_json::Value, SessionError> {
        let result = self
            .page
            .evaluate(code.to_string())
            .await
            .map_err(|e| SessionError::Script(e.to_string()))?;
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn press_key(&self, key: &str) -> Result<(), SessionError> {
        let body = self
            .page
            .find_element("body")
            .await
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        body.press_key(key)
            .await
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        // Page handles are cloneable; close consumes the clone.
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        Ok(())
    }
}

struct ChromeElement {
    element: Element,
}

#[async_trait]
impl ElementHandle for ChromeElement {
    async fn text(&self) -> Result<String, SessionError> {
        let text = self
            .element
            .inner_text()
            .await
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, SessionError> {
        self.element
            .attribute(name)
            .await
            .map_err(|e| SessionError::Interaction(e.to_string()))
    }

    async fn click(&self) -> Result<(), SessionError> {
        self.element
            .click()
            .await
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        Ok(())
    }

    async fn find_one(&self, css: &str) -> Result<Option<Box<dyn ElementHandle>>, SessionError> {
        Ok(self
            .element
            .find_element(css)
            .await
            .ok()
            .map(|element| Box::new(ChromeElement { element }) as Box<dyn ElementHandle>))
    }

    async fn find_all(&self, css: &str) -> Result<Vec<Box<dyn ElementHandle>>, SessionError> {
        Ok(self
            .element
            .find_elements(css)
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|element| Box::new(ChromeElement { element }) as Box<dyn ElementHandle>)
            .collect())
    }
}
