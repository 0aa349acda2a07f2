//! Stateful pagination over the listing view.
//!
//! The listing is a single JavaScript-driven page: changing pages calls
//! a script, waits for asynchronous content, and verifies that the
//! pagination control caught up. The controller owns the one listing
//! session for the whole run.

use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::error::{DiscoveryError, SessionError};
use crate::models::{ItemReference, PageCursor};
use crate::session::{wait_visible, Locator, PageSession, WaitPolicy};

/// Selectors and the navigation action for the listing page.
///
/// These are data, not code: a different catalog with the same shape
/// plugs in its own locators.
#[derive(Debug, Clone)]
pub struct ListingLocators {
    /// Element whose text is the total record count.
    pub total_records: Locator,
    /// Element whose `value` attribute is the configured page size.
    pub page_size: Locator,
    /// Visible text of the page-size option to select before discovery.
    pub page_size_option: Option<String>,
    /// Anchor elements linking to item detail pages.
    pub item_links: Locator,
    /// Element whose text is the currently active page number.
    pub active_page: Locator,
    /// Script template for the page-change action; `{page}` is replaced
    /// with the target page number.
    pub nav_script: String,
}

impl Default for ListingLocators {
    fn default() -> Self {
        Self {
            total_records: Locator::css("#totalRecord"),
            page_size: Locator::css("#pageSize"),
            page_size_option: Some("50".to_string()),
            item_links: Locator::css("ul.list-document li a"),
            active_page: Locator::css(".pagination .active"),
            nav_script: "doSearch({page});".to_string(),
        }
    }
}

impl ListingLocators {
    fn nav_script_for(&self, page: u32) -> String {
        self.nav_script.replace("{page}", &page.to_string())
    }
}

/// Drives the listing view: sizing, page changes, link discovery.
pub struct PaginationController {
    session: Box<dyn PageSession>,
    locators: ListingLocators,
    waits: WaitPolicy,
    /// Grace period after the navigation script before verification.
    settle: Duration,
}

impl PaginationController {
    pub fn new(
        session: Box<dyn PageSession>,
        locators: ListingLocators,
        waits: WaitPolicy,
        settle: Duration,
    ) -> Self {
        Self {
            session,
            locators,
            waits,
            settle,
        }
    }

    /// Open the listing and let it settle.
    pub async fn open_listing(&mut self, url: &str) -> Result<(), SessionError> {
        self.session.open(url).await?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }

    /// Select the configured page-size option, best effort. The listing
    /// reloads its content afterwards.
    pub async fn apply_page_size(&self) {
        let Some(wanted) = self.locators.page_size_option.as_deref() else {
            return;
        };
        let select = match self.session.find_one(&self.locators.page_size).await {
            Ok(Some(select)) => select,
            _ => {
                debug!("page-size control not found; keeping the default");
                return;
            }
        };
        let options = select.find_all("option").await.unwrap_or_default();
        for option in &options {
            let text = option.text().await.unwrap_or_default();
            if text == wanted {
                if let Err(e) = option.click().await {
                    warn!("selecting page size {} failed: {}", wanted, e);
                    return;
                }
                tokio::time::sleep(self.settle).await;
                return;
            }
        }
        debug!("page-size option {} not offered", wanted);
    }

    /// Read the total record count and page size off the listing.
    ///
    /// Fatal when either is unreadable: without them the run has no
    /// meaningful page count.
    pub async fn discover_cursor(&self) -> Result<PageCursor, DiscoveryError> {
        let total_el = self
            .session
            .find_one(&self.locators.total_records)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| DiscoveryError::TotalRecords("element not found".to_string()))?;
        let total_text = total_el
            .text()
            .await
            .map_err(|e| DiscoveryError::TotalRecords(e.to_string()))?;
        let total_records: u32 = total_text
            .trim()
            .parse()
            .map_err(|_| DiscoveryError::TotalRecords(format!("not a count: {total_text:?}")))?;

        let size_el = self
            .session
            .find_one(&self.locators.page_size)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| DiscoveryError::PageSize("element not found".to_string()))?;
        let size_text = size_el
            .attribute("value")
            .await
            .map_err(|e| DiscoveryError::PageSize(e.to_string()))?
            .ok_or_else(|| DiscoveryError::PageSize("value attribute missing".to_string()))?;
        let page_size: u32 = size_text
            .trim()
            .parse()
            .map_err(|_| DiscoveryError::PageSize(format!("not a size: {size_text:?}")))?;
        if page_size == 0 {
            return Err(DiscoveryError::PageSize("page size is zero".to_string()));
        }

        let cursor = PageCursor::new(total_records, page_size);
        info!(
            total_records = cursor.total_records,
            page_size = cursor.page_size,
            total_pages = cursor.total_pages,
            "listing discovered"
        );
        Ok(cursor)
    }

    /// Trigger the page-change action and verify it landed.
    ///
    /// Verification first checks the active-page indicator, then falls
    /// back to the presence of item links. Returns false instead of
    /// erroring; the orchestrator treats false as a zero-link page.
    pub async fn navigate_to(&self, cursor: &mut PageCursor, page: u32) -> bool {
        let script = self.locators.nav_script_for(page);
        if let Err(e) = self.session.execute_script(&script).await {
            warn!(page, "page-change script failed: {}", e);
            return false;
        }

        tokio::time::sleep(self.settle).await;

        match wait_visible(self.session.as_ref(), &self.locators.active_page, self.waits).await {
            Ok(active) => {
                let text = active.text().await.unwrap_or_default();
                if text.trim() == page.to_string() {
                    debug!(page, "navigation verified by active-page indicator");
                    cursor.page_number = page;
                    return true;
                }
                warn!(page, actual = %text, "active page differs from target");
            }
            Err(e) => debug!(page, "active-page indicator unavailable: {}", e),
        }

        // Fallback: content present at all means the page loaded
        // something usable.
        let links = self
            .session
            .find_all(&self.locators.item_links)
            .await
            .unwrap_or_default();
        if !links.is_empty() {
            debug!(page, links = links.len(), "navigation verified by link presence");
            cursor.page_number = page;
            return true;
        }

        warn!(page, "navigation could not be verified");
        false
    }

    /// Collect the detail-page links currently visible.
    ///
    /// Returns an empty list, not an error, when none are present; the
    /// caller decides what an empty page means.
    pub async fn discover_links(&self, base: &Url) -> Vec<ItemReference> {
        let elements = self
            .session
            .find_all(&self.locators.item_links)
            .await
            .unwrap_or_default();

        let mut refs = Vec::with_capacity(elements.len());
        for element in &elements {
            let href = match element.attribute("href").await {
                Ok(Some(href)) if !href.is_empty() => href,
                _ => continue,
            };
            match base.join(&href) {
                Ok(absolute) => refs.push(ItemReference::new(absolute.to_string())),
                Err(e) => debug!(href = %href, "skipping unparseable link: {}", e),
            }
        }

        if refs.is_empty() {
            warn!("no item links found on the current page");
        }
        refs
    }

    /// Close the listing session.
    pub async fn close(&mut self) {
        if let Err(e) = self.session.close().await {
            debug!("listing session close failed: {}", e);
        }
    }
}
