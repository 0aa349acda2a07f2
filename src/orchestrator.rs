//! Run sequencing: discovery, the page loop, checkpointing.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use url::Url;

use crate::checkpoint::CheckpointStore;
use crate::config::Settings;
use crate::error::{ConfigError, HarvestError};
use crate::extract::RecordExtractor;
use crate::harvest::{run_batch, HarvestEvent};
use crate::models::{Aggregate, PageCursor};
use crate::pagination::PaginationController;
use crate::session::SessionFactory;

/// Totals reported at the end of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarvestSummary {
    pub pages_processed: u32,
    pub records_harvested: usize,
    pub items_failed: usize,
    pub total_expected: u32,
}

/// Owns the whole run: one listing session for pagination, one worker
/// pool per page, one aggregate, one checkpoint store.
///
/// Pages are strictly sequential; pagination is a stateful single
/// session operation, so link discovery is only valid once navigation
/// for that page has finished.
pub struct Harvester {
    settings: Settings,
    factory: Arc<dyn SessionFactory>,
    extractor: Arc<dyn RecordExtractor>,
    events: mpsc::Sender<HarvestEvent>,
}

impl Harvester {
    pub fn new(
        settings: Settings,
        factory: Arc<dyn SessionFactory>,
        extractor: Arc<dyn RecordExtractor>,
        events: mpsc::Sender<HarvestEvent>,
    ) -> Self {
        Self {
            settings,
            factory,
            extractor,
            events,
        }
    }

    /// Run the harvest to completion.
    ///
    /// Every completed page is checkpointed before the next one starts.
    /// A fault inside the page loop still writes the progress made so
    /// far before the run terminates.
    pub async fn run(&self) -> Result<HarvestSummary, HarvestError> {
        self.settings.validate()?;
        let base = Url::parse(&self.settings.base_url).map_err(|e| ConfigError::BaseUrl {
            url: self.settings.base_url.clone(),
            reason: e.to_string(),
        })?;

        let store = CheckpointStore::new(
            &self.settings.output_dir,
            &self.settings.checkpoint_prefix,
        );
        store.ensure_dir()?;
        let aggregate = Aggregate::new();

        let listing = self.factory.create().await?;
        let mut pager = PaginationController::new(
            listing,
            self.settings.listing_locators(),
            self.settings.wait_policy(),
            self.settings.settle(),
        );
        pager.open_listing(&self.settings.base_url).await?;
        pager.apply_page_size().await;

        let mut cursor = match pager.discover_cursor().await {
            Ok(cursor) => cursor,
            Err(err) => {
                // Fatal, but whatever exists still reaches disk first.
                let _ = store.write_aggregate(&aggregate).await;
                pager.close().await;
                return Err(err.into());
            }
        };

        let last_page = match self.settings.max_pages {
            Some(cap) => cursor.total_pages.min(cap),
            None => cursor.total_pages,
        };

        let mut summary = HarvestSummary {
            total_expected: cursor.total_records,
            ..Default::default()
        };
        let mut fault: Option<HarvestError> = None;

        for page in 1..=last_page {
            match self
                .process_page(&mut pager, &mut cursor, page, &base, &store, &aggregate, &mut summary)
                .await
            {
                Ok(()) => summary.pages_processed += 1,
                Err(err) => {
                    error!(page, "page loop fault: {}", err);
                    fault = Some(err);
                    break;
                }
            }
        }

        pager.close().await;

        if let Some(err) = fault {
            let _ = store.write_aggregate(&aggregate).await;
            return Err(err);
        }

        store.write_aggregate(&aggregate).await?;
        store.finalize(&aggregate).await?;
        info!(
            pages = summary.pages_processed,
            records = summary.records_harvested,
            failed = summary.items_failed,
            "harvest complete"
        );
        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_page(
        &self,
        pager: &mut PaginationController,
        cursor: &mut PageCursor,
        page: u32,
        base: &Url,
        store: &CheckpointStore,
        aggregate: &Aggregate,
        summary: &mut HarvestSummary,
    ) -> Result<(), HarvestError> {
        // Page 1 is the listing's initial state; navigation starts at 2.
        let navigated = if page == 1 {
            true
        } else {
            pager.navigate_to(cursor, page).await
        };

        // An unverified navigation means the listing may still show the
        // previous page; discovering links there would harvest it twice.
        let refs = if navigated {
            pager.discover_links(base).await
        } else {
            warn!(page, "navigation unverified; treating page as empty");
            Vec::new()
        };

        let _ = self
            .events
            .send(HarvestEvent::PageStarted {
                page,
                items: refs.len(),
            })
            .await;

        let expected = refs.len();
        let batch = run_batch(
            self.factory.as_ref(),
            self.extractor.clone(),
            page,
            refs,
            self.settings.workers,
            &self.events,
        )
        .await?;

        let harvested = batch.len();
        let failed = expected - harvested;
        summary.records_harvested += harvested;
        summary.items_failed += failed;

        store.write_batch(&batch)?;
        aggregate.append_batch(&batch).await;
        store.write_aggregate(aggregate).await?;

        let _ = self
            .events
            .send(HarvestEvent::PageCompleted {
                page,
                harvested,
                failed,
            })
            .await;
        info!(page, harvested, failed, "page checkpointed");
        Ok(())
    }
}
