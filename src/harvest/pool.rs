//! Worker pool coordinator: fan one page's references out to N sessions.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::{worker::run_worker, HarvestEvent, WorkQueue};
use crate::error::{ConfigError, HarvestError, SessionError};
use crate::extract::RecordExtractor;
use crate::models::{Batch, ItemReference};
use crate::session::SessionFactory;

/// Run one page batch to completion and return the merged records.
///
/// The effective worker count is `min(workers, refs.len())`, at least 1;
/// `workers == 0` is a contract violation. Sessions are created up
/// front, one per worker, and every created session is closed after all
/// workers have exited, including when a worker task fails. The batch
/// never holds more records than it was given references.
pub async fn run_batch(
    factory: &dyn SessionFactory,
    extractor: Arc<dyn RecordExtractor>,
    page_number: u32,
    refs: Vec<ItemReference>,
    workers: usize,
    events: &mpsc::Sender<HarvestEvent>,
) -> Result<Batch, HarvestError> {
    if workers == 0 {
        return Err(ConfigError::ZeroWorkers.into());
    }

    let mut batch = Batch::new(page_number);
    if refs.is_empty() {
        return Ok(batch);
    }

    let effective = workers.min(refs.len());
    let total = refs.len();
    let queue = Arc::new(WorkQueue::from_refs(refs));
    let sink = Arc::new(Mutex::new(Vec::with_capacity(total)));

    // Sessions are the expensive resource; never more than the worker
    // count. A creation failure degrades the pool rather than failing
    // the batch.
    let mut sessions = Vec::with_capacity(effective);
    for id in 0..effective {
        match factory.create().await {
            Ok(session) => sessions.push(Arc::new(Mutex::new(session))),
            Err(err) => warn!(worker = id, "session creation failed, pool degraded: {}", err),
        }
    }
    if sessions.is_empty() {
        return Err(HarvestError::Session(SessionError::Backend(
            "no session could be created for the batch".to_string(),
        )));
    }

    info!(
        page = page_number,
        items = total,
        workers = sessions.len(),
        "starting batch"
    );

    let mut handles = Vec::with_capacity(sessions.len());
    for (id, session) in sessions.iter().enumerate() {
        handles.push(tokio::spawn(run_worker(
            id,
            session.clone(),
            queue.clone(),
            extractor.clone(),
            sink.clone(),
            events.clone(),
        )));
    }

    for (id, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(produced) => debug!(worker = id, produced, "worker drained the queue"),
            Err(err) => warn!(worker = id, "worker task failed: {}", err),
        }
    }

    // Unconditional teardown: every session we created gets closed,
    // whether its worker finished cleanly or not.
    for session in &sessions {
        let mut guard = session.lock().await;
        if let Err(err) = guard.close().await {
            debug!("session close failed: {}", err);
        }
    }

    batch.records = std::mem::take(&mut *sink.lock().await);
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::ExtractError;
    use crate::models::Record;
    use crate::session::{ElementHandle, Locator, PageSession};

    struct NoopSession;

    #[async_trait]
    impl PageSession for NoopSession {
        async fn open(&mut self, _url: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn find_one(
            &self,
            _locator: &Locator,
        ) -> Result<Option<Box<dyn ElementHandle>>, SessionError> {
            Ok(None)
        }

        async fn find_all(
            &self,
            _locator: &Locator,
        ) -> Result<Vec<Box<dyn ElementHandle>>, SessionError> {
            Ok(Vec::new())
        }

        async fn execute_script(&self, _code: &str) -> Result<serde_json::Value, SessionError> {
            Ok(serde_json::Value::Null)
        }

        async fn press_key(&self, _key: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    /// Counts sessions handed out; optionally fails every creation.
    struct CountingFactory {
        created: AtomicUsize,
        fail: bool,
    }

    impl CountingFactory {
        fn new() -> Self {
            Self {
                created: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                created: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl SessionFactory for CountingFactory {
        async fn create(&self) -> Result<Box<dyn PageSession>, SessionError> {
            if self.fail {
                return Err(SessionError::Backend("refused".to_string()));
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NoopSession))
        }
    }

    /// Succeeds for every url except "broken" (item failure) and
    /// "dead" (session failure).
    struct StubExtractor;

    #[async_trait]
    impl RecordExtractor for StubExtractor {
        async fn extract(
            &self,
            _session: &mut dyn PageSession,
            item: &crate::models::ItemReference,
        ) -> Result<Record, ExtractError> {
            if item.url().contains("broken") {
                return Err(ExtractError::ItemUnavailable("no title".to_string()));
            }
            if item.url().contains("dead") {
                return Err(ExtractError::Session(SessionError::Closed));
            }
            Ok(Record::new("title", item.url()))
        }
    }

    fn refs(urls: &[&str]) -> Vec<ItemReference> {
        urls.iter().map(|url| ItemReference::new(*url)).collect()
    }

    fn drained_events() -> mpsc::Sender<HarvestEvent> {
        // Receiver dropped on purpose; sends fail fast and are ignored.
        let (tx, _rx) = mpsc::channel(16);
        tx
    }

    #[tokio::test]
    async fn worker_count_clamps_to_reference_count() {
        let factory = CountingFactory::new();
        let batch = run_batch(
            &factory,
            Arc::new(StubExtractor),
            1,
            refs(&["https://x/1", "https://x/2", "https://x/3"]),
            10,
            &drained_events(),
        )
        .await
        .unwrap();

        assert_eq!(factory.created.load(Ordering::SeqCst), 3);
        assert_eq!(batch.len(), 3);
    }

    #[tokio::test]
    async fn zero_workers_is_a_config_error() {
        let factory = CountingFactory::new();
        let result = run_batch(
            &factory,
            Arc::new(StubExtractor),
            1,
            refs(&["https://x/1"]),
            0,
            &drained_events(),
        )
        .await;

        assert!(matches!(
            result,
            Err(HarvestError::Config(ConfigError::ZeroWorkers))
        ));
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_reference_list_creates_no_sessions() {
        let factory = CountingFactory::new();
        let batch = run_batch(
            &factory,
            Arc::new(StubExtractor),
            7,
            Vec::new(),
            4,
            &drained_events(),
        )
        .await
        .unwrap();

        assert!(batch.is_empty());
        assert_eq!(batch.page_number, 7);
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_items_are_dropped_from_the_batch() {
        let factory = CountingFactory::new();
        let batch = run_batch(
            &factory,
            Arc::new(StubExtractor),
            2,
            refs(&["https://x/1", "https://x/broken", "https://x/3"]),
            2,
            &drained_events(),
        )
        .await
        .unwrap();

        assert_eq!(batch.len(), 2);
        let urls: Vec<&str> = batch.records.iter().map(|r| r.source_url.as_str()).collect();
        assert!(!urls.contains(&"https://x/broken"));
    }

    #[tokio::test]
    async fn dead_session_ends_only_that_worker() {
        let factory = CountingFactory::new();
        let batch = run_batch(
            &factory,
            Arc::new(StubExtractor),
            1,
            refs(&["https://x/dead", "https://x/1", "https://x/2", "https://x/3"]),
            2,
            &drained_events(),
        )
        .await
        .unwrap();

        // The worker that drew the dead item exits; its peer drains the
        // rest of the queue.
        assert_eq!(batch.len(), 3);
    }

    #[tokio::test]
    async fn batch_fails_when_no_session_can_be_created() {
        let factory = CountingFactory::failing();
        let result = run_batch(
            &factory,
            Arc::new(StubExtractor),
            1,
            refs(&["https://x/1"]),
            2,
            &drained_events(),
        )
        .await;

        assert!(matches!(result, Err(HarvestError::Session(_))));
    }

    #[tokio::test]
    async fn batch_records_never_exceed_references() {
        let factory = CountingFactory::new();
        let urls: Vec<String> = (0..25).map(|i| format!("https://x/{i}")).collect();
        let items: Vec<ItemReference> = urls.iter().map(|url| ItemReference::new(url.clone())).collect();

        let batch = run_batch(
            &factory,
            Arc::new(StubExtractor),
            3,
            items,
            4,
            &drained_events(),
        )
        .await
        .unwrap();

        assert!(batch.len() <= 25);
        for record in &batch.records {
            assert!(urls.contains(&record.source_url));
            assert!(!record.source_url.is_empty());
        }
        assert_eq!(factory.created.load(Ordering::SeqCst), 4);
    }
}
