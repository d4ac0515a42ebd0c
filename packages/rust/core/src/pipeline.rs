//! End-to-end `sync` pipeline, one source at a time:
//! discover → dedup → fetch → normalize → enrich → persist.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use newsdesk_shared::{NewsdeskError, Result, SyncConfig, SyncStage, compute_hash};
use newsdesk_sources::SourceAdapter;
use newsdesk_storage::ContentStore;

use crate::dedup::dedup;
use crate::enrichment::{Summarizer, enrich_items};
use crate::fetch_pool::fetch_all;
use crate::normalize::normalize_all;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// How a source's run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    #[default]
    Completed,
    Failed { stage: SyncStage, error: String },
    /// Skipped because an earlier source failed under the abort policy.
    NotAttempted,
}

/// Per-source counts for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceReport {
    pub source: String,
    /// Candidate ids returned by discovery.
    pub discovered: usize,
    /// Ids left after dedup.
    pub deduped: usize,
    /// Complete items returned by the fetch pool.
    pub fetched: usize,
    pub enriched: usize,
    /// Rows actually written.
    pub inserted: usize,
    /// Ids whose detail fetch failed.
    pub fetch_failures: Vec<String>,
    pub status: SourceStatus,
}

impl SourceReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, SourceStatus::Failed { .. })
    }
}

/// Result of one `sync` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Run history id, when the store recorded one.
    pub run_id: Option<String>,
    pub sources: Vec<SourceReport>,
    pub elapsed_ms: u64,
}

impl SyncReport {
    pub fn total_inserted(&self) -> usize {
        self.sources.iter().map(|s| s.inserted).sum()
    }

    pub fn failed_sources(&self) -> Vec<&SourceReport> {
        self.sources.iter().filter(|s| s.is_failed()).collect()
    }

    /// True when no source failed.
    pub fn is_success(&self) -> bool {
        !self.sources.iter().any(SourceReport::is_failed)
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting sync status.
pub trait SyncProgress: Send + Sync {
    /// Called when a source enters a new stage.
    fn stage(&self, source: &str, stage: SyncStage);
    /// Called after each source, successful or not.
    fn source_finished(&self, report: &SourceReport);
    /// Called when the run completes.
    fn done(&self, report: &SyncReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl SyncProgress for SilentProgress {
    fn stage(&self, _source: &str, _stage: SyncStage) {}
    fn source_finished(&self, _report: &SourceReport) {}
    fn done(&self, _report: &SyncReport) {}
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives sources through the pipeline, one at a time.
pub struct Orchestrator {
    store: Arc<dyn ContentStore>,
    summarizer: Option<Arc<dyn Summarizer>>,
    config: SyncConfig,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ContentStore>, config: SyncConfig) -> Self {
        Self {
            store,
            summarizer: None,
            config,
        }
    }

    /// Attach the summarizer used when enrichment is enabled.
    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    fn active_summarizer(&self) -> Option<&dyn Summarizer> {
        if self.config.enrich {
            self.summarizer.as_deref()
        } else {
            None
        }
    }

    /// Run every source in order and report per-source counts.
    ///
    /// A fatal error (discovery, dedup or persistence) ends that source; by
    /// default the run moves on to the next one. With
    /// `abort_on_source_failure` the remaining sources are not attempted.
    /// Sources persisted before a failure stay committed.
    #[instrument(skip_all, fields(sources = sources.len()))]
    pub async fn run(
        &self,
        sources: &[Arc<dyn SourceAdapter>],
        progress: &dyn SyncProgress,
    ) -> SyncReport {
        let start = Instant::now();
        let mut report = SyncReport::default();

        match self.store.record_run_start().await {
            Ok(id) => report.run_id = Some(id),
            Err(e) => warn!(error = %e, "could not record sync run start"),
        }

        if self.config.enrich && self.summarizer.is_none() {
            info!("enrichment requested but no summarizer configured, skipping");
        } else if !self.config.enrich {
            info!("enrichment disabled for this run");
        }

        info!(run_id = ?report.run_id, "starting sync");

        let mut aborted = false;
        for adapter in sources {
            let mut source_report = SourceReport::new(adapter.name());

            if aborted {
                source_report.status = SourceStatus::NotAttempted;
                progress.source_finished(&source_report);
                report.sources.push(source_report);
                continue;
            }

            if let Err(e) = self.sync_source(adapter, &mut source_report, progress).await {
                let stage = e.stage().unwrap_or(SyncStage::Discovering);
                error!(source = adapter.name(), %stage, error = %e, "source failed");
                source_report.status = SourceStatus::Failed {
                    stage,
                    error: e.to_string(),
                };
                aborted = self.config.abort_on_source_failure;
            }

            progress.source_finished(&source_report);
            report.sources.push(source_report);
        }

        report.elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        if let Some(run_id) = &report.run_id {
            let finished = match serde_json::to_string(&report) {
                Ok(stats) => self.store.record_run_finish(run_id, &stats).await,
                Err(e) => Err(NewsdeskError::parse(format!("sync report: {e}"))),
            };
            if let Err(e) = finished {
                warn!(%run_id, error = %e, "could not record sync run finish");
            }
        }

        info!(
            inserted = report.total_inserted(),
            failed = report.failed_sources().len(),
            elapsed_ms = report.elapsed_ms,
            "sync complete"
        );
        progress.done(&report);
        report
    }

    /// One source through every stage. Fatal errors carry their stage.
    #[instrument(skip_all, fields(source = adapter.name()))]
    async fn sync_source(
        &self,
        adapter: &Arc<dyn SourceAdapter>,
        report: &mut SourceReport,
        progress: &dyn SyncProgress,
    ) -> Result<()> {
        let name = adapter.name();

        // --- Discovering ---
        progress.stage(name, SyncStage::Discovering);
        let candidates = adapter
            .discover()
            .await
            .map_err(|e| e.at_stage(name, SyncStage::Discovering))?;
        report.discovered = candidates.len();

        // --- Deduping ---
        progress.stage(name, SyncStage::Deduping);
        let fresh = dedup(self.store.as_ref(), &candidates)
            .await
            .map_err(|e| e.at_stage(name, SyncStage::Deduping))?;
        report.deduped = fresh.len();
        info!(discovered = report.discovered, fresh = report.deduped, "dedup complete");

        if fresh.is_empty() {
            return Ok(());
        }

        // --- Fetching ---
        progress.stage(name, SyncStage::Fetching);
        let outcome = fetch_all(Arc::clone(adapter), fresh).await;
        report.fetched = outcome.items.len();
        report.fetch_failures = outcome.failures.into_iter().map(|(id, _)| id).collect();

        // --- Normalizing ---
        progress.stage(name, SyncStage::Normalizing);
        let mut items = normalize_all(outcome.items);

        // --- Enriching ---
        if let Some(summarizer) = self.active_summarizer() {
            progress.stage(name, SyncStage::Enriching);
            report.enriched = enrich_items(summarizer, &mut items).await;
        }

        // --- Persisting ---
        progress.stage(name, SyncStage::Persisting);
        for item in &mut items {
            item.content_hash = compute_hash(&item.body);
        }
        report.inserted = self
            .store
            .add_batch(&items)
            .await
            .map_err(|e| e.at_stage(name, SyncStage::Persisting))?;

        info!(
            fetched = report.fetched,
            failures = report.fetch_failures.len(),
            enriched = report.enriched,
            inserted = report.inserted,
            "source complete"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use newsdesk_shared::ContentItem;
    use newsdesk_storage::MemoryStore;

    use crate::enrichment::Summary;

    /// Adapter with a fixed listing; ids in `failing` fail to fetch.
    struct TestSource {
        name: String,
        listing: Vec<String>,
        failing: HashSet<String>,
        discover_fails: bool,
        fetch_calls: Mutex<Vec<String>>,
    }

    impl TestSource {
        fn new(name: &str, listing: &[&str]) -> Self {
            Self {
                name: name.into(),
                listing: listing.iter().map(|id| url(id)).collect(),
                failing: HashSet::new(),
                discover_fails: false,
                fetch_calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, ids: &[&str]) -> Self {
            self.failing = ids.iter().map(|id| url(id)).collect();
            self
        }

        fn unreachable(mut self) -> Self {
            self.discover_fails = true;
            self
        }

        fn fetch_calls(&self) -> Vec<String> {
            self.fetch_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SourceAdapter for TestSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn concurrency(&self) -> usize {
            2
        }

        async fn discover(&self) -> Result<Vec<String>> {
            if self.discover_fails {
                return Err(NewsdeskError::discovery(&self.name, "HTTP 503"));
            }
            Ok(self.listing.clone())
        }

        async fn fetch_detail(&self, id: &str) -> Result<ContentItem> {
            self.fetch_calls.lock().unwrap().push(id.to_string());
            if self.failing.contains(id) {
                return Err(NewsdeskError::fetch(id, "HTTP 404"));
            }
            let mut item = ContentItem::new(&self.name, id);
            item.headline = format!("  Story   {id} ");
            item.body = "Para one.\n\n\nPara two.".into();
            item.published_at = "2025-01-10T12:00:00Z".into();
            Ok(item)
        }
    }

    /// Fails every call when `fail` is set, otherwise returns a fixed summary.
    struct TestSummarizer {
        fail: bool,
    }

    #[async_trait]
    impl Summarizer for TestSummarizer {
        async fn summarize(&self, _source: &str, headline: &str, _body: &str) -> Result<Summary> {
            if self.fail {
                return Err(NewsdeskError::Enrichment("request timed out".into()));
            }
            Ok(Summary {
                summary: format!("About {headline}"),
                key_points: vec!["one".into(), "two".into(), "three".into()],
                ..Default::default()
            })
        }
    }

    fn url(id: &str) -> String {
        format!("https://news.test/{id}")
    }

    fn stored(id: &str) -> ContentItem {
        let mut item = ContentItem::new("test", &url(id));
        item.headline = "Already here".into();
        item
    }

    fn config(enrich: bool, abort: bool) -> SyncConfig {
        SyncConfig {
            enrich,
            abort_on_source_failure: abort,
        }
    }

    fn as_sources(sources: &[Arc<TestSource>]) -> Vec<Arc<dyn SourceAdapter>> {
        sources
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn SourceAdapter>)
            .collect()
    }

    #[tokio::test]
    async fn partial_failures_still_persist_fetched_items() {
        let store = Arc::new(MemoryStore::with_items([stored("b")]));
        let source = Arc::new(TestSource::new("test", &["a", "b", "c"]).failing(&["c"]));
        let orchestrator = Orchestrator::new(store.clone(), config(true, false))
            .with_summarizer(Arc::new(TestSummarizer { fail: true }));

        let report = orchestrator
            .run(&as_sources(&[source.clone()]), &SilentProgress)
            .await;

        let r = &report.sources[0];
        assert_eq!(r.discovered, 3);
        assert_eq!(r.deduped, 2);
        assert_eq!(r.fetched, 1);
        assert_eq!(r.enriched, 0);
        assert_eq!(r.inserted, 1);
        assert_eq!(r.fetch_failures, vec![url("c")]);
        assert_eq!(r.status, SourceStatus::Completed);

        let a = store.get(&url("a")).expect("a persisted");
        assert!(!a.is_enriched());
        assert!(a.key_points.is_empty());
        assert_eq!(a.headline, format!("Story {}", url("a")));
        assert_eq!(a.body, "Para one.\nPara two.");
        assert!(!a.content_hash.is_empty());
        assert!(store.get(&url("c")).is_none());
        assert_eq!(store.get(&url("b")).unwrap().headline, "Already here");
    }

    #[tokio::test]
    async fn empty_discovery_touches_nothing() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(TestSource::new("empty", &[]));
        let orchestrator = Orchestrator::new(store.clone(), config(false, false));

        let report = orchestrator
            .run(&as_sources(&[source.clone()]), &SilentProgress)
            .await;

        assert_eq!(report.sources[0].inserted, 0);
        assert_eq!(store.existence_queries(), 0);
        assert_eq!(store.transactions(), 0);
        assert!(source.fetch_calls().is_empty());
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn repeated_listing_entry_is_fetched_once() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(TestSource::new("dup", &["x", "x"]));
        let orchestrator = Orchestrator::new(store.clone(), config(false, false));

        let report = orchestrator
            .run(&as_sources(&[source.clone()]), &SilentProgress)
            .await;

        assert_eq!(source.fetch_calls(), vec![url("x")]);
        assert_eq!(report.sources[0].inserted, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn rerun_inserts_nothing() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(TestSource::new("test", &["a", "b"]));
        let orchestrator = Orchestrator::new(store.clone(), config(false, false));
        let sources = as_sources(&[source.clone()]);

        let first = orchestrator.run(&sources, &SilentProgress).await;
        let second = orchestrator.run(&sources, &SilentProgress).await;

        assert_eq!(first.total_inserted(), 2);
        assert_eq!(second.total_inserted(), 0);
        assert_eq!(second.sources[0].deduped, 0);
        assert_eq!(source.fetch_calls().len(), 2);
    }

    #[tokio::test]
    async fn enrichment_fills_summary_fields() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(TestSource::new("test", &["a"]));
        let orchestrator = Orchestrator::new(store.clone(), config(true, false))
            .with_summarizer(Arc::new(TestSummarizer { fail: false }));

        let report = orchestrator
            .run(&as_sources(&[source]), &SilentProgress)
            .await;

        assert_eq!(report.sources[0].enriched, 1);
        let item = store.get(&url("a")).unwrap();
        assert!(item.is_enriched());
        assert!(item.summary.starts_with("About Story"));
        assert_eq!(item.key_points.len(), 3);
    }

    #[tokio::test]
    async fn disabled_enrichment_skips_summarizer() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(TestSource::new("test", &["a"]));
        let orchestrator = Orchestrator::new(store.clone(), config(false, false))
            .with_summarizer(Arc::new(TestSummarizer { fail: false }));

        let report = orchestrator
            .run(&as_sources(&[source]), &SilentProgress)
            .await;

        assert_eq!(report.sources[0].enriched, 0);
        assert!(store.get(&url("a")).unwrap().summary.is_empty());
    }

    #[tokio::test]
    async fn failed_source_does_not_stop_the_run_by_default() {
        let store = Arc::new(MemoryStore::new());
        let first = Arc::new(TestSource::new("first", &["a"]));
        let broken = Arc::new(TestSource::new("broken", &["b"]).unreachable());
        let last = Arc::new(TestSource::new("last", &["c"]));
        let orchestrator = Orchestrator::new(store.clone(), config(false, false));

        let report = orchestrator
            .run(&as_sources(&[first, broken, last]), &SilentProgress)
            .await;

        assert!(!report.is_success());
        assert_eq!(report.total_inserted(), 2);
        match &report.sources[1].status {
            SourceStatus::Failed { stage, error } => {
                assert_eq!(*stage, SyncStage::Discovering);
                assert!(error.contains("broken"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(report.sources[2].status, SourceStatus::Completed);
    }

    #[tokio::test]
    async fn abort_policy_stops_after_first_failure() {
        let store = Arc::new(MemoryStore::new());
        let first = Arc::new(TestSource::new("first", &["a"]));
        let broken = Arc::new(TestSource::new("broken", &["b"]).unreachable());
        let last = Arc::new(TestSource::new("last", &["c"]));
        let orchestrator = Orchestrator::new(store.clone(), config(false, true));

        let report = orchestrator
            .run(&as_sources(&[first, broken, last.clone()]), &SilentProgress)
            .await;

        // Earlier sources stay committed.
        assert!(store.get(&url("a")).is_some());
        assert_eq!(report.sources[2].status, SourceStatus::NotAttempted);
        assert!(last.fetch_calls().is_empty());
        assert_eq!(report.failed_sources().len(), 1);
    }

    #[tokio::test]
    async fn persistence_failure_rolls_back_the_batch() {
        let store = Arc::new(MemoryStore::new());
        store.fail_after(2);
        let source = Arc::new(TestSource::new("test", &["a", "b", "c", "d"]));
        let orchestrator = Orchestrator::new(store.clone(), config(false, false));

        let report = orchestrator
            .run(&as_sources(&[source]), &SilentProgress)
            .await;

        assert!(store.is_empty());
        assert_eq!(report.sources[0].inserted, 0);
        assert!(matches!(
            report.sources[0].status,
            SourceStatus::Failed {
                stage: SyncStage::Persisting,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn persisted_count_matches_successful_fetches() {
        let store = Arc::new(MemoryStore::new());
        let listing = ["1", "2", "3", "4", "5", "6", "7"];
        let source = Arc::new(TestSource::new("test", &listing).failing(&["2", "5", "6"]));
        let orchestrator = Orchestrator::new(store.clone(), config(false, false));

        let report = orchestrator
            .run(&as_sources(&[source]), &SilentProgress)
            .await;

        assert_eq!(report.sources[0].inserted, listing.len() - 3);
        assert_eq!(store.len(), listing.len() - 3);
        assert_eq!(store.transactions(), 1);
    }

    #[tokio::test]
    async fn run_is_recorded_in_history() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(TestSource::new("test", &["a"]));
        let orchestrator = Orchestrator::new(store.clone(), config(false, false));

        let report = orchestrator
            .run(&as_sources(&[source]), &SilentProgress)
            .await;

        let runs = store.runs();
        assert_eq!(runs.len(), 1);
        assert_eq!(Some(&runs[0].0), report.run_id.as_ref());
        let stats = runs[0].1.as_deref().expect("finished");
        assert!(stats.contains("\"inserted\":1"));
    }
}
