//! Bounded-concurrency detail fetching for one source.

use std::collections::HashMap;
use std::sync::Arc;

use newsdesk_shared::{ContentItem, NewsdeskError};
use newsdesk_sources::SourceAdapter;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

/// What the pool produced for one source.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Complete items, in completion order.
    pub items: Vec<ContentItem>,
    /// `(id, error)` for every id that produced no usable item.
    pub failures: Vec<(String, NewsdeskError)>,
}

/// Fetch every id through `adapter`, at most `adapter.concurrency()` at a time.
///
/// Failures are isolated per id: a failed fetch, an incomplete item, or a
/// panicking task drops that id and the rest continue. There is no retry.
#[instrument(skip_all, fields(source = adapter.name(), ids = ids.len()))]
pub async fn fetch_all(adapter: Arc<dyn SourceAdapter>, ids: Vec<String>) -> FetchOutcome {
    let mut outcome = FetchOutcome::default();
    if ids.is_empty() {
        return outcome;
    }

    let semaphore = Arc::new(Semaphore::new(adapter.concurrency().max(1)));
    let mut tasks = JoinSet::new();
    let mut pending = HashMap::with_capacity(ids.len());

    for id in ids {
        let adapter = Arc::clone(&adapter);
        let semaphore = Arc::clone(&semaphore);
        let task_id = id.clone();
        let handle = tasks.spawn(async move {
            match semaphore.acquire_owned().await {
                Ok(_permit) => fetch_one(adapter.as_ref(), &task_id).await,
                Err(e) => Err(NewsdeskError::fetch(&task_id, format!("fetch pool closed: {e}"))),
            }
        });
        pending.insert(handle.id(), id);
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((task, Ok(item))) => {
                pending.remove(&task);
                debug!(id = %item.id, "fetched");
                outcome.items.push(item);
            }
            Ok((task, Err(e))) => {
                let id = pending.remove(&task).unwrap_or_default();
                warn!(id = %id, error = %e, "fetch failed, item dropped");
                outcome.failures.push((id, e));
            }
            Err(e) => {
                let id = pending.remove(&e.id()).unwrap_or_default();
                warn!(id = %id, error = %e, "fetch task aborted, item dropped");
                let err = NewsdeskError::fetch(&id, e.to_string());
                outcome.failures.push((id, err));
            }
        }
    }

    outcome
}

async fn fetch_one(adapter: &dyn SourceAdapter, id: &str) -> newsdesk_shared::Result<ContentItem> {
    let item = adapter.fetch_detail(id).await?;
    if !item.is_complete() {
        return Err(NewsdeskError::fetch(
            id,
            "incomplete item (missing id, headline or source link)",
        ));
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use newsdesk_shared::Result;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Fails ids in `failing`, returns a headline-less item for ids in
    /// `incomplete`, panics on ids in `panicking`, and tracks peak parallelism.
    struct ScriptedAdapter {
        concurrency: usize,
        failing: HashSet<String>,
        incomplete: HashSet<String>,
        panicking: HashSet<String>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedAdapter {
        fn new(concurrency: usize) -> Self {
            Self {
                concurrency,
                failing: HashSet::new(),
                incomplete: HashSet::new(),
                panicking: HashSet::new(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn name(&self) -> &str {
            "scripted"
        }

        fn concurrency(&self) -> usize {
            self.concurrency
        }

        async fn discover(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn fetch_detail(&self, id: &str) -> Result<ContentItem> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.panicking.contains(id) {
                panic!("scripted panic for {id}");
            }
            if self.failing.contains(id) {
                return Err(NewsdeskError::fetch(id, "HTTP 500"));
            }
            let mut item = ContentItem::new("scripted", id);
            if !self.incomplete.contains(id) {
                item.headline = format!("Headline {id}");
            }
            Ok(item)
        }
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://x.test/{i}")).collect()
    }

    #[tokio::test]
    async fn respects_concurrency_limit() {
        let adapter = Arc::new(ScriptedAdapter::new(2));
        let outcome = fetch_all(adapter.clone(), ids(8)).await;

        assert_eq!(outcome.items.len(), 8);
        assert!(outcome.failures.is_empty());
        assert!(adapter.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn zero_concurrency_is_treated_as_one() {
        let adapter = Arc::new(ScriptedAdapter::new(0));
        let outcome = fetch_all(adapter.clone(), ids(3)).await;
        assert_eq!(outcome.items.len(), 3);
        assert_eq!(adapter.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let all = ids(5);
        let mut adapter = ScriptedAdapter::new(2);
        adapter.failing.insert(all[1].clone());
        adapter.incomplete.insert(all[3].clone());

        let outcome = fetch_all(Arc::new(adapter), all.clone()).await;

        assert_eq!(outcome.items.len(), 3);
        assert!(outcome.items.iter().all(|i| i.is_complete()));
        let failed: HashSet<_> = outcome.failures.iter().map(|(id, _)| id.clone()).collect();
        assert!(failed.contains(&all[1]));
        assert!(failed.contains(&all[3]));
    }

    #[tokio::test]
    async fn panicking_fetch_counts_as_failure() {
        let all = ids(3);
        let mut adapter = ScriptedAdapter::new(1);
        adapter.panicking.insert(all[0].clone());

        let outcome = fetch_all(Arc::new(adapter), all.clone()).await;
        assert_eq!(outcome.items.len(), 2);
        assert_eq!(outcome.failures.len(), 1);

        let (id, err) = &outcome.failures[0];
        assert_eq!(id, &all[0]);
        assert!(matches!(err, NewsdeskError::Fetch { id: failed, .. } if failed == &all[0]));
    }

    #[tokio::test]
    async fn empty_input_fetches_nothing() {
        let adapter = Arc::new(ScriptedAdapter::new(2));
        let outcome = fetch_all(adapter.clone(), Vec::new()).await;
        assert!(outcome.items.is_empty());
        assert_eq!(adapter.peak.load(Ordering::SeqCst), 0);
    }
}
