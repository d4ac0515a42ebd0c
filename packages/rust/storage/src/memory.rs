//! In-memory [`ContentStore`] used by pipeline tests.
//!
//! Counts how often the pipeline touches the store and can inject a fault
//! partway through a batch, so callers can assert batching and atomicity.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use newsdesk_shared::{ContentItem, NewsdeskError, Result};
use uuid::Uuid;

use crate::store::{ContentStore, effective_limit};

#[derive(Default)]
struct State {
    items: BTreeMap<String, ContentItem>,
    runs: Vec<(String, Option<String>)>,
}

/// A [`ContentStore`] backed by a mutex-guarded map.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    existence_queries: AtomicUsize,
    transactions: AtomicUsize,
    /// Fail a batch once this many rows of it have been written.
    fail_after: Mutex<Option<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store, bypassing counters.
    pub fn with_items(items: impl IntoIterator<Item = ContentItem>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.lock() {
            for item in items {
                state.items.insert(item.id.clone(), item);
            }
        }
        store
    }

    /// Make every following batch fail after `writes` rows have been staged.
    pub fn fail_after(&self, writes: usize) {
        if let Ok(mut slot) = self.fail_after.lock() {
            *slot = Some(writes);
        }
    }

    /// Number of `find_existing` calls made so far.
    pub fn existence_queries(&self) -> usize {
        self.existence_queries.load(Ordering::SeqCst)
    }

    /// Number of transactions opened by `add_batch` so far.
    pub fn transactions(&self) -> usize {
        self.transactions.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &str) -> Option<ContentItem> {
        self.lock().ok().and_then(|s| s.items.get(id).cloned())
    }

    /// Finished run records as `(run_id, stats_json)`.
    pub fn runs(&self) -> Vec<(String, Option<String>)> {
        self.lock().map(|s| s.runs.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| NewsdeskError::Storage("memory store mutex poisoned".into()))
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn find_existing(&self, ids: &[String]) -> Result<HashSet<String>> {
        self.existence_queries.fetch_add(1, Ordering::SeqCst);
        let state = self.lock()?;
        Ok(ids
            .iter()
            .filter(|id| state.items.contains_key(id.as_str()))
            .cloned()
            .collect())
    }

    async fn add_batch(&self, items: &[ContentItem]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        self.transactions.fetch_add(1, Ordering::SeqCst);
        let fail_after = self.fail_after.lock().ok().and_then(|slot| *slot);

        let mut state = self.lock()?;
        let mut staged: BTreeMap<String, ContentItem> = BTreeMap::new();
        for item in items {
            if state.items.contains_key(&item.id) || staged.contains_key(&item.id) {
                continue;
            }
            if fail_after.is_some_and(|k| staged.len() >= k) {
                return Err(NewsdeskError::Storage(format!(
                    "injected fault after {} writes",
                    staged.len()
                )));
            }
            staged.insert(item.id.clone(), item.clone());
        }

        let inserted = staged.len();
        state.items.extend(staged);
        Ok(inserted)
    }

    async fn get_items(&self, category: &str, limit: usize) -> Result<Vec<ContentItem>> {
        let state = self.lock()?;
        let mut items: Vec<ContentItem> = state
            .items
            .values()
            .filter(|i| category.is_empty() || i.category == category)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.published_at
                .cmp(&a.published_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        items.truncate(effective_limit(limit));
        Ok(items)
    }

    async fn get_categories(&self) -> Result<BTreeSet<String>> {
        let state = self.lock()?;
        Ok(state.items.values().map(|i| i.category.clone()).collect())
    }

    async fn record_run_start(&self) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        self.lock()?.runs.push((id.clone(), None));
        Ok(id)
    }

    async fn record_run_finish(&self, run_id: &str, stats_json: &str) -> Result<()> {
        let mut state = self.lock()?;
        match state.runs.iter_mut().find(|(id, _)| id == run_id) {
            Some(run) => {
                run.1 = Some(stats_json.to_string());
                Ok(())
            }
            None => Err(NewsdeskError::Storage(format!("unknown run {run_id}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> ContentItem {
        let mut item = ContentItem::new("test", id);
        item.headline = format!("Headline {id}");
        item
    }

    #[tokio::test]
    async fn empty_batch_opens_no_transaction() {
        let store = MemoryStore::new();
        assert_eq!(store.add_batch(&[]).await.unwrap(), 0);
        assert_eq!(store.transactions(), 0);
    }

    #[tokio::test]
    async fn existing_ids_are_skipped_not_overwritten() {
        let mut original = item("https://a.test/1");
        original.summary = "kept".into();
        let store = MemoryStore::with_items([original]);

        let mut replacement = item("https://a.test/1");
        replacement.summary = "replaced".into();
        let inserted = store
            .add_batch(&[replacement, item("https://a.test/2")])
            .await
            .unwrap();

        assert_eq!(inserted, 1);
        assert_eq!(store.get("https://a.test/1").unwrap().summary, "kept");
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn injected_fault_leaves_nothing_behind() {
        let store = MemoryStore::new();
        store.fail_after(2);
        let batch: Vec<_> = (0..5).map(|i| item(&format!("https://a.test/{i}"))).collect();

        assert!(store.add_batch(&batch).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn find_existing_counts_one_query_per_call() {
        let store = MemoryStore::with_items([item("https://a.test/1")]);
        let ids = vec!["https://a.test/1".to_string(), "https://a.test/2".to_string()];

        let found = store.find_existing(&ids).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains("https://a.test/1"));
        assert_eq!(store.existence_queries(), 1);
    }

    #[tokio::test]
    async fn run_history_roundtrip() {
        let store = MemoryStore::new();
        let id = store.record_run_start().await.unwrap();
        store.record_run_finish(&id, "{}").await.unwrap();
        assert_eq!(store.runs(), vec![(id, Some("{}".to_string()))]);
        assert!(store.record_run_finish("missing", "{}").await.is_err());
    }
}
