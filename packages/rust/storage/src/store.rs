//! The persistence seam used by the ingestion pipeline.

use std::collections::{BTreeSet, HashSet};

use async_trait::async_trait;
use newsdesk_shared::{ContentItem, Result};

/// Number of rows returned by [`ContentStore::get_items`] when `limit` is 0.
pub const DEFAULT_ITEM_LIMIT: usize = 20;

/// Idempotent, transactional store for content items.
///
/// Implementations must honour two contracts:
/// - [`find_existing`](Self::find_existing) answers in a single batched
///   query, however many ids are passed.
/// - [`add_batch`](Self::add_batch) is all-or-nothing. Ids that already
///   exist are skipped, never overwritten, and not counted.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Return the subset of `ids` that is already persisted.
    async fn find_existing(&self, ids: &[String]) -> Result<HashSet<String>>;

    /// Insert the new items of `items` in one transaction.
    /// Returns the number of rows actually inserted. An empty batch is a no-op.
    async fn add_batch(&self, items: &[ContentItem]) -> Result<usize>;

    /// Most recent items first. An empty `category` means all categories;
    /// a `limit` of 0 means [`DEFAULT_ITEM_LIMIT`].
    async fn get_items(&self, category: &str, limit: usize) -> Result<Vec<ContentItem>>;

    /// Distinct categories present in the store.
    async fn get_categories(&self) -> Result<BTreeSet<String>>;

    /// Open a run-history record. Returns its id.
    async fn record_run_start(&self) -> Result<String>;

    /// Close a run-history record with its JSON-encoded stats.
    async fn record_run_finish(&self, run_id: &str, stats_json: &str) -> Result<()>;
}

pub(crate) fn effective_limit(limit: usize) -> usize {
    if limit == 0 { DEFAULT_ITEM_LIMIT } else { limit }
}
