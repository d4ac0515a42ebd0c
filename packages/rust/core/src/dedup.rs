//! Dedup gate: drop candidate ids that are already persisted.

use std::collections::HashSet;

use newsdesk_shared::Result;
use newsdesk_storage::ContentStore;
use tracing::debug;

/// Return the candidates not yet in the store, in first-occurrence order.
///
/// Repeated candidates count once. An empty candidate list returns
/// immediately without touching the store; otherwise exactly one batched
/// existence query is issued.
pub async fn dedup(store: &dyn ContentStore, candidates: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::with_capacity(candidates.len());
    let unique: Vec<String> = candidates
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect();

    if unique.is_empty() {
        return Ok(Vec::new());
    }

    let existing = store.find_existing(&unique).await?;
    let fresh: Vec<String> = unique
        .into_iter()
        .filter(|id| !existing.contains(id))
        .collect();

    debug!(
        candidates = candidates.len(),
        existing = existing.len(),
        fresh = fresh.len(),
        "dedup complete"
    );
    Ok(fresh)
}
