//! Core domain types for Newsdesk content items.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Category assigned to items from the world-news listings.
pub const DEFAULT_CATEGORY: &str = "world";

// ---------------------------------------------------------------------------
// Item identity
// ---------------------------------------------------------------------------

/// Derive the stable item identifier from a source URL.
///
/// The identifier is the canonical URL string: surrounding whitespace is
/// trimmed and any fragment is dropped, so the same article URL always
/// yields the same id. Strings that do not parse as URLs are returned
/// trimmed.
pub fn canonical_id(raw: &str) -> String {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

/// Compute the SHA-256 hex digest of a piece of content.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// ContentItem
// ---------------------------------------------------------------------------

/// A single news article flowing through the ingestion pipeline.
///
/// Transient until persisted: the normalizer and enrichment stages mutate it
/// in place. Once written, an item is never updated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Canonical source URL; primary key and dedup key.
    pub id: String,
    pub source_name: String,
    pub category: String,
    pub headline: String,
    pub body: String,
    /// Enrichment-derived summary, empty until enrichment succeeds.
    #[serde(default)]
    pub summary: String,
    /// Enrichment-derived key points, in model order.
    #[serde(default)]
    pub key_points: Vec<String>,
    /// ISO-8601 timestamp string as reported by the publisher.
    pub published_at: String,
    #[serde(default)]
    pub image_link: String,
    pub source_link: String,
    #[serde(default)]
    pub meta_description: String,
    /// Comma-separated tags (categories from enrichment).
    #[serde(default)]
    pub meta_keywords: String,
    /// SHA-256 of the body, filled in just before persistence.
    #[serde(default)]
    pub content_hash: String,
}

impl ContentItem {
    /// Start an item for `url` from `source_name`, with the id derived from the URL.
    pub fn new(source_name: impl Into<String>, url: &str) -> Self {
        Self {
            id: canonical_id(url),
            source_name: source_name.into(),
            category: DEFAULT_CATEGORY.to_string(),
            source_link: url.trim().to_string(),
            ..Self::default()
        }
    }

    /// True when the fields required for persistence are present.
    pub fn is_complete(&self) -> bool {
        !self.id.trim().is_empty()
            && !self.headline.trim().is_empty()
            && !self.source_link.trim().is_empty()
    }

    /// True when enrichment has filled in a summary.
    pub fn is_enriched(&self) -> bool {
        !self.summary.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SyncStage
// ---------------------------------------------------------------------------

/// The per-source stages a sync run steps through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Discovering,
    Deduping,
    Fetching,
    Normalizing,
    Enriching,
    Persisting,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Discovering => "discovering",
            Self::Deduping => "deduping",
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Enriching => "enriching",
            Self::Persisting => "persisting",
        };
        f.write_str(name)
    }
}
