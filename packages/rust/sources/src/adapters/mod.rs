//! Source adapter trait and the built-in publisher adapters.
//!
//! Each adapter knows how to list a publisher's latest articles and how to
//! turn one article page into a [`ContentItem`]. Parsing lives in pure
//! `parse_listing` / `parse_article` functions so it can be tested without
//! a network.

mod aljazeera;
mod bbc;
mod cnn;
mod guardian;
mod reuters;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use newsdesk_shared::{ContentItem, NewsdeskError, Result, canonical_id};
use scraper::{Html, Selector};
use url::Url;

pub use aljazeera::AlJazeeraAdapter;
pub use bbc::BbcAdapter;
pub use cnn::CnnAdapter;
pub use guardian::GuardianAdapter;
pub use reuters::ReutersAdapter;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// One publisher's discovery and extraction mechanics.
///
/// Adapters differ only in how they find and parse articles; the pipeline
/// treats them all the same way.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short source name, stored on every item (`cnn`, `bbc`, ...).
    fn name(&self) -> &str;

    /// Maximum number of concurrent detail fetches.
    fn concurrency(&self) -> usize;

    /// List candidate identifiers (canonical article URLs) in listing order.
    ///
    /// Fails with [`NewsdeskError::Discovery`].
    async fn discover(&self) -> Result<Vec<String>>;

    /// Fetch and extract a single article.
    ///
    /// Fails with [`NewsdeskError::Fetch`] for that identifier only.
    async fn fetch_detail(&self, id: &str) -> Result<ContentItem>;
}

// ---------------------------------------------------------------------------
// Shared extraction helpers
// ---------------------------------------------------------------------------

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| NewsdeskError::parse(format!("bad selector '{css}': {e}")))
}

/// Trimmed text of the first element matching `css`, or empty.
pub(crate) fn first_text(doc: &Html, css: &str) -> Result<String> {
    let sel = selector(css)?;
    Ok(doc
        .select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default())
}

/// Text of every element matching `css`, one element per line.
pub(crate) fn joined_text(doc: &Html, css: &str) -> Result<String> {
    let sel = selector(css)?;
    let parts: Vec<String> = doc
        .select(&sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    Ok(parts.join("\n"))
}

/// Value of `attr` on the first element matching `css`, or empty.
pub(crate) fn first_attr(doc: &Html, css: &str, attr: &str) -> Result<String> {
    let sel = selector(css)?;
    Ok(doc
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .next()
        .unwrap_or_default()
        .trim()
        .to_string())
}

/// The first JSON-LD object on the page that describes an article.
///
/// Blocks that fail to parse are skipped; top-level arrays are flattened.
pub(crate) fn article_json_ld(doc: &Html) -> Result<Option<serde_json::Value>> {
    let sel = selector(r#"script[type="application/ld+json"]"#)?;
    for el in doc.select(&sel) {
        let raw = el.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            tracing::debug!("skipping unparseable JSON-LD block");
            continue;
        };
        let candidates = match value {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };
        if let Some(found) = candidates
            .into_iter()
            .find(|v| v.get("datePublished").is_some() || v.get("description").is_some())
        {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Read a string at a JSON pointer, or empty.
pub(crate) fn json_str(value: &serde_json::Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Normalize a publisher timestamp to RFC 3339 in UTC.
///
/// Accepts RFC 3339 and the `+0100` offset style without a colon.
pub(crate) fn to_rfc3339(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()?;
    Some(
        parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Resolve `href` against `base` and return its canonical id.
/// Anchors and non-navigational schemes yield `None`.
pub(crate) fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
    {
        return None;
    }
    base.join(href).ok().map(|u| canonical_id(u.as_str()))
}

/// Drop repeated entries, keeping first occurrences in order.
pub(crate) fn unique_in_order(links: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    links
        .into_iter()
        .filter(|l| seen.insert(l.clone()))
        .collect()
}

pub(crate) fn parse_url(raw: &str, what: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| NewsdeskError::config(format!("invalid {what} '{raw}': {e}")))
}
