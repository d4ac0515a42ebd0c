//! Reuters world section adapter.
//!
//! Discovery uses the site's Arc content API for the `/world/` collection.
//! Article pages sit behind bot protection, so a browser `cookie` (and usually
//! a browser `user-agent`) has to be supplied through the source's `headers`.

use async_trait::async_trait;
use newsdesk_shared::{ContentItem, NewsdeskError, Result, SourceConfig};
use scraper::Html;
use serde::Deserialize;
use url::Url;

use super::{
    SourceAdapter, article_json_ld, first_text, joined_text, json_str, now_rfc3339, parse_url,
    resolve_link, to_rfc3339, unique_in_order,
};
use crate::http::HttpFetcher;

const NAME: &str = "reuters";
const LISTING_URL: &str = "https://www.reuters.com/pf/api/v3/content/fetch/articles-by-section-alias-or-id-v1?query=%7B%22arc-site%22%3A%22reuters%22%2C%22fetch_type%22%3A%22collection%22%2C%22offset%22%3A0%2C%22section_id%22%3A%22%2Fworld%2F%22%2C%22size%22%3A20%2C%22uri%22%3A%22%2Fworld%2F%22%2C%22website%22%3A%22reuters%22%7D&_website=reuters";
const BASE_URL: &str = "https://www.reuters.com";
const LANGUAGE_HEADER: (&str, &str) = ("accept-language", "en-US,en;q=0.9");

/// Paragraph class names carry a build hash suffix (`__2-BtD`).
const PARAGRAPHS: &str = r#"article div[class*="article-body__paragraph"]"#;

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    result: CollectionResult,
}

#[derive(Debug, Deserialize)]
struct CollectionResult {
    #[serde(default)]
    articles: Vec<CollectionArticle>,
}

#[derive(Debug, Deserialize)]
struct CollectionArticle {
    #[serde(default)]
    canonical_url: String,
}

pub struct ReutersAdapter {
    http: HttpFetcher,
    listing_url: String,
    base_url: Url,
    concurrency: usize,
}

impl ReutersAdapter {
    pub fn new(http: HttpFetcher, config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            http,
            listing_url: config.listing_url.clone().unwrap_or_else(|| LISTING_URL.into()),
            base_url: parse_url(
                config.base_url.as_deref().unwrap_or(BASE_URL),
                "reuters base_url",
            )?,
            concurrency: config.effective_concurrency(),
        })
    }
}

#[async_trait]
impl SourceAdapter for ReutersAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }

    async fn discover(&self) -> Result<Vec<String>> {
        let body = self
            .http
            .get_text(&self.listing_url, &[])
            .await
            .map_err(|e| NewsdeskError::discovery(NAME, e.to_string()))?;
        parse_listing(&body, &self.base_url)
            .map_err(|e| NewsdeskError::discovery(NAME, e.to_string()))
    }

    async fn fetch_detail(&self, id: &str) -> Result<ContentItem> {
        let html = self
            .http
            .get_text(id, &[LANGUAGE_HEADER])
            .await
            .map_err(|e| NewsdeskError::fetch(id, e.to_string()))?;
        parse_article(&html, id).map_err(|e| NewsdeskError::fetch(id, e.to_string()))
    }
}

pub(crate) fn parse_listing(json: &str, base: &Url) -> Result<Vec<String>> {
    let collection: CollectionResponse = serde_json::from_str(json)
        .map_err(|e| NewsdeskError::parse(format!("reuters collection: {e}")))?;

    let links = collection
        .result
        .articles
        .iter()
        .filter_map(|a| resolve_link(base, &a.canonical_url))
        .collect();
    Ok(unique_in_order(links))
}

pub(crate) fn parse_article(html: &str, url: &str) -> Result<ContentItem> {
    let doc = Html::parse_document(html);

    let mut item = ContentItem::new(NAME, url);
    item.headline = first_text(&doc, "article h1")?;
    item.body = joined_text(&doc, PARAGRAPHS)?;

    if let Some(ld) = article_json_ld(&doc)? {
        item.meta_description = json_str(&ld, "/description");
        item.image_link = json_str(&ld, "/image/0");
        item.published_at = to_rfc3339(&json_str(&ld, "/datePublished")).unwrap_or_default();
    }
    if item.published_at.is_empty() {
        item.published_at = now_rfc3339();
    }
    Ok(item)
}
