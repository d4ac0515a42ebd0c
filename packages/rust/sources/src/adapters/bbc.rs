//! BBC News adapter: JSON content collection for discovery, HTML + JSON-LD for articles.

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

const NAME: &str = "bbc";
const LISTING_URL: &str = "https://web-cdn.api.bbci.co.uk/xd/content-collection/07cedf01-f642-4b92-821f-d7b324b8ba73?page=0&size=20";
const BASE_URL: &str = "https://www.bbc.com";

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    #[serde(default)]
    data: Vec<CollectionEntry>,
}

#[derive(Debug, Deserialize)]
struct CollectionEntry {
    #[serde(default)]
    path: String,
}

pub struct BbcAdapter {
    http: HttpFetcher,
    listing_url: String,
    base_url: Url,
    concurrency: usize,
}

impl BbcAdapter {
    pub fn new(http: HttpFetcher, config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            http,
            listing_url: config.listing_url.clone().unwrap_or_else(|| LISTING_URL.into()),
            base_url: parse_url(config.base_url.as_deref().unwrap_or(BASE_URL), "bbc base_url")?,
            concurrency: config.effective_concurrency(),
        })
    }
}

#[async_trait]
impl SourceAdapter for BbcAdapter {
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
            .get_text(id, &[])
            .await
            .map_err(|e| NewsdeskError::fetch(id, e.to_string()))?;
        parse_article(&html, id).map_err(|e| NewsdeskError::fetch(id, e.to_string()))
    }
}

pub(crate) fn parse_listing(json: &str, base: &Url) -> Result<Vec<String>> {
    let collection: CollectionResponse = serde_json::from_str(json)
        .map_err(|e| NewsdeskError::parse(format!("bbc collection: {e}")))?;

    let links = collection
        .data
        .iter()
        .map(|entry| entry.path.as_str())
        .filter(|p| !p.contains("/videos/"))
        .filter_map(|p| resolve_link(base, p))
        .collect();
    Ok(unique_in_order(links))
}

pub(crate) fn parse_article(html: &str, url: &str) -> Result<ContentItem> {
    let doc = Html::parse_document(html);

    let mut item = ContentItem::new(NAME, url);
    item.headline = first_text(&doc, "article h1")?;
    item.body = joined_text(&doc, r#"article div[data-component="text-block"]"#)?;

    if let Some(ld) = article_json_ld(&doc)? {
        item.meta_description = json_str(&ld, "/description");
        item.image_link = json_str(&ld, "/image/url");
        item.published_at = to_rfc3339(&json_str(&ld, "/datePublished")).unwrap_or_default();
    }
    if item.published_at.is_empty() {
        item.published_at = now_rfc3339();
    }
    Ok(item)
}
