//! CNN world section adapter.

use async_trait::async_trait;
use newsdesk_shared::{ContentItem, NewsdeskError, Result, SourceConfig};
use scraper::Html;
use url::Url;

use super::{
    SourceAdapter, first_attr, first_text, joined_text, now_rfc3339, parse_url, resolve_link,
    selector, unique_in_order,
};
use crate::http::HttpFetcher;

const NAME: &str = "cnn";
const LISTING_URL: &str = "https://edition.cnn.com/world";
const BASE_URL: &str = "https://edition.cnn.com";

/// Scrapes the CNN world front page and its article pages.
pub struct CnnAdapter {
    http: HttpFetcher,
    listing_url: String,
    base_url: Url,
    concurrency: usize,
}

impl CnnAdapter {
    pub fn new(http: HttpFetcher, config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            http,
            listing_url: config.listing_url.clone().unwrap_or_else(|| LISTING_URL.into()),
            base_url: parse_url(config.base_url.as_deref().unwrap_or(BASE_URL), "cnn base_url")?,
            concurrency: config.effective_concurrency(),
        })
    }
}

#[async_trait]
impl SourceAdapter for CnnAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }

    async fn discover(&self) -> Result<Vec<String>> {
        let html = self
            .http
            .get_text(&self.listing_url, &[])
            .await
            .map_err(|e| NewsdeskError::discovery(NAME, e.to_string()))?;
        parse_listing(&html, &self.base_url).map_err(|e| NewsdeskError::discovery(NAME, e.to_string()))
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

/// Article links from the world listing's story zones.
/// Interactive pages are skipped; duplicates collapse to the first occurrence.
pub(crate) fn parse_listing(html: &str, base: &Url) -> Result<Vec<String>> {
    let doc = Html::parse_document(html);
    let sel = selector("div.zone__items a[href]")?;

    let links = doc
        .select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| resolve_link(base, href))
        .filter(|link| !link.contains("/interactive"))
        .collect();

    Ok(unique_in_order(links))
}

/// CNN pages carry no machine-readable publish time, so the fetch time is used.
pub(crate) fn parse_article(html: &str, url: &str) -> Result<ContentItem> {
    let doc = Html::parse_document(html);

    let mut item = ContentItem::new(NAME, url);
    item.headline = first_text(&doc, "h1#maincontent")?;
    item.body = joined_text(&doc, "div.article__content p")?;
    item.meta_description = first_attr(&doc, r#"meta[name="description"]"#, "content")?;
    item.image_link = first_attr(&doc, r#"meta[property="og:image"]"#, "content")?;
    item.published_at = now_rfc3339();
    Ok(item)
}
