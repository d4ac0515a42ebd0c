//! Al Jazeera English adapter.
//!
//! The listing comes from the site's GraphQL section query, which only
//! answers when the `wp-site: aje` header is present.

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

const NAME: &str = "aljazeera";
const LISTING_URL: &str = "https://www.aljazeera.com/graphql?wp-site=aje&operationName=ArchipelagoAjeSectionPostsQuery&variables=%7B%22category%22%3A%22news%22%2C%22categoryType%22%3A%22categories%22%2C%22postTypes%22%3A%5B%22blog%22%2C%22episode%22%2C%22opinion%22%2C%22post%22%2C%22video%22%2C%22external-article%22%2C%22gallery%22%2C%22podcast%22%2C%22longform%22%2C%22liveblog%22%5D%2C%22quantity%22%3A20%2C%22offset%22%3A0%7D&extensions=%7B%7D";
const BASE_URL: &str = "https://www.aljazeera.com";
const SITE_HEADER: (&str, &str) = ("wp-site", "aje");

#[derive(Debug, Deserialize)]
struct SectionResponse {
    data: SectionData,
}

#[derive(Debug, Deserialize)]
struct SectionData {
    #[serde(default)]
    articles: Vec<SectionArticle>,
}

#[derive(Debug, Deserialize)]
struct SectionArticle {
    #[serde(default)]
    link: String,
}

pub struct AlJazeeraAdapter {
    http: HttpFetcher,
    listing_url: String,
    base_url: Url,
    concurrency: usize,
}

impl AlJazeeraAdapter {
    pub fn new(http: HttpFetcher, config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            http,
            listing_url: config.listing_url.clone().unwrap_or_else(|| LISTING_URL.into()),
            base_url: parse_url(
                config.base_url.as_deref().unwrap_or(BASE_URL),
                "aljazeera base_url",
            )?,
            concurrency: config.effective_concurrency(),
        })
    }
}

#[async_trait]
impl SourceAdapter for AlJazeeraAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn concurrency(&self) -> usize {
        self.concurrency
    }

    async fn discover(&self) -> Result<Vec<String>> {
        let body = self
            .http
            .get_text(&self.listing_url, &[SITE_HEADER])
            .await
            .map_err(|e| NewsdeskError::discovery(NAME, e.to_string()))?;
        parse_listing(&body, &self.base_url)
            .map_err(|e| NewsdeskError::discovery(NAME, e.to_string()))
    }

    async fn fetch_detail(&self, id: &str) -> Result<ContentItem> {
        let html = self
            .http
            .get_text(id, &[SITE_HEADER])
            .await
            .map_err(|e| NewsdeskError::fetch(id, e.to_string()))?;
        parse_article(&html, id).map_err(|e| NewsdeskError::fetch(id, e.to_string()))
    }
}

pub(crate) fn parse_listing(json: &str, base: &Url) -> Result<Vec<String>> {
    let section: SectionResponse = serde_json::from_str(json)
        .map_err(|e| NewsdeskError::parse(format!("aljazeera section: {e}")))?;

    let links = section
        .data
        .articles
        .iter()
        .filter_map(|a| resolve_link(base, &a.link))
        .collect();
    Ok(unique_in_order(links))
}

pub(crate) fn parse_article(html: &str, url: &str) -> Result<ContentItem> {
    let doc = Html::parse_document(html);

    let mut item = ContentItem::new(NAME, url);
    item.headline = first_text(&doc, "main h1")?;
    item.body = joined_text(&doc, "main div.wysiwyg--all-content p")?;

    if let Some(ld) = article_json_ld(&doc)? {
        item.meta_description = json_str(&ld, "/description");
        item.image_link = json_str(&ld, "/image/0/url");
        item.published_at = to_rfc3339(&json_str(&ld, "/datePublished")).unwrap_or_default();
    }
    if item.published_at.is_empty() {
        item.published_at = now_rfc3339();
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsdesk_shared::SourceKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"{"data": {"articles": [
        {"id": "1", "title": "A", "link": "/news/2025/3/1/story-a"},
        {"id": "2", "title": "B", "link": "/news/2025/3/1/story-b"}
    ]}}"#;

    const ARTICLE: &str = r#"<html><head>
        <script type="application/ld+json">{
            "headline": "Story A",
            "description": "Summary of A.",
            "datePublished": "2025-03-01T12:00:00+03:00",
            "image": [{"url": "https://www.aljazeera.com/a.jpg", "height": 1, "width": 1}]
        }</script>
    </head><body><main>
        <h1>Story A</h1>
        <div class="wysiwyg wysiwyg--all-content"><p>Line one.</p><p>Line two.</p></div>
    </main></body></html>"#;

    #[test]
    fn listing_joins_links_to_base() {
        let base = Url::parse(BASE_URL).unwrap();
        let links = parse_listing(LISTING, &base).unwrap();
        assert_eq!(links[0], "https://www.aljazeera.com/news/2025/3/1/story-a");
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn listing_without_data_is_error() {
        let base = Url::parse(BASE_URL).unwrap();
        assert!(parse_listing(r#"{"errors": []}"#, &base).is_err());
    }

    #[test]
    fn article_reads_image_array() {
        let item = parse_article(ARTICLE, "https://www.aljazeera.com/news/2025/3/1/story-a").unwrap();
        assert_eq!(item.headline, "Story A");
        assert_eq!(item.body, "Line one.\nLine two.");
        assert_eq!(item.image_link, "https://www.aljazeera.com/a.jpg");
        assert_eq!(item.published_at, "2025-03-01T09:00:00Z");
    }

    #[tokio::test]
    async fn requests_carry_site_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/graphql"))
            .and(header("wp-site", "aje"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/news/2025/3/1/story-a"))
            .and(header("wp-site", "aje"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ARTICLE))
            .mount(&server)
            .await;

        let mut config = SourceConfig::new(SourceKind::Aljazeera);
        config.listing_url = Some(format!("{}/graphql", server.uri()));
        config.base_url = Some(server.uri());
        let http = HttpFetcher::new(&Default::default()).unwrap();
        let adapter = AlJazeeraAdapter::new(http, &config).unwrap();

        let ids = adapter.discover().await.unwrap();
        assert_eq!(ids.len(), 2);
        let item = adapter.fetch_detail(&ids[0]).await.unwrap();
        assert_eq!(item.meta_description, "Summary of A.");
    }
}
