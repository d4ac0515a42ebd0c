//! The Guardian adapter.
//!
//! Discovery reads the "most read" world listing; article detail comes from
//! the same site's JSON API, which wraps the rendered page HTML. Items keep
//! the public `www.theguardian.com` URL as their id.

use async_trait::async_trait;
use newsdesk_shared::{ContentItem, NewsdeskError, Result, SourceConfig, canonical_id};
use scraper::Html;
use serde::Deserialize;
use url::Url;

use super::{
    SourceAdapter, first_attr, first_text, joined_text, parse_url, to_rfc3339, unique_in_order,
};
use crate::http::HttpFetcher;

const NAME: &str = "guardian";
const LISTING_URL: &str =
    "https://api.nextgen.guardianapps.co.uk/most-read/world.json?_edition=INT&dcr=true";
const API_BASE_URL: &str = "https://api.nextgen.guardianapps.co.uk";

#[derive(Debug, Deserialize)]
struct MostReadResponse {
    #[serde(default)]
    tabs: Vec<MostReadTab>,
}

#[derive(Debug, Deserialize)]
struct MostReadTab {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    trails: Vec<Trail>,
}

#[derive(Debug, Deserialize)]
struct Trail {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct ArticleResponse {
    #[serde(default)]
    config: ArticleConfig,
    #[serde(default)]
    html: String,
}

#[derive(Debug, Default, Deserialize)]
struct ArticleConfig {
    #[serde(default)]
    page: ArticlePage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArticlePage {
    #[serde(default)]
    is_live: bool,
}

pub struct GuardianAdapter {
    http: HttpFetcher,
    listing_url: String,
    api_base: Url,
    concurrency: usize,
}

impl GuardianAdapter {
    pub fn new(http: HttpFetcher, config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            http,
            listing_url: config.listing_url.clone().unwrap_or_else(|| LISTING_URL.into()),
            api_base: parse_url(
                config.base_url.as_deref().unwrap_or(API_BASE_URL),
                "guardian base_url",
            )?,
            concurrency: config.effective_concurrency(),
        })
    }

    /// JSON API location for a public article URL.
    fn api_url(&self, id: &str) -> Result<String> {
        let public = Url::parse(id).map_err(|e| NewsdeskError::parse(format!("{id}: {e}")))?;
        let mut api = self.api_base.clone();
        api.set_path(&format!("{}.json", public.path().trim_end_matches('/')));
        Ok(api.to_string())
    }
}

#[async_trait]
impl SourceAdapter for GuardianAdapter {
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
        parse_listing(&body).map_err(|e| NewsdeskError::discovery(NAME, e.to_string()))
    }

    async fn fetch_detail(&self, id: &str) -> Result<ContentItem> {
        let api_url = self
            .api_url(id)
            .map_err(|e| NewsdeskError::fetch(id, e.to_string()))?;
        let body = self
            .http
            .get_text(&api_url, &[])
            .await
            .map_err(|e| NewsdeskError::fetch(id, e.to_string()))?;
        parse_article(&body, id).map_err(|e| NewsdeskError::fetch(id, e.to_string()))
    }
}

/// Trail URLs from every tab except the cross-site "Across the guardian" one.
pub(crate) fn parse_listing(json: &str) -> Result<Vec<String>> {
    let most_read: MostReadResponse = serde_json::from_str(json)
        .map_err(|e| NewsdeskError::parse(format!("guardian most-read: {e}")))?;

    let links = most_read
        .tabs
        .iter()
        .filter(|tab| !tab.heading.contains("Across"))
        .flat_map(|tab| tab.trails.iter())
        .filter(|trail| !trail.url.trim().is_empty())
        .map(|trail| canonical_id(&trail.url))
        .collect();
    Ok(unique_in_order(links))
}

/// Live blogs are rejected; they never settle into a single article.
pub(crate) fn parse_article(json: &str, url: &str) -> Result<ContentItem> {
    let article: ArticleResponse = serde_json::from_str(json)
        .map_err(|e| NewsdeskError::parse(format!("guardian article: {e}")))?;
    if article.config.page.is_live {
        return Err(NewsdeskError::validation("live article skipped"));
    }

    let doc = Html::parse_document(&article.html);

    let mut item = ContentItem::new(NAME, url);
    item.headline = first_text(&doc, "h1.content__headline")?;
    item.image_link = first_attr(&doc, "img.maxed", "src")?;
    item.meta_description = first_attr(&doc, r#"meta[itemprop="description"]"#, "content")?;
    item.body = joined_text(&doc, "div.content__article-body p")?;

    let published = first_attr(&doc, r#"time[itemprop="datePublished"]"#, "datetime")?;
    item.published_at = to_rfc3339(&published)
        .ok_or_else(|| NewsdeskError::parse(format!("unparseable publish time '{published}'")))?;
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsdesk_shared::SourceKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"{"tabs": [
        {"heading": "Most viewed in World news", "trails": [
            {"url": "https://www.theguardian.com/world/2024/oct/21/new-zealand-story"},
            {"url": "https://www.theguardian.com/world/2024/oct/21/second-story"}
        ]},
        {"heading": "Across the guardian", "trails": [
            {"url": "https://www.theguardian.com/sport/2024/oct/21/elsewhere"}
        ]}
    ]}"#;

    fn article_json(is_live: bool) -> String {
        let html = r#"<div>
            <h1 class="content__headline" itemprop="headline"> New Zealand votes </h1>
            <img class="maxed responsive-img" src="https://i.guim.co.uk/a.jpg">
            <meta itemprop="description" content="Voters head out.">
            <time itemprop="datePublished" datetime="2024-10-21T05:44:23+0100">Mon 21 Oct 2024</time>
            <div class="content__article-body"><p>Polls opened.</p><p>Turnout high.</p></div>
        </div>"#;
        serde_json::json!({"config": {"page": {"isLive": is_live}}, "html": html}).to_string()
    }

    #[test]
    fn listing_skips_across_tab() {
        let links = parse_listing(LISTING).unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.contains("/world/")));
    }

    #[test]
    fn article_parses_embedded_html() {
        let url = "https://www.theguardian.com/world/2024/oct/21/new-zealand-story";
        let item = parse_article(&article_json(false), url).unwrap();
        assert_eq!(item.id, url);
        assert_eq!(item.headline, "New Zealand votes");
        assert_eq!(item.image_link, "https://i.guim.co.uk/a.jpg");
        assert_eq!(item.meta_description, "Voters head out.");
        assert_eq!(item.published_at, "2024-10-21T04:44:23Z");
        assert_eq!(item.body, "Polls opened.\nTurnout high.");
    }

    #[test]
    fn live_articles_are_rejected() {
        let err = parse_article(&article_json(true), "https://www.theguardian.com/x").unwrap_err();
        assert!(err.to_string().contains("live"));
    }

    #[tokio::test]
    async fn fetch_detail_uses_json_api_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/world/2024/oct/21/new-zealand-story.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(article_json(false)))
            .mount(&server)
            .await;

        let mut config = SourceConfig::new(SourceKind::Guardian);
        config.base_url = Some(server.uri());
        let http = HttpFetcher::new(&Default::default()).unwrap();
        let adapter = GuardianAdapter::new(http, &config).unwrap();

        let item = adapter
            .fetch_detail("https://www.theguardian.com/world/2024/oct/21/new-zealand-story")
            .await
            .unwrap();
        assert_eq!(item.source_link, "https://www.theguardian.com/world/2024/oct/21/new-zealand-story");
        assert_eq!(item.headline, "New Zealand votes");
    }
}
