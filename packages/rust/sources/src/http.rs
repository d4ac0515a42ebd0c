//! Shared HTTP client for listing and article requests.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use newsdesk_shared::{HttpConfig, NewsdeskError, Result};

/// User-Agent string for outbound requests.
const USER_AGENT: &str = concat!("Newsdesk/", env!("CARGO_PKG_VERSION"));

/// Thin wrapper over a configured [`reqwest::Client`].
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    headers: HeaderMap,
}

impl HttpFetcher {
    /// Build a client honouring the `[http]` config section.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NewsdeskError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            headers: HeaderMap::new(),
        })
    }

    /// A fetcher that also sends `headers` on every request.
    ///
    /// The connection pool stays shared with `self`.
    pub fn with_headers(&self, headers: &BTreeMap<String, String>) -> Result<Self> {
        let mut map = self.headers.clone();
        for (name, value) in headers {
            let header = HeaderName::from_bytes(name.trim().as_bytes())
                .map_err(|e| NewsdeskError::config(format!("invalid header name '{name}': {e}")))?;
            let mut value = HeaderValue::from_str(value.trim())
                .map_err(|e| NewsdeskError::config(format!("invalid value for header '{name}': {e}")))?;
            if header == reqwest::header::COOKIE || header == reqwest::header::AUTHORIZATION {
                value.set_sensitive(true);
            }
            map.insert(header, value);
        }
        Ok(Self {
            client: self.client.clone(),
            headers: map,
        })
    }

    /// GET `url` with extra `headers` and return the body as text.
    /// Non-2xx statuses are errors.
    pub async fn get_text(&self, url: &str, headers: &[(&str, &str)]) -> Result<String> {
        debug!(url, "fetching");

        let mut request = self.client.get(url).headers(self.headers.clone());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NewsdeskError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsdeskError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| NewsdeskError::Network(format!("{url}: body read failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&HttpConfig::default()).expect("build client")
    }

    #[tokio::test]
    async fn get_text_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/listing"))
            .and(header("wp-site", "aje"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let body = fetcher()
            .get_text(&format!("{}/listing", server.uri()), &[("wp-site", "aje")])
            .await
            .expect("fetch");
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn non_success_status_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetcher()
            .get_text(&format!("{}/missing", server.uri()), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, NewsdeskError::Network(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn configured_headers_are_sent_on_every_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .and(header("cookie", "session=abc"))
            .and(header("user-agent", "Mozilla/5.0 test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(2)
            .mount(&server)
            .await;

        let headers = BTreeMap::from([
            ("cookie".to_string(), "session=abc".to_string()),
            ("User-Agent".to_string(), "Mozilla/5.0 test".to_string()),
        ]);
        let fetcher = fetcher().with_headers(&headers).expect("headers");
        let url = format!("{}/article", server.uri());
        fetcher.get_text(&url, &[]).await.expect("first fetch");
        fetcher.get_text(&url, &[]).await.expect("second fetch");
    }

    #[test]
    fn invalid_header_is_config_error() {
        let headers = BTreeMap::from([("bad header".to_string(), "x".to_string())]);
        let err = fetcher().with_headers(&headers).unwrap_err();
        assert!(matches!(err, NewsdeskError::Config { .. }));
    }
}
