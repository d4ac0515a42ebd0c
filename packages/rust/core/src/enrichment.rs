//! Item summarization through an OpenAI-compatible chat completions API.
//!
//! Architecture:
//! ```text
//! Orchestrator ──(per item)──► Summarizer::summarize ──HTTP──► /chat/completions
//!               ◄── Summary ───┘                      ◄─ json_schema ─┘
//! ```
//!
//! Summarization is best effort: a failed or malformed response leaves the
//! item's enrichment fields empty and the item is still persisted.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use newsdesk_shared::{ContentItem, EnrichmentConfig, NewsdeskError, Result};

/// Characters of article body sent to the model.
pub const MAX_STORY_CHARS: usize = 12_000;
/// Distinct key points an answer must carry to be accepted.
pub const MIN_KEY_POINTS: usize = 3;
/// Key points kept per item.
pub const MAX_KEY_POINTS: usize = 5;

const SYSTEM_PROMPT: &str = "\
You summarize international news articles for journalists.
Write in a neutral, factual register and never add information that is not in the story.

Return JSON with:
- metadata.source: the full publication name
- metadata.categories: primary and secondary topic tags, most specific first
- metadata.verificationStatus: one of VERIFIED, DEVELOPING, UNVERIFIED, DISPUTED
- summary: a concise summary of the story, opening with the main event
- key_points: three to five short statements of the most important facts";

// ---------------------------------------------------------------------------
// Summary model
// ---------------------------------------------------------------------------

/// How settled the reported facts are, as judged by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Verified,
    #[default]
    #[serde(alias = "PENDING")]
    Developing,
    Unverified,
    Disputed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetadata {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub verification_status: VerificationStatus,
}

/// The structured answer for one article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub metadata: SummaryMetadata,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

impl Summary {
    /// Parse model output, rejecting answers with no usable content.
    pub fn from_model_output(raw: &str) -> Result<Self> {
        let summary: Summary = serde_json::from_str(raw.trim())
            .map_err(|e| NewsdeskError::Enrichment(format!("malformed summary JSON: {e}")))?;
        if summary.summary.trim().is_empty() {
            return Err(NewsdeskError::Enrichment("summary is empty".into()));
        }
        let distinct: HashSet<&str> = summary
            .key_points
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();
        if distinct.len() < MIN_KEY_POINTS {
            return Err(NewsdeskError::Enrichment(format!(
                "expected at least {MIN_KEY_POINTS} key points, got {}",
                distinct.len()
            )));
        }
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Summarizer seam
// ---------------------------------------------------------------------------

/// Produces a [`Summary`] for one article.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, source_name: &str, headline: &str, body: &str) -> Result<Summary>;
}

/// [`Summarizer`] backed by `POST {base_url}/chat/completions`.
pub struct ChatCompletionsSummarizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsSummarizer {
    pub fn new(config: &EnrichmentConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NewsdeskError::Enrichment(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            model: config.model.clone(),
        })
    }

    fn request_body(&self, source_name: &str, headline: &str, body: &str) -> serde_json::Value {
        let story = truncate_content(body, MAX_STORY_CHARS);
        json!({
            "model": self.model,
            "temperature": 0.0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {
                    "role": "user",
                    "content": format!("Source: {source_name}\nHeadline: {headline}\nStory: {story}"),
                },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": "article_summary",
                    "strict": false,
                    "schema": response_schema(),
                },
            },
        })
    }
}

#[async_trait]
impl Summarizer for ChatCompletionsSummarizer {
    async fn summarize(&self, source_name: &str, headline: &str, body: &str) -> Result<Summary> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(source_name, headline, body))
            .send()
            .await
            .map_err(|e| NewsdeskError::Enrichment(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsdeskError::Enrichment(format!("HTTP {status}")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| NewsdeskError::Enrichment(format!("invalid completion response: {e}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| NewsdeskError::Enrichment("completion has no content".into()))?;

        Summary::from_model_output(&content)
    }
}

fn response_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "required": ["metadata", "summary", "key_points"],
        "properties": {
            "metadata": {
                "type": "object",
                "required": ["source", "categories", "verificationStatus"],
                "properties": {
                    "source": {"type": "string"},
                    "categories": {"type": "array", "items": {"type": "string"}},
                    "verificationStatus": {
                        "type": "string",
                        "enum": ["VERIFIED", "DEVELOPING", "UNVERIFIED", "DISPUTED"],
                    },
                },
            },
            "summary": {"type": "string"},
            "key_points": {"type": "array", "items": {"type": "string"}},
        },
    })
}

// ---------------------------------------------------------------------------
// Applying summaries
// ---------------------------------------------------------------------------

/// Copy a summary onto an item.
///
/// Key points are trimmed, de-duplicated and capped at [`MAX_KEY_POINTS`].
/// Categories become the comma-separated `meta_keywords`; the item's
/// `category` is left alone.
pub fn apply_summary(item: &mut ContentItem, summary: Summary) {
    item.summary = summary.summary.trim().to_string();

    let mut points: Vec<String> = Vec::with_capacity(MAX_KEY_POINTS);
    for point in summary.key_points {
        let point = point.trim();
        if point.is_empty() || points.iter().any(|p| p == point) {
            continue;
        }
        points.push(point.to_string());
        if points.len() == MAX_KEY_POINTS {
            break;
        }
    }
    item.key_points = points;

    let categories: Vec<&str> = summary
        .metadata
        .categories
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    if !categories.is_empty() {
        item.meta_keywords = categories.join(", ");
    }
}

/// Summarize items one at a time. Returns how many were enriched.
///
/// Failures are logged and leave that item's enrichment fields untouched.
#[instrument(skip_all, fields(items = items.len()))]
pub async fn enrich_items(summarizer: &dyn Summarizer, items: &mut [ContentItem]) -> usize {
    let mut enriched = 0;

    for item in items.iter_mut() {
        match summarizer
            .summarize(&item.source_name, &item.headline, &item.body)
            .await
        {
            Ok(summary) => {
                debug!(
                    id = %item.id,
                    status = ?summary.metadata.verification_status,
                    "summarized"
                );
                apply_summary(item, summary);
                enriched += 1;
            }
            Err(e) => {
                warn!(id = %item.id, error = %e, "summarization failed, keeping item unenriched");
            }
        }
    }

    info!(enriched, total = items.len(), "enrichment complete");
    enriched
}

/// Truncate content to at most `max_chars` characters, on a char boundary.
pub fn truncate_content(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    }
}
