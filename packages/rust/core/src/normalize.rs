//! Whitespace normalization for fetched items.
//!
//! Headline and meta description are trimmed and get their intra-line
//! whitespace collapsed. The body additionally loses blank lines. URL and
//! timestamp fields are only trimmed. The transform is idempotent.

use std::sync::LazyLock;

use newsdesk_shared::ContentItem;
use regex::Regex;

/// Runs of whitespace that contain no newline.
static INLINE_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("valid regex"));

/// Any whitespace run that contains at least one newline.
static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]*\n\s*").expect("valid regex"));

/// Trim and collapse intra-line whitespace. Newlines are kept as they are.
pub fn normalize_line(text: &str) -> String {
    INLINE_WS.replace_all(text.trim(), " ").into_owned()
}

/// Normalize a multi-line text value such as an article body.
pub fn normalize_text(text: &str) -> String {
    let collapsed = INLINE_WS.replace_all(text.trim(), " ");
    LINE_BREAKS.replace_all(&collapsed, "\n").into_owned()
}

/// Normalize one item in place.
pub fn normalize_item(item: &mut ContentItem) {
    item.headline = normalize_line(&item.headline);
    item.body = normalize_text(&item.body);
    item.meta_description = normalize_line(&item.meta_description);

    trim_in_place(&mut item.image_link);
    trim_in_place(&mut item.source_link);
    trim_in_place(&mut item.published_at);
}

/// Normalize a batch of items.
pub fn normalize_all(items: Vec<ContentItem>) -> Vec<ContentItem> {
    items
        .into_iter()
        .map(|mut item| {
            normalize_item(&mut item);
            item
        })
        .collect()
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}
