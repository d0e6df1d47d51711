use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const TRUNCATION_MARKER: &str = "...";

static HORIZONTAL_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());

/// Normalized content of one fetched page. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedContent {
    pub title: String,
    pub content: String,
    pub url: String,
    pub metadata: ContentMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub word_count: usize,
}

/// Collapses whitespace runs to one space and blank-line runs to one blank line.
pub fn normalize_whitespace(text: &str) -> String {
    let spaced = HORIZONTAL_WS.replace_all(text, " ");
    let lines: Vec<&str> = spaced.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_LINES
        .replace_all(joined.trim(), "\n\n")
        .into_owned()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Cuts `text` to at most `max_chars` characters plus [`TRUNCATION_MARKER`].
///
/// The cut moves back to the nearest space when that space lies within the
/// last 20% of the window; otherwise the text is hard-cut. Text already within
/// the limit is returned untouched, without a marker.
pub fn truncate_content(text: &str, max_chars: usize) -> String {
    let Some((hard_cut, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let window = &text[..hard_cut];
    let threshold = max_chars * 4 / 5;
    let cut = match window.rfind(' ') {
        Some(space) if window[..space].chars().count() >= threshold => space,
        _ => hard_cut,
    };

    let mut truncated = text[..cut].trim_end().to_string();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}
