use scraper::{Html, Selector};

use crate::extractor::reader::{first_text, meta_content};

/// Longest description synthesized from body text when the page has none.
const FALLBACK_DESCRIPTION_CHARS: usize = 200;

pub fn description(document: &Html, content: &str) -> Option<String> {
    meta_content(document, "meta[name='description']")
        .or_else(|| meta_content(document, "meta[property='og:description']"))
        .or_else(|| meta_content(document, "meta[name='twitter:description']"))
        .or_else(|| description_from_text(content))
}

pub fn author(document: &Html) -> Option<String> {
    meta_content(document, "meta[name='author']")
        .or_else(|| meta_content(document, "meta[property='article:author']"))
        .or_else(|| meta_content(document, "meta[name='byl']"))
        .or_else(|| first_text(document, "[rel='author']"))
        .or_else(|| first_text(document, ".author"))
}

pub fn publish_date(document: &Html) -> Option<String> {
    meta_content(document, "meta[property='article:published_time']")
        .or_else(|| meta_content(document, "meta[name='date']"))
        .or_else(|| meta_content(document, "meta[name='publish-date']"))
        .or_else(|| meta_content(document, "meta[name='pubdate']"))
        .or_else(|| time_datetime(document))
}

fn time_datetime(document: &Html) -> Option<String> {
    let selector = Selector::parse("time[datetime]").ok()?;
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("datetime"))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// First sentence-ish chunk of the body, cut at a word boundary.
fn description_from_text(content: &str) -> Option<String> {
    let first_block = content.split("\n\n").map(str::trim).find(|b| !b.is_empty())?;
    let flattened = first_block.replace('\n', " ");

    if flattened.chars().count() <= FALLBACK_DESCRIPTION_CHARS {
        return Some(flattened);
    }

    let (cut, _) = flattened.char_indices().nth(FALLBACK_DESCRIPTION_CHARS)?;
    let window = &flattened[..cut];
    let end = window.rfind(' ').unwrap_or(cut);
    Some(format!("{}...", window[..end].trim_end()))
}
