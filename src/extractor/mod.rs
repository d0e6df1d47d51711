pub mod cleaner;
pub mod language;
pub mod metadata;
pub mod model;
pub mod reader;

pub use model::{
    ContentMetadata, ScrapedContent, TRUNCATION_MARKER, normalize_whitespace, truncate_content,
    word_count,
};
pub use reader::UNTITLED;

use scraper::Html;

use crate::fetcher::{errors::FetchError, types::PageResponse};

/// Builds [`ScrapedContent`] from a decoded page.
///
/// Fails with [`FetchError::NoContent`] when nothing readable is left after
/// stripping page chrome.
pub fn extract(page: &PageResponse, max_content_length: usize) -> Result<ScrapedContent, FetchError> {
    extract_html(&page.body_utf8, page.url_final.as_str(), max_content_length)
}

pub fn extract_html(
    html: &str,
    url: &str,
    max_content_length: usize,
) -> Result<ScrapedContent, FetchError> {
    let document = Html::parse_document(html);

    let title = reader::extract_title(&document);
    let text = reader::extract_main_text(&document);
    if text.trim().is_empty() {
        return Err(FetchError::NoContent);
    }

    // Metadata describes the page as found, before truncation.
    let metadata = ContentMetadata {
        description: metadata::description(&document, &text),
        author: metadata::author(&document),
        publish_date: metadata::publish_date(&document),
        language: language::detect_language(&text),
        word_count: word_count(&text),
    };

    Ok(ScrapedContent {
        title,
        content: truncate_content(&text, max_content_length),
        url: url.to_string(),
        metadata,
    })
}
