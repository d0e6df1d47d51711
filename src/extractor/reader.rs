use scraper::{ElementRef, Html, Selector};

use crate::extractor::{cleaner::visible_text, model::normalize_whitespace};

pub const UNTITLED: &str = "Untitled Page";

/// Below this many characters a container is not trusted as the main content.
const MIN_CONTAINER_CHARS: usize = 100;

const CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".article-body",
    ".post",
    ".article",
    "#content",
    "#main",
];

/// Title from `<title>`, first `<h1>`, `og:title`, then `<meta name="title">`.
pub fn extract_title(document: &Html) -> String {
    first_text(document, "title")
        .or_else(|| first_text(document, "h1"))
        .or_else(|| meta_content(document, "meta[property='og:title']"))
        .or_else(|| meta_content(document, "meta[name='title']"))
        .unwrap_or_else(|| UNTITLED.to_string())
}

/// Main text of the page.
///
/// Every candidate container is measured and the longest wins. When none
/// reaches [`MIN_CONTAINER_CHARS`], the whole body is used instead.
pub fn extract_main_text(document: &Html) -> String {
    let mut best = String::new();

    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = normalize_whitespace(&visible_text(element));
            if text.chars().count() > best.chars().count() {
                best = text;
            }
        }
    }

    if best.chars().count() >= MIN_CONTAINER_CHARS {
        return best;
    }

    body_text(document)
}

fn body_text(document: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next());

    match body {
        Some(body) => normalize_whitespace(&visible_text(body)),
        None => normalize_whitespace(&visible_text(document.root_element())),
    }
}

pub(crate) fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

pub(crate) fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("content"))
        .map(normalize_whitespace)
        .find(|content| !content.is_empty())
}

fn element_text(element: ElementRef) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
        .replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn test_title_prefers_title_tag() {
        let d = doc(r#"<html><head><title> Page  Title </title><meta property="og:title" content="OG"></head><body><h1>Heading</h1></body></html>"#);
        assert_eq!(extract_title(&d), "Page Title");
    }

    #[test]
    fn test_title_falls_back_through_h1_og_and_meta() {
        let d = doc("<html><body><h1>Heading</h1></body></html>");
        assert_eq!(extract_title(&d), "Heading");

        let d = doc(r#"<html><head><meta property="og:title" content="Open Graph"></head><body></body></html>"#);
        assert_eq!(extract_title(&d), "Open Graph");

        let d = doc(r#"<html><head><meta name="title" content="Meta Title"></head><body></body></html>"#);
        assert_eq!(extract_title(&d), "Meta Title");
    }

    #[test]
    fn test_title_defaults_to_untitled() {
        let d = doc("<html><head><title>   </title></head><body><p>x</p></body></html>");
        assert_eq!(extract_title(&d), UNTITLED);
    }

    #[test]
    fn test_picks_the_longest_container() {
        let short = "Short main teaser. ".repeat(3);
        let long = "The long article body goes on and on. ".repeat(10);
        let html = format!(
            "<html><body><main><p>{}</p></main><article><p>{}</p></article></body></html>",
            short, long
        );
        let text = extract_main_text(&doc(&html));
        assert!(text.starts_with("The long article body"));
        assert!(!text.contains("teaser"));
    }

    #[test]
    fn test_falls_back_to_body_when_containers_are_tiny() {
        let html = "<html><body><article>Tiny</article><div><p>Loose paragraph in the body.</p></div></body></html>";
        let text = extract_main_text(&doc(html));
        assert!(text.contains("Tiny"));
        assert!(text.contains("Loose paragraph in the body."));
    }

    #[test]
    fn test_container_text_excludes_noise() {
        let body = "Useful sentence for the reader. ".repeat(5);
        let html = format!(
            "<html><body><article><script>evil()</script><p>{}</p><div class=\"share-buttons\">Share this</div></article></body></html>",
            body
        );
        let text = extract_main_text(&doc(&html));
        assert!(!text.contains("evil"));
        assert!(!text.contains("Share this"));
        assert!(text.contains("Useful sentence"));
    }
}
