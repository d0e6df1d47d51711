use regex::Regex;
use scraper::{ElementRef, Node};
use std::sync::LazyLock;

/// Elements whose whole subtree is never page content.
const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside", "iframe",
    "svg", "canvas", "form", "button", "select", "head",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "br", "hr", "li", "ul", "ol", "dl", "dt", "dd",
    "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "table", "tr", "figure",
    "figcaption", "details", "summary",
];

static AD_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^|[\s_-])(ads?|advert|advertisement|adsbygoogle|sponsor(ed)?|promo|banner|popup|modal|cookie|newsletter|subscribe|share|social|related|comments?|sidebar|breadcrumbs?)($|[\s_-])",
    )
    .unwrap()
});

/// True for subtrees that should be dropped before text extraction.
pub fn is_noise(element: &ElementRef) -> bool {
    let value = element.value();
    if STRIPPED_TAGS.contains(&value.name()) {
        return true;
    }
    if matches!(
        value.attr("role"),
        Some("navigation" | "banner" | "contentinfo" | "complementary")
    ) {
        return true;
    }
    if value.attr("aria-hidden") == Some("true") {
        return true;
    }

    let class_hit = value.attr("class").is_some_and(|c| AD_LIKE.is_match(c));
    let id_hit = value.attr("id").is_some_and(|id| AD_LIKE.is_match(id));
    class_hit || id_hit
}

/// Visible text of `root` with noise removed and block elements on their own lines.
///
/// The result still needs whitespace normalization.
pub fn visible_text(root: ElementRef) -> String {
    let mut out = String::new();
    collect(root, &mut out);
    out
}

fn collect(element: ElementRef, out: &mut String) {
    if is_noise(&element) {
        return;
    }

    let is_block = BLOCK_TAGS.contains(&element.value().name());
    if is_block {
        out.push('\n');
    }

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect(child_el, out);
                }
            }
            _ => {}
        }
    }

    if is_block {
        out.push('\n');
    }
}
