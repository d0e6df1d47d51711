use url::Url;

/// Canonical cache key for a URL.
///
/// Parses and re-serializes so trivially different spellings share an entry.
/// Input that does not parse is used verbatim; key construction never fails.
pub fn url_key(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(url) => url.to_string(),
        Err(_) => trimmed.to_string(),
    }
}

/// Stable identity for a block of direct text input.
pub fn text_key(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

/// Transform-cache key for a URL rendered by one persona.
pub fn webpage_transform_key(url: &str, persona_id: &str) -> String {
    format!("url:{}|persona:{}", url_key(url), persona_id)
}

/// Transform-cache key for direct text rendered by one persona.
pub fn text_transform_key(text: &str, persona_id: &str) -> String {
    format!("text:{}|persona:{}", text_key(text), persona_id)
}
