use encoding_rs::Encoding;
use regex::Regex;
use std::sync::LazyLock;

use crate::fetcher::errors::FetchError;

static CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"'\s;]+)"#).unwrap());

static META_CHARSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<meta\s+[^>]*?charset\s*=\s*["']?([^"'\s/>]+)"#).unwrap());

/// Bytes of the body searched for an in-document charset declaration.
const SNIFF_LIMIT: usize = 4096;

/// Decodes a response body to UTF-8, returning the text and the encoding used.
///
/// Resolution order: Content-Type header, `<meta charset>` / http-equiv in the
/// first 4KB, then statistical detection.
pub fn decode_body(
    content_type: &str,
    body: &[u8],
) -> Result<(String, &'static Encoding), FetchError> {
    let encoding = detect_encoding(content_type, body);
    let (decoded, used, had_errors) = encoding.decode(body);

    if had_errors {
        return Err(FetchError::Charset(format!(
            "malformed {} content",
            used.name()
        )));
    }

    Ok((decoded.into_owned(), used))
}

fn detect_encoding(content_type: &str, body: &[u8]) -> &'static Encoding {
    if let Some(encoding) = label_from(&CHARSET_REGEX, content_type) {
        return encoding;
    }

    let head = &body[..body.len().min(SNIFF_LIMIT)];
    let head_str = String::from_utf8_lossy(head);

    // Also matches `http-equiv="Content-Type" content="text/html; charset=..."`.
    if let Some(encoding) = label_from(&META_CHARSET_REGEX, &head_str) {
        return encoding;
    }
    if let Some(encoding) = label_from(&CHARSET_REGEX, &head_str) {
        return encoding;
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(head, body.len() <= SNIFF_LIMIT);
    detector.guess(None, true)
}

fn label_from(regex: &Regex, haystack: &str) -> Option<&'static Encoding> {
    let label = regex.captures(haystack)?.get(1)?.as_str().to_lowercase();
    Encoding::for_label(label.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charset_from_content_type() {
        let body = b"<html><head><title>Test</title></head></html>";
        let (text, encoding) = decode_body("text/html; charset=utf-8", body).unwrap();
        assert_eq!(encoding, encoding_rs::UTF_8);
        assert!(text.contains("Test"));
    }

    #[test]
    fn test_charset_from_meta_tag() {
        let body = b"<html><head><meta charset=\"iso-8859-1\"><title>Caf\xe9</title></head></html>";
        let (text, encoding) = decode_body("text/html", body).unwrap();
        // encoding_rs maps ISO-8859-1 onto its windows-1252 superset
        assert_eq!(encoding, encoding_rs::WINDOWS_1252);
        assert!(text.contains("Café"));
    }

    #[test]
    fn test_charset_from_http_equiv() {
        let body = b"<html><head><meta http-equiv=\"Content-Type\" content=\"text/html; charset=windows-1252\"></head></html>";
        let (_, encoding) = decode_body("text/html", body).unwrap();
        assert_eq!(encoding, encoding_rs::WINDOWS_1252);
    }

    #[test]
    fn test_utf8_roundtrip_without_declaration() {
        let (text, _) = decode_body("text/html", "Hello, 世界!".as_bytes()).unwrap();
        assert_eq!(text, "Hello, 世界!");
    }

    #[test]
    fn test_malformed_utf8_is_a_charset_error() {
        let body = b"<p>broken \xff\xfe bytes</p>";
        let result = decode_body("text/html; charset=utf-8", body);
        assert!(matches!(result, Err(FetchError::Charset(_))));
    }
}
