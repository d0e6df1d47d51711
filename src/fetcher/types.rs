use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use url::Url;

/// A fetched HTML page, decoded to UTF-8 and ready for extraction.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub url_final: Url,
    pub status: StatusCode,
    pub content_type: String,
    pub body_utf8: String,
    /// WHATWG name of the encoding the body was decoded from.
    pub charset: &'static str,
    pub fetched_at: DateTime<Utc>,
}
