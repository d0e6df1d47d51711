use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Closed set of error codes handed to the route layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidUrl,
    ScrapingFailed,
    NetworkError,
    InvalidText,
    TransformationFailed,
    UnknownError,
}

const INVALID_URL_KEYWORDS: &[&str] = &["invalid url", "private or internal", "unsupported scheme"];
const NETWORK_KEYWORDS: &[&str] = &[
    "could not find the website",
    "could not connect",
    "took too long",
    "network error",
    "timed out",
    "timeout",
    "dns",
    "enotfound",
    "econnrefused",
];
const SCRAPING_KEYWORDS: &[&str] = &[
    "failed to scrape",
    "scraping",
    "not found",
    "forbidden",
    "404",
    "403",
];
const INVALID_TEXT_KEYWORDS: &[&str] = &["invalid text", "text input", "text is empty", "text is too long"];
const TRANSFORMATION_KEYWORDS: &[&str] = &[
    "generation",
    "transformation",
    "no content received",
    "persona",
    "openai",
];

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "INVALID_URL",
            Self::ScrapingFailed => "SCRAPING_FAILED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::InvalidText => "INVALID_TEXT",
            Self::TransformationFailed => "TRANSFORMATION_FAILED",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Keyword-based classification of a free-form error message.
    ///
    /// Checked in order: URL validation, network, scraping, text validation,
    /// generation. Anything else is [`ErrorCode::UnknownError`].
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let has = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

        if has(INVALID_URL_KEYWORDS) {
            Self::InvalidUrl
        } else if has(NETWORK_KEYWORDS) {
            Self::NetworkError
        } else if has(SCRAPING_KEYWORDS) {
            Self::ScrapingFailed
        } else if has(INVALID_TEXT_KEYWORDS) {
            Self::InvalidText
        } else if has(TRANSFORMATION_KEYWORDS) {
            Self::TransformationFailed
        } else {
            Self::UnknownError
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
