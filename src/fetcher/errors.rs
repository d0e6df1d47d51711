use std::error::Error as StdError;
use std::io;
use thiserror::Error;

use crate::transform::ErrorCode;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("private or internal host: {0}")]
    PrivateUrl(String),

    #[error("dns failure: {0}")]
    Dns(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("connect error: {0}")]
    Connect(String),

    #[error("request timeout")]
    Timeout,

    #[error("too many redirects")]
    RedirectLoop,

    #[error("access forbidden (403)")]
    Forbidden,

    #[error("page not found (404)")]
    NotFound,

    #[error("http error {0}")]
    Http(reqwest::StatusCode),

    #[error("body too large ({0} bytes)")]
    BodyTooLarge(u64),

    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),

    #[error("charset error: {0}")]
    Charset(String),

    #[error("no content could be extracted")]
    NoContent,

    #[error("io error: {0}")]
    Io(String),

    #[error("unknown: {0}")]
    Unknown(String),
}

impl FetchError {
    /// Short, actionable message safe to show to the caller.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidUrl(_) => {
                "Invalid URL format. Please provide a valid web address.".to_string()
            }
            Self::PrivateUrl(_) => {
                "Private or internal URLs are not allowed for security reasons".to_string()
            }
            Self::Dns(_) => {
                "Could not find the website. Please check the URL and try again.".to_string()
            }
            Self::ConnectionRefused(_) | Self::Connect(_) => {
                "Could not connect to the website. The server refused the connection.".to_string()
            }
            Self::Timeout => {
                "The website took too long to respond. Please try again later.".to_string()
            }
            Self::RedirectLoop => {
                "Failed to scrape the page: the website redirected too many times.".to_string()
            }
            Self::Forbidden => {
                "Access forbidden: this website blocks automated access.".to_string()
            }
            Self::NotFound => "The page was not found (404). Please check the URL.".to_string(),
            Self::Http(status) => format!(
                "Failed to scrape the page: the website responded with status {}.",
                status.as_u16()
            ),
            Self::BodyTooLarge(_) => {
                "Failed to scrape the page: the page is too large to process.".to_string()
            }
            Self::UnsupportedContentType(ct) => {
                format!("Failed to scrape the page: unsupported content type '{}'.", ct)
            }
            Self::Charset(_) => {
                "Failed to scrape the page: its text encoding could not be decoded.".to_string()
            }
            Self::NoContent => {
                "Failed to scrape the page: no content could be extracted.".to_string()
            }
            Self::Io(e) => format!("A network error occurred while fetching the page: {}", e),
            Self::Unknown(e) => e.clone(),
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidUrl(_) | Self::PrivateUrl(_) => ErrorCode::InvalidUrl,
            Self::Dns(_)
            | Self::ConnectionRefused(_)
            | Self::Connect(_)
            | Self::Timeout
            | Self::Io(_) => ErrorCode::NetworkError,
            Self::RedirectLoop
            | Self::Forbidden
            | Self::NotFound
            | Self::Http(_)
            | Self::BodyTooLarge(_)
            | Self::UnsupportedContentType(_)
            | Self::Charset(_)
            | Self::NoContent => ErrorCode::ScrapingFailed,
            Self::Unknown(_) => ErrorCode::UnknownError,
        }
    }

    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            403 => Self::Forbidden,
            404 => Self::NotFound,
            _ => Self::Http(status),
        }
    }

    pub fn from_reqwest_error(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if err.is_redirect() {
            return redirect_failure(&err);
        }
        if let Some(status) = err.status() {
            return Self::from_status(status);
        }
        if err.is_connect() || err.is_request() {
            return classify_connect_failure(&err);
        }
        Self::Unknown(err.to_string())
    }
}

/// Recovers the reason the redirect policy stopped following.
fn redirect_failure(err: &reqwest::Error) -> FetchError {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        match cause.downcast_ref::<FetchError>() {
            Some(FetchError::PrivateUrl(host)) => return FetchError::PrivateUrl(host.clone()),
            Some(FetchError::InvalidUrl(reason)) => return FetchError::InvalidUrl(reason.clone()),
            Some(_) => return FetchError::RedirectLoop,
            None => source = cause.source(),
        }
    }
    FetchError::RedirectLoop
}

/// Walks the source chain looking for the underlying resolver or socket error.
fn classify_connect_failure(err: &reqwest::Error) -> FetchError {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    let mut chain = err.to_string();

    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return FetchError::ConnectionRefused(io_err.to_string());
            }
            if io_err.kind() == io::ErrorKind::TimedOut {
                return FetchError::Timeout;
            }
        }
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }

    let lowered = chain.to_lowercase();
    if lowered.contains("dns error")
        || lowered.contains("failed to lookup address")
        || lowered.contains("name or service not known")
        || lowered.contains("no such host")
    {
        FetchError::Dns(chain)
    } else if lowered.contains("connection refused") {
        FetchError::ConnectionRefused(chain)
    } else {
        FetchError::Connect(chain)
    }
}
