use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, ClientBuilder, header, redirect};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::{
    config::Config,
    extractor::{self, ScrapedContent},
    fetcher::{
        decode::decode_body,
        errors::FetchError,
        types::PageResponse,
        url_guard::{ensure_public_host, normalize_url},
    },
};

const MAX_BODY_SIZE: u64 = 5 * 1024 * 1024; // 5MB
const MAX_REDIRECTS: usize = 10;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Turns a URL into [`ScrapedContent`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<ScrapedContent, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub max_content_length: usize,
    /// Lets loopback and private hosts through, for the requested URL and for
    /// every redirect hop. Only meant for tests against local mock servers.
    pub allow_private_hosts: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_content_length: 10_000,
            allow_private_hosts: false,
        }
    }
}

impl From<&Config> for FetcherConfig {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.fetch_timeout(),
            max_content_length: config.max_content_length(),
            allow_private_hosts: false,
        }
    }
}

/// HTTP-backed [`ContentSource`].
#[derive(Debug, Clone)]
pub struct ContentFetcher {
    client: Client,
    config: FetcherConfig,
}

impl ContentFetcher {
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = ClientBuilder::new()
            .connect_timeout(config.timeout.min(Duration::from_secs(10)))
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .redirect(redirect_policy(config.allow_private_hosts))
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Unknown(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Validates `input` and returns the URL that will actually be requested.
    pub fn resolve(&self, input: &str) -> Result<Url, FetchError> {
        let url = normalize_url(input)?;
        if !self.config.allow_private_hosts {
            ensure_public_host(&url)?;
        }
        Ok(url)
    }

    /// Downloads and decodes the page without extracting anything.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch_page(&self, url: Url) -> Result<PageResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "non-success response");
            return Err(FetchError::from_status(status));
        }

        if let Some(content_length) = response.content_length()
            && content_length > MAX_BODY_SIZE
        {
            return Err(FetchError::BodyTooLarge(content_length));
        }

        let url_final = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("text/html")
            .to_string();

        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            return Err(FetchError::UnsupportedContentType(content_type));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Io(e.to_string())
                }
            })?;

        // Content-Length may be absent or wrong.
        if body.len() as u64 > MAX_BODY_SIZE {
            return Err(FetchError::BodyTooLarge(body.len() as u64));
        }

        let (body_utf8, encoding) = decode_body(&content_type, &body)?;
        debug!(charset = encoding.name(), bytes = body.len(), "decoded body");

        Ok(PageResponse {
            url_final,
            status,
            content_type,
            body_utf8,
            charset: encoding.name(),
            fetched_at: Utc::now(),
        })
    }
}

/// Follows at most [`MAX_REDIRECTS`] hops and re-checks every hop's host, so
/// a public page cannot bounce the request onto an internal address.
fn redirect_policy(allow_private_hosts: bool) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error(FetchError::RedirectLoop);
        }
        if !allow_private_hosts && let Err(err) = ensure_public_host(attempt.url()) {
            warn!(target_url = %attempt.url(), "refusing redirect to private host");
            return attempt.error(err);
        }
        attempt.follow()
    })
}

#[async_trait]
impl ContentSource for ContentFetcher {
    #[instrument(skip(self))]
    async fn scrape(&self, url: &str) -> Result<ScrapedContent, FetchError> {
        let target = self.resolve(url)?;
        let page = self.fetch_page(target).await?;
        let content = extractor::extract(&page, self.config.max_content_length)?;

        info!(
            url = %page.url_final,
            title = %content.title,
            words = content.metadata.word_count,
            "scraped page"
        );
        Ok(content)
    }
}
