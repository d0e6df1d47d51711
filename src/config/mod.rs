//! Configuration handling for the transformation pipeline.
//!
//! Everything is read from environment variables with development defaults,
//! so a bare `restyle` invocation works locally without any setup beyond an
//! API key. `Config::from_env` validates numeric values and reports the
//! offending variable when one does not parse.

use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable names.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_GENERATION_MODEL: &str = "GENERATION_MODEL";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "FETCH_TIMEOUT_SECS";
pub const ENV_MAX_CONTENT_LENGTH: &str = "MAX_CONTENT_LENGTH";
pub const ENV_MAX_TEXT_LENGTH: &str = "MAX_TEXT_LENGTH";
pub const ENV_JOB_CONCURRENCY: &str = "JOB_CONCURRENCY";
pub const ENV_PERSONAS_PATH: &str = "PERSONAS_PATH";

/// Default development values used when environment variables are absent.
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_GENERATION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_CONTENT_LENGTH: usize = 10_000;
const DEFAULT_MAX_TEXT_LENGTH: usize = 50_000;
const DEFAULT_JOB_CONCURRENCY: usize = 4;

/// Application runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    openai_api_key: String,
    openai_base_url: String,
    generation_model: String,
    fetch_timeout_secs: u64,
    max_content_length: usize,
    max_text_length: usize,
    job_concurrency: usize,
    personas_path: Option<PathBuf>,
}

impl Config {
    /// Load from environment variables, falling back to development defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai_api_key = env::var(ENV_OPENAI_API_KEY).unwrap_or_default();
        let openai_base_url = env::var(ENV_OPENAI_BASE_URL)
            .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string());
        let generation_model = env::var(ENV_GENERATION_MODEL)
            .unwrap_or_else(|_| DEFAULT_GENERATION_MODEL.to_string());

        let fetch_timeout_secs = parse_var(ENV_FETCH_TIMEOUT_SECS, DEFAULT_FETCH_TIMEOUT_SECS)?;
        let max_content_length = parse_var(ENV_MAX_CONTENT_LENGTH, DEFAULT_MAX_CONTENT_LENGTH)?;
        let max_text_length = parse_var(ENV_MAX_TEXT_LENGTH, DEFAULT_MAX_TEXT_LENGTH)?;
        let job_concurrency = parse_var(ENV_JOB_CONCURRENCY, DEFAULT_JOB_CONCURRENCY)?;

        if fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: ENV_FETCH_TIMEOUT_SECS,
                reason: "must be greater than zero".to_string(),
            });
        }
        if job_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: ENV_JOB_CONCURRENCY,
                reason: "must be greater than zero".to_string(),
            });
        }

        let personas_path = env::var(ENV_PERSONAS_PATH)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            openai_api_key,
            openai_base_url,
            generation_model,
            fetch_timeout_secs,
            max_content_length,
            max_text_length,
            job_concurrency,
            personas_path,
        })
    }

    /// Credential for the generation API. Empty when unset.
    pub fn openai_api_key(&self) -> &str {
        &self.openai_api_key
    }
    /// Base URL of the OpenAI-compatible endpoint (no trailing path).
    pub fn openai_base_url(&self) -> &str {
        &self.openai_base_url
    }
    pub fn generation_model(&self) -> &str {
        &self.generation_model
    }
    /// Hard timeout applied to every content fetch.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
    /// Scraped content is truncated to this many characters.
    pub fn max_content_length(&self) -> usize {
        self.max_content_length
    }
    /// Direct text input longer than this is rejected.
    pub fn max_text_length(&self) -> usize {
        self.max_text_length
    }
    pub fn job_concurrency(&self) -> usize {
        self.job_concurrency
    }
    pub fn personas_path(&self) -> Option<&PathBuf> {
        self.personas_path.as_ref()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            job_concurrency: DEFAULT_JOB_CONCURRENCY,
            personas_path: None,
        }
    }
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                field: name,
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

/// Errors that can occur while building a configuration.
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl Error for ConfigError {}
