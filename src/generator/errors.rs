use thiserror::Error;

/// Failures of the generation step. Every variant renders with the same
/// prefix so callers can tell API failures from request-building problems.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generation API error: no content received")]
    NoContent,

    #[error("Generation API error: status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Generation API error: request failed: {0}")]
    Transport(String),

    #[error("Generation API error: malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
