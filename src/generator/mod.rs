pub mod client;
pub mod errors;
pub mod types;

pub use client::{Generator, OpenAiGenerator};
pub use errors::GenerationError;
pub use types::{
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, GenerationOutput, GenerationRequest,
    TokenUsage,
};
