pub mod errors;
pub mod pipeline;
pub mod prompts;
pub mod service;
pub mod types;

pub use errors::ErrorCode;
pub use pipeline::{PipelineOutput, TransformationPipeline};
pub use service::{TextRequest, TransformationService, WebpageRequest};
pub use types::{
    DIRECT_TEXT_TITLE, DIRECT_TEXT_URL, OriginalContent, PersonaSummary, TransformationResult,
    TransformationServiceResult,
};
