use anyhow::Context;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::{
    cache::{PipelineCacheStats, PipelineCaches},
    config::Config,
    fetcher::{ContentFetcher, FetchError, FetcherConfig},
    generator::OpenAiGenerator,
    personas::{InMemoryPersonaRegistry, Persona, PersonaRegistry},
    transform::{
        ErrorCode, PipelineOutput, TransformationPipeline,
        types::{TransformationResult, TransformationServiceResult},
    },
    usage::{InMemoryUsageTracker, UsageTracker},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebpageRequest {
    pub url: String,
    pub persona: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRequest {
    pub text: String,
    pub persona: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Boundary between callers and the pipeline: validates input and maps every
/// outcome onto a [`TransformationServiceResult`] with an [`ErrorCode`].
pub struct TransformationService {
    pipeline: Arc<TransformationPipeline>,
    max_text_length: usize,
    sweepers: Mutex<Vec<JoinHandle<()>>>,
}

impl TransformationService {
    pub fn new(pipeline: Arc<TransformationPipeline>, max_text_length: usize) -> Self {
        Self {
            pipeline,
            max_text_length,
            sweepers: Mutex::new(Vec::new()),
        }
    }

    /// Wires the production collaborators from configuration and starts the
    /// cache sweepers, which run until `shutdown` is cancelled.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_config(config: &Config, shutdown: CancellationToken) -> anyhow::Result<Self> {
        let personas: Arc<dyn PersonaRegistry> = match config.personas_path() {
            Some(path) => Arc::new(
                InMemoryPersonaRegistry::from_json_file(path)
                    .with_context(|| format!("loading personas from {}", path.display()))?,
            ),
            None => Arc::new(InMemoryPersonaRegistry::with_defaults()),
        };
        let source = ContentFetcher::new(FetcherConfig::from(config))
            .context("building content fetcher")?;
        let generator = OpenAiGenerator::from_config(config).context("building generator")?;
        let usage: Arc<dyn UsageTracker> = Arc::new(InMemoryUsageTracker::new());

        let pipeline = TransformationPipeline::new(
            PipelineCaches::new(),
            Arc::new(source),
            Arc::new(generator),
            personas,
            usage,
        );
        let service = Self::new(Arc::new(pipeline), config.max_text_length());
        service.start_sweepers(shutdown);
        Ok(service)
    }

    /// Spawns the periodic sweep of both cache tiers.
    pub fn start_sweepers(&self, shutdown: CancellationToken) {
        let handles = self.pipeline.caches().spawn_sweepers(shutdown);
        self.lock_sweepers().extend(handles);
    }

    /// Hands over the sweeper tasks so the caller can await them after
    /// cancelling their token.
    pub fn take_sweepers(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.lock_sweepers())
    }

    fn lock_sweepers(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.sweepers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn pipeline(&self) -> &Arc<TransformationPipeline> {
        &self.pipeline
    }

    pub fn max_text_length(&self) -> usize {
        self.max_text_length
    }

    #[instrument(skip_all, fields(persona = %request.persona))]
    pub async fn transform_webpage(&self, request: WebpageRequest) -> TransformationServiceResult {
        let outcome = self
            .pipeline
            .transform_webpage(&request.url, &request.persona, request.user_id.as_deref())
            .await;

        match outcome {
            Ok(output) => from_output(output),
            Err(err) => from_fetch_error(&err),
        }
    }

    #[instrument(skip_all, fields(persona = %request.persona))]
    pub async fn transform_text(&self, request: TextRequest) -> TransformationServiceResult {
        if let Err(message) = self.validate_text(&request.text) {
            return TransformationServiceResult::err(ErrorCode::InvalidText, message);
        }

        let result = self
            .pipeline
            .transform_text(&request.text, &request.persona, request.user_id.as_deref())
            .await;

        from_output(PipelineOutput {
            result,
            cached: false,
        })
    }

    /// Checks direct text before any work is attempted.
    pub fn validate_text(&self, text: &str) -> Result<(), String> {
        if text.trim().is_empty() {
            return Err("Invalid text: text is empty".to_string());
        }
        let chars = text.chars().count();
        if chars > self.max_text_length {
            return Err(format!(
                "Invalid text: text is too long ({} characters, maximum {})",
                chars, self.max_text_length
            ));
        }
        Ok(())
    }

    pub fn list_personas(&self) -> Vec<Persona> {
        self.pipeline.personas().all()
    }

    pub fn get_persona(&self, id: &str) -> Option<Persona> {
        self.pipeline.personas().get(id)
    }

    pub fn clear_scrape_cache(&self) {
        info!("clearing scrape cache");
        self.pipeline.caches().content.clear();
    }

    pub fn clear_transform_cache(&self) {
        info!("clearing transform cache");
        self.pipeline.caches().transform.clear();
    }

    pub fn cache_stats(&self) -> PipelineCacheStats {
        self.pipeline.caches().stats()
    }
}

fn from_output(output: PipelineOutput) -> TransformationServiceResult {
    let PipelineOutput { result, cached } = output;
    if result.success {
        return TransformationServiceResult::ok(result, cached);
    }
    from_failed_result(result)
}

/// Failed results only come out of the generation step (or an unknown
/// persona), never out of fetching, so the message text is not classified.
fn from_failed_result(result: TransformationResult) -> TransformationServiceResult {
    let message = result
        .error
        .clone()
        .unwrap_or_else(|| "Transformation failed".to_string());
    TransformationServiceResult::err(ErrorCode::TransformationFailed, message).with_data(result)
}

pub(crate) fn from_fetch_error(err: &FetchError) -> TransformationServiceResult {
    TransformationServiceResult::err(err.error_code(), err.user_message())
        .with_details(err.to_string())
}
