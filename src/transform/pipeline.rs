use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::{
    cache::{PipelineCaches, text_transform_key, url_key, webpage_transform_key},
    extractor::{ScrapedContent, word_count},
    fetcher::{ContentSource, FetchError},
    generator::{GenerationRequest, Generator},
    personas::{Persona, PersonaRegistry},
    transform::{
        prompts,
        types::{
            DIRECT_TEXT_TITLE, DIRECT_TEXT_URL, OriginalContent, PersonaSummary,
            TransformationResult,
        },
    },
    usage::{SourceKind, UsageEvent, UsageTracker},
};

/// A transformation plus whether it was served from the transform cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub result: TransformationResult,
    pub cached: bool,
}

/// Cache-aside orchestration of fetch, prompt construction and generation.
///
/// Fetch failures are returned as `Err` because no work could be attempted.
/// Generation failures come back as an `Ok` holding a failed
/// [`TransformationResult`]; they are never written to the transform cache.
pub struct TransformationPipeline {
    caches: PipelineCaches,
    source: Arc<dyn ContentSource>,
    generator: Arc<dyn Generator>,
    personas: Arc<dyn PersonaRegistry>,
    usage: Arc<dyn UsageTracker>,
}

impl TransformationPipeline {
    pub fn new(
        caches: PipelineCaches,
        source: Arc<dyn ContentSource>,
        generator: Arc<dyn Generator>,
        personas: Arc<dyn PersonaRegistry>,
        usage: Arc<dyn UsageTracker>,
    ) -> Self {
        Self {
            caches,
            source,
            generator,
            personas,
            usage,
        }
    }

    pub fn caches(&self) -> &PipelineCaches {
        &self.caches
    }

    pub fn personas(&self) -> &dyn PersonaRegistry {
        self.personas.as_ref()
    }

    #[instrument(skip(self, user_id), fields(persona = %persona_id))]
    pub async fn transform_webpage(
        &self,
        url: &str,
        persona_id: &str,
        user_id: Option<&str>,
    ) -> Result<PipelineOutput, FetchError> {
        let Some(persona) = self.personas.get(persona_id) else {
            let original = OriginalContent {
                title: String::new(),
                content: String::new(),
                url: url.to_string(),
                word_count: 0,
            };
            let result = self
                .unknown_persona(original, persona_id, user_id, SourceKind::Webpage)
                .await;
            return Ok(PipelineOutput {
                result,
                cached: false,
            });
        };

        if let Some(result) = self.cached_webpage(url, &persona, user_id).await {
            return Ok(PipelineOutput {
                result,
                cached: true,
            });
        }

        let content = self.load_content(url).await?;
        let user_prompt = prompts::webpage_prompt(&persona, &content);
        let result = self
            .generate(
                &persona,
                OriginalContent::from(&content),
                user_prompt,
                webpage_transform_key(url, &persona.id),
                user_id,
                SourceKind::Webpage,
            )
            .await;

        Ok(PipelineOutput {
            result,
            cached: false,
        })
    }

    /// Same as the generation half of [`Self::transform_webpage`], on text
    /// supplied by the caller.
    #[instrument(skip(self, text, user_id), fields(persona = %persona_id, chars = text.len()))]
    pub async fn transform_text(
        &self,
        text: &str,
        persona_id: &str,
        user_id: Option<&str>,
    ) -> TransformationResult {
        let original = OriginalContent {
            title: DIRECT_TEXT_TITLE.to_string(),
            content: text.to_string(),
            url: DIRECT_TEXT_URL.to_string(),
            word_count: word_count(text),
        };

        let Some(persona) = self.personas.get(persona_id) else {
            return self
                .unknown_persona(original, persona_id, user_id, SourceKind::Text)
                .await;
        };

        let user_prompt = prompts::text_prompt(&persona, text);
        self.generate(
            &persona,
            original,
            user_prompt,
            text_transform_key(text, &persona.id),
            user_id,
            SourceKind::Text,
        )
        .await
    }

    /// Transform-cache lookup for a URL, recording usage on a hit.
    pub async fn lookup_webpage(
        &self,
        url: &str,
        persona_id: &str,
        user_id: Option<&str>,
    ) -> Option<TransformationResult> {
        let persona = self.personas.get(persona_id)?;
        self.cached_webpage(url, &persona, user_id).await
    }

    /// Transform-cache lookup for direct text, recording usage on a hit.
    pub async fn lookup_text(
        &self,
        text: &str,
        persona_id: &str,
        user_id: Option<&str>,
    ) -> Option<TransformationResult> {
        let result = self
            .caches
            .transform
            .get(&text_transform_key(text, persona_id))?;
        self.record_usage(user_id, cached_event(persona_id, SourceKind::Text))
            .await;
        Some(result)
    }

    async fn cached_webpage(
        &self,
        url: &str,
        persona: &Persona,
        user_id: Option<&str>,
    ) -> Option<TransformationResult> {
        let result = self
            .caches
            .transform
            .get(&webpage_transform_key(url, &persona.id))?;

        info!(url, "transform cache hit");
        // A cache hit still delivers a transformation to the user.
        self.record_usage(user_id, cached_event(&persona.id, SourceKind::Webpage))
            .await;
        Some(result)
    }

    async fn load_content(&self, url: &str) -> Result<ScrapedContent, FetchError> {
        let key = url_key(url);
        if let Some(content) = self.caches.content.get(&key) {
            debug!(url, "content cache hit");
            return Ok(content);
        }

        let content = self.source.scrape(url).await?;
        self.caches.content.set(key, content.clone());
        Ok(content)
    }

    async fn generate(
        &self,
        persona: &Persona,
        original: OriginalContent,
        user_prompt: String,
        cache_key: String,
        user_id: Option<&str>,
        source: SourceKind,
    ) -> TransformationResult {
        let request = GenerationRequest::new(persona.system_prompt.clone(), user_prompt);

        match self.generator.generate(request).await {
            Ok(output) => {
                let total_tokens = output.usage.map(|u| u.total_tokens);
                let result = TransformationResult::succeeded(
                    original,
                    PersonaSummary::from(persona),
                    output.content,
                    output.usage,
                );
                self.caches.transform.set(cache_key, result.clone());
                info!(persona = %persona.id, ?total_tokens, "transformation complete");

                self.record_usage(
                    user_id,
                    UsageEvent {
                        persona_id: persona.id.clone(),
                        source,
                        cached: false,
                        total_tokens,
                    },
                )
                .await;
                result
            }
            Err(err) => {
                warn!(persona = %persona.id, error = %err, "transformation failed");
                self.record_failure(user_id, failed_event(&persona.id, source))
                    .await;
                TransformationResult::failed(original, PersonaSummary::from(persona), err.to_string())
            }
        }
    }

    async fn unknown_persona(
        &self,
        original: OriginalContent,
        persona_id: &str,
        user_id: Option<&str>,
        source: SourceKind,
    ) -> TransformationResult {
        warn!(persona = persona_id, "unknown persona requested");
        self.record_failure(user_id, failed_event(persona_id, source))
            .await;

        let persona = PersonaSummary {
            id: persona_id.to_string(),
            name: String::new(),
            description: String::new(),
        };
        TransformationResult::failed(
            original,
            persona,
            format!("Persona '{}' is not available", persona_id),
        )
    }

    async fn record_usage(&self, user_id: Option<&str>, event: UsageEvent) {
        let Some(user_id) = user_id else {
            return;
        };
        if let Err(e) = self.usage.increment_usage(user_id, event).await {
            warn!(user_id, error = %e, "failed to record usage");
        }
    }

    async fn record_failure(&self, user_id: Option<&str>, event: UsageEvent) {
        let Some(user_id) = user_id else {
            return;
        };
        if let Err(e) = self.usage.increment_failed_attempt(user_id, event).await {
            warn!(user_id, error = %e, "failed to record failed attempt");
        }
    }
}

fn cached_event(persona_id: &str, source: SourceKind) -> UsageEvent {
    UsageEvent {
        persona_id: persona_id.to_string(),
        source,
        cached: true,
        total_tokens: None,
    }
}

fn failed_event(persona_id: &str, source: SourceKind) -> UsageEvent {
    UsageEvent {
        persona_id: persona_id.to_string(),
        source,
        cached: false,
        total_tokens: None,
    }
}
