#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::Semaphore;

use restyle::{
    cache::PipelineCaches,
    extractor::{ContentMetadata, ScrapedContent},
    fetcher::{ContentSource, FetchError},
    generator::{GenerationError, GenerationOutput, GenerationRequest, Generator, TokenUsage},
    personas::InMemoryPersonaRegistry,
    transform::{TransformationPipeline, TransformationService},
    usage::InMemoryUsageTracker,
};

type ScrapeFn = dyn Fn(&str) -> Result<ScrapedContent, FetchError> + Send + Sync;
type GenerateFn = dyn Fn(usize) -> Result<GenerationOutput, GenerationError> + Send + Sync;

/// Content source that counts calls and answers from a closure.
pub struct CountingSource {
    calls: AtomicUsize,
    respond: Box<ScrapeFn>,
}

impl CountingSource {
    pub fn new(
        respond: impl Fn(&str) -> Result<ScrapedContent, FetchError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            respond: Box::new(respond),
        })
    }

    pub fn articles() -> Arc<Self> {
        Self::new(|url| Ok(article(url)))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for CountingSource {
    async fn scrape(&self, url: &str) -> Result<ScrapedContent, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(url)
    }
}

/// Generator that counts calls, keeps the last request and can be held
/// closed until the test releases it.
pub struct CountingGenerator {
    calls: AtomicUsize,
    last_request: Mutex<Option<GenerationRequest>>,
    gate: Option<Arc<Semaphore>>,
    respond: Box<GenerateFn>,
}

impl CountingGenerator {
    /// `respond` receives the zero-based call number.
    pub fn new(
        respond: impl Fn(usize) -> Result<GenerationOutput, GenerationError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            gate: None,
            respond: Box::new(respond),
        })
    }

    pub fn replying(content: &'static str) -> Arc<Self> {
        Self::new(move |_| Ok(output(content)))
    }

    /// Every call waits for one permit on `gate`.
    pub fn gated(content: &'static str, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            gate: Some(gate),
            respond: Box::new(move |_| Ok(output(content))),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for CountingGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        (self.respond)(call)
    }
}

pub fn article(url: &str) -> ScrapedContent {
    ScrapedContent {
        title: "Tides Explained".to_string(),
        content: "The moon pulls on the oceans and the water bulges toward it.".to_string(),
        url: url.to_string(),
        metadata: ContentMetadata {
            word_count: 12,
            ..Default::default()
        },
    }
}

pub fn output(content: &str) -> GenerationOutput {
    GenerationOutput {
        content: content.to_string(),
        usage: Some(TokenUsage {
            prompt_tokens: 40,
            completion_tokens: 20,
            total_tokens: 60,
        }),
        finish_reason: Some("stop".to_string()),
    }
}

pub struct Harness {
    pub service: Arc<TransformationService>,
    pub usage: Arc<InMemoryUsageTracker>,
}

pub fn harness(source: Arc<dyn ContentSource>, generator: Arc<dyn Generator>) -> Harness {
    let usage = Arc::new(InMemoryUsageTracker::new());
    let pipeline = TransformationPipeline::new(
        PipelineCaches::new(),
        source,
        generator,
        Arc::new(InMemoryPersonaRegistry::with_defaults()),
        usage.clone(),
    );
    Harness {
        service: Arc::new(TransformationService::new(Arc::new(pipeline), 50_000)),
        usage,
    }
}
