pub mod keys;
pub mod store;

pub use keys::{text_key, text_transform_key, url_key, webpage_transform_key};
pub use store::{CachePolicy, CacheStats, CacheStore};

use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{extractor::ScrapedContent, transform::TransformationResult};

/// The two process-wide cache tiers shared by every request.
#[derive(Debug, Clone)]
pub struct PipelineCaches {
    pub content: Arc<CacheStore<ScrapedContent>>,
    pub transform: Arc<CacheStore<TransformationResult>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineCacheStats {
    pub content: CacheStats,
    pub transform: CacheStats,
}

impl PipelineCaches {
    pub fn new() -> Self {
        Self::with_policies(CachePolicy::content(), CachePolicy::transform())
    }

    pub fn with_policies(content: CachePolicy, transform: CachePolicy) -> Self {
        Self {
            content: Arc::new(CacheStore::new("content", content)),
            transform: Arc::new(CacheStore::new("transform", transform)),
        }
    }

    pub fn stats(&self) -> PipelineCacheStats {
        PipelineCacheStats {
            content: self.content.stats(),
            transform: self.transform.stats(),
        }
    }

    /// Starts one sweeper per tier, each on its own policy's interval.
    pub fn spawn_sweepers(&self, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        vec![
            self.content.spawn_sweeper(shutdown.clone()),
            self.transform.spawn_sweeper(shutdown),
        ]
    }
}

impl Default for PipelineCaches {
    fn default() -> Self {
        Self::new()
    }
}
