//! Per-user usage accounting.
//!
//! The pipeline reports delivered transformations and failed attempts here.
//! Calls are fire-and-forget from the pipeline's point of view: an error is
//! logged by the caller and never changes the outcome of a transformation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// What kind of input a usage record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Webpage,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    pub persona_id: String,
    pub source: SourceKind,
    /// Served from the transform cache without new work.
    pub cached: bool,
    pub total_tokens: Option<u32>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UsageTracker: Send + Sync {
    async fn increment_usage(&self, user_id: &str, event: UsageEvent) -> Result<()>;
    async fn increment_failed_attempt(&self, user_id: &str, event: UsageEvent) -> Result<()>;
}

/// Running totals for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUsage {
    pub transformations: u64,
    pub cached_transformations: u64,
    pub failed_attempts: u64,
    pub tokens: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Process-local tracker keyed by user id.
#[derive(Debug, Default)]
pub struct InMemoryUsageTracker {
    store: DashMap<String, UserUsage>,
}

impl InMemoryUsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn usage_for(&self, user_id: &str) -> Option<UserUsage> {
        self.store.get(user_id).map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl UsageTracker for InMemoryUsageTracker {
    async fn increment_usage(&self, user_id: &str, event: UsageEvent) -> Result<()> {
        let mut entry = self.store.entry(user_id.to_string()).or_default();
        let usage = entry.value_mut();
        usage.transformations += 1;
        if event.cached {
            usage.cached_transformations += 1;
        }
        usage.tokens += u64::from(event.total_tokens.unwrap_or(0));
        usage.last_activity = Some(Utc::now());
        Ok(())
    }

    async fn increment_failed_attempt(&self, user_id: &str, _event: UsageEvent) -> Result<()> {
        let mut entry = self.store.entry(user_id.to_string()).or_default();
        let usage = entry.value_mut();
        usage.failed_attempts += 1;
        usage.last_activity = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(cached: bool, tokens: Option<u32>) -> UsageEvent {
        UsageEvent {
            persona_id: "eli5".to_string(),
            source: SourceKind::Webpage,
            cached,
            total_tokens: tokens,
        }
    }

    #[tokio::test]
    async fn test_accumulates_per_user() {
        let tracker = InMemoryUsageTracker::new();
        tracker.increment_usage("u1", event(false, Some(120))).await.unwrap();
        tracker.increment_usage("u1", event(true, None)).await.unwrap();
        tracker.increment_failed_attempt("u1", event(false, None)).await.unwrap();
        tracker.increment_usage("u2", event(false, Some(5))).await.unwrap();

        let u1 = tracker.usage_for("u1").unwrap();
        assert_eq!(u1.transformations, 2);
        assert_eq!(u1.cached_transformations, 1);
        assert_eq!(u1.failed_attempts, 1);
        assert_eq!(u1.tokens, 120);
        assert!(u1.last_activity.is_some());

        assert_eq!(tracker.usage_for("u2").unwrap().tokens, 5);
        assert!(tracker.usage_for("nobody").is_none());
    }
}
