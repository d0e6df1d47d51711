use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

use crate::{
    cache::{text_transform_key, webpage_transform_key},
    transform::{ErrorCode, TextRequest, TransformationResult, WebpageRequest},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Webpage,
    Text,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webpage => "webpage",
            Self::Text => "text",
        }
    }
}

impl Display for JobKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work reported while a job runs. Generation completes whatever is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    Scrape,
    Clean,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobState {
    Created,
    Running {
        stage: JobStage,
        percent: u8,
    },
    Completed {
        result: TransformationResult,
        cached: bool,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        reason: String,
        error_code: ErrorCode,
    },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Failed { .. })
    }
}

/// Point-in-time view of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: Uuid,
    pub kind: JobKind,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    Webpage(WebpageRequest),
    Text(TextRequest),
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Webpage(_) => JobKind::Webpage,
            Self::Text(_) => JobKind::Text,
        }
    }

    /// Identifies identical work: same input, persona and mode.
    pub fn lock_key(&self) -> String {
        match self {
            Self::Webpage(req) => webpage_transform_key(&req.url, &req.persona),
            Self::Text(req) => text_transform_key(&req.text, &req.persona),
        }
    }

    pub fn persona(&self) -> &str {
        match self {
            Self::Webpage(req) => &req.persona,
            Self::Text(req) => &req.persona,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::Webpage(req) => req.user_id.as_deref(),
            Self::Text(req) => req.user_id.as_deref(),
        }
    }
}

/// How a submission was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSubmission {
    /// Answered from the transform cache; no job was created.
    Cached(TransformationResult),
    Started(Uuid),
    /// Identical work is already in flight under this id.
    AlreadyRunning(Uuid),
}

impl JobSubmission {
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Self::Cached(_) => None,
            Self::Started(id) | Self::AlreadyRunning(id) => Some(*id),
        }
    }
}
