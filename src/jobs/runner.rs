use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use std::{sync::Arc, time::Duration};
use tokio::sync::{Semaphore, watch};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::{
    jobs::entities::{JobRequest, JobSnapshot, JobStage, JobState, JobSubmission},
    transform::{
        ErrorCode, TransformationResult, TransformationService, TransformationServiceResult,
    },
};

const STARTED_PERCENT: u8 = 10;

type JobMap = DashMap<Uuid, watch::Sender<JobSnapshot>>;

/// Runs transformations outside the caller's lifetime.
///
/// Jobs are not cancellable: once started a job runs to completion or
/// failure so the result lands in the transform cache for the next caller.
/// At most one job runs per lock key; a second identical submission gets the
/// id of the one already in flight.
#[derive(Clone)]
pub struct JobRunner {
    service: Arc<TransformationService>,
    jobs: Arc<JobMap>,
    locks: Arc<DashMap<String, Uuid>>,
    semaphore: Arc<Semaphore>,
}

impl JobRunner {
    pub fn new(service: Arc<TransformationService>, concurrency: usize) -> Self {
        Self {
            service,
            jobs: Arc::new(DashMap::new()),
            locks: Arc::new(DashMap::new()),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub async fn submit(&self, request: JobRequest) -> JobSubmission {
        if let Some(result) = self.cached(&request).await {
            info!(kind = %request.kind(), persona = request.persona(), "answered from cache");
            return JobSubmission::Cached(result);
        }

        let key = request.lock_key();
        let kind = request.kind();
        let id = match self.locks.entry(key.clone()) {
            Entry::Occupied(existing) => {
                let id = *existing.get();
                info!(job_id = %id, "identical job already running");
                return JobSubmission::AlreadyRunning(id);
            }
            Entry::Vacant(slot) => {
                let id = Uuid::new_v4();
                let now = Utc::now();
                let (tx, _) = watch::channel(JobSnapshot {
                    id,
                    kind,
                    state: JobState::Created,
                    created_at: now,
                    updated_at: now,
                });
                self.jobs.insert(id, tx);
                slot.insert(id);
                id
            }
        };

        let guard = JobGuard {
            id,
            key,
            jobs: self.jobs.clone(),
            locks: self.locks.clone(),
        };
        let service = self.service.clone();
        let semaphore = self.semaphore.clone();

        tokio::spawn(
            async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    error!("job semaphore closed");
                    return;
                };
                info!("job started");
                let state = execute(&service, request, |stage| {
                    guard.update(JobState::Running {
                        stage,
                        percent: STARTED_PERCENT,
                    })
                })
                .await;
                match &state {
                    JobState::Failed { reason, error_code } => {
                        warn!(%error_code, reason, "job failed")
                    }
                    _ => info!("job completed"),
                }
                // Free the key before publishing so waiters can resubmit at once.
                guard.release();
                guard.update(state);
            }
            .instrument(info_span!("job", id = %id, kind = %kind)),
        );

        JobSubmission::Started(id)
    }

    pub fn status(&self, id: Uuid) -> Option<JobSnapshot> {
        self.jobs.get(&id).map(|tx| tx.borrow().clone())
    }

    /// Waits until the job reaches a terminal state.
    pub async fn wait(&self, id: Uuid) -> Option<JobSnapshot> {
        let mut rx = self.jobs.get(&id).map(|tx| tx.subscribe())?;
        if rx.wait_for(|s| s.state.is_terminal()).await.is_err() {
            // Pruned while waiting; the last value seen is all there is.
            warn!(job_id = %id, "job dropped while waiting");
        }
        let snapshot = rx.borrow().clone();
        Some(snapshot)
    }

    /// Drops terminal jobs last updated more than `older_than` ago.
    pub fn prune_finished(&self, older_than: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let before = self.jobs.len();
        self.jobs.retain(|_, tx| {
            let snapshot = tx.borrow();
            !(snapshot.state.is_terminal() && snapshot.updated_at <= cutoff)
        });
        let pruned = before.saturating_sub(self.jobs.len());
        if pruned > 0 {
            info!(pruned, "pruned finished jobs");
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    async fn cached(&self, request: &JobRequest) -> Option<TransformationResult> {
        let pipeline = self.service.pipeline();
        match request {
            JobRequest::Webpage(req) => {
                pipeline
                    .lookup_webpage(&req.url, &req.persona, request.user_id())
                    .await
            }
            JobRequest::Text(req) => {
                pipeline
                    .lookup_text(&req.text, &req.persona, request.user_id())
                    .await
            }
        }
    }
}

async fn execute(
    service: &TransformationService,
    request: JobRequest,
    mut report: impl FnMut(JobStage),
) -> JobState {
    let outcome = match request {
        JobRequest::Webpage(req) => {
            report(JobStage::Scrape);
            service.transform_webpage(req).await
        }
        JobRequest::Text(req) => {
            report(JobStage::Clean);
            service.transform_text(req).await
        }
    };
    into_state(outcome)
}

fn into_state(outcome: TransformationServiceResult) -> JobState {
    let cached = outcome.is_cached();
    match outcome {
        TransformationServiceResult {
            success: true,
            data: Some(result),
            ..
        } => JobState::Completed { result, cached },
        TransformationServiceResult {
            error, error_code, ..
        } => JobState::Failed {
            reason: error.unwrap_or_else(|| "Transformation failed".to_string()),
            error_code: error_code.unwrap_or(ErrorCode::UnknownError),
        },
    }
}

/// Owns a job's lock for the life of its task. Dropping it releases the lock
/// and, if the task died before finishing, marks the job failed.
struct JobGuard {
    id: Uuid,
    key: String,
    jobs: Arc<JobMap>,
    locks: Arc<DashMap<String, Uuid>>,
}

impl JobGuard {
    fn release(&self) {
        self.locks.remove_if(&self.key, |_, owner| *owner == self.id);
    }

    fn update(&self, state: JobState) {
        if let Some(tx) = self.jobs.get(&self.id) {
            tx.send_modify(|snapshot| {
                snapshot.state = state;
                snapshot.updated_at = Utc::now();
            });
        }
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.release();
        let unfinished = self
            .jobs
            .get(&self.id)
            .is_some_and(|tx| !tx.borrow().state.is_terminal());
        if unfinished {
            self.update(JobState::Failed {
                reason: "Job terminated before completing".to_string(),
                error_code: ErrorCode::UnknownError,
            });
        }
    }
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("jobs", &self.jobs.len())
            .field("locked_keys", &self.locks.len())
            .field("available_permits", &self.semaphore.available_permits())
            .finish()
    }
}
