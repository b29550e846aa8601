//! Bounded worker pool for per-job passes.
//!
//! Every job runs under its own cancellation token, the per-job lock and, unless disabled,
//! a deadline.
//! Results come back unordered; a failing job never aborts the others.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::store::{JobLock, LockToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
    Conflict,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome<T> {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retryable: bool,
}

impl<T> JobOutcome<T> {
    pub fn from_result(job_id: String, result: Result<T, AppError>) -> Self {
        match result {
            Ok(value) => Self {
                job_id,
                status: JobStatus::Succeeded,
                result: Some(value),
                error: None,
                retryable: false,
            },
            Err(e) => {
                let status = match &e {
                    AppError::Cancelled(_) => JobStatus::Cancelled,
                    AppError::TimedOut(_) => JobStatus::TimedOut,
                    AppError::Conflict(_) => JobStatus::Conflict,
                    _ => JobStatus::Failed,
                };
                Self {
                    job_id,
                    status,
                    result: None,
                    error: Some(e.to_string()),
                    retryable: e.is_retryable(),
                }
            }
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == JobStatus::Succeeded
    }
}

type TokenMap = Arc<Mutex<HashMap<String, CancellationToken>>>;

fn remove_token(tokens: &TokenMap, job_id: &str) {
    tokens
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(job_id);
}

async fn release_lock(lock: &dyn JobLock, held: LockToken) {
    let job_id = held.job_id.clone();
    if let Err(e) = lock.release(held).await {
        warn!("Failed to release lock for job {job_id}: {e}");
    }
}

/// A job's slot in the token map plus, once taken, its lock.
///
/// `finish` frees both. A guard dropped without it (caller went away, task aborted
/// or panicked) frees them from a background task instead.
struct JobGuard {
    job_id: String,
    token: CancellationToken,
    tokens: TokenMap,
    lock: Arc<dyn JobLock>,
    held: Option<LockToken>,
    finished: bool,
}

impl JobGuard {
    async fn finish(mut self) {
        self.finished = true;
        if let Some(held) = self.held.take() {
            release_lock(self.lock.as_ref(), held).await;
        }
        remove_token(&self.tokens, &self.job_id);
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("Job {} abandoned mid-pass, freeing it", self.job_id);
        self.token.cancel();

        let held = self.held.take();
        let tokens = self.tokens.clone();
        let lock = self.lock.clone();
        let job_id = std::mem::take(&mut self.job_id);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Some(held) = held {
                        release_lock(lock.as_ref(), held).await;
                    }
                    remove_token(&tokens, &job_id);
                });
            }
            // no runtime left to release on; the lock TTL covers it
            Err(_) => remove_token(&tokens, &job_id),
        }
    }
}

#[derive(Clone)]
pub struct BatchRunner {
    permits: Arc<Semaphore>,
    tokens: TokenMap,
    lock: Arc<dyn JobLock>,
    job_timeout: Option<Duration>,
}

impl BatchRunner {
    pub fn new(max_concurrency: usize, lock: Arc<dyn JobLock>, job_timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
            tokens: Arc::new(Mutex::new(HashMap::new())),
            lock,
            job_timeout: Some(job_timeout),
        }
    }

    /// No per-job deadline. For passes paced by an operator rather than by the ports.
    pub fn without_deadline(mut self) -> Self {
        self.job_timeout = None;
        self
    }

    /// Runs `work` for each distinct job id, at most `max_concurrency` at a time.
    pub async fn run<T, F, Fut>(&self, job_ids: Vec<String>, work: F) -> Vec<JobOutcome<T>>
    where
        T: Send + 'static,
        F: Fn(String) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        let mut seen = HashSet::new();
        let job_ids: Vec<String> = job_ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        info!("Batch of {} jobs starting", job_ids.len());

        let mut outcomes = Vec::with_capacity(job_ids.len());
        let mut set = JoinSet::new();

        for job_id in job_ids {
            let mut guard = match self.register(&job_id) {
                Ok(guard) => guard,
                Err(e) => {
                    outcomes.push(JobOutcome::from_result(job_id, Err(e)));
                    continue;
                }
            };
            let runner = self.clone();
            let work = work.clone();
            set.spawn(async move {
                let result = runner.guarded(&mut guard, work(job_id.clone())).await;
                guard.finish().await;
                JobOutcome::from_result(job_id, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => {
                    if !outcome.succeeded() {
                        warn!(
                            "Job {} ended {:?}: {}",
                            outcome.job_id,
                            outcome.status,
                            outcome.error.as_deref().unwrap_or("")
                        );
                    }
                    outcomes.push(outcome);
                }
                Err(e) => error!("Batch worker panicked: {e}"),
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        info!("Batch finished: {succeeded}/{} succeeded", outcomes.len());
        outcomes
    }

    /// Runs a single job under the same guards and returns its result directly.
    pub async fn run_one<T, Fut>(&self, job_id: &str, work: Fut) -> Result<T, AppError>
    where
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut guard = self.register(job_id)?;
        let result = self.guarded(&mut guard, work).await;
        guard.finish().await;
        result
    }

    /// Cancels a running job. Returns `false` when nothing is running under that id.
    pub fn cancel(&self, job_id: &str) -> bool {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        match tokens.get(job_id) {
            Some(token) => {
                info!("Cancelling job {job_id}");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn running(&self) -> Vec<String> {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn register(&self, job_id: &str) -> Result<JobGuard, AppError> {
        let mut tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        if tokens.contains_key(job_id) {
            return Err(AppError::Conflict(format!(
                "Job {job_id} is already being processed"
            )));
        }
        let token = CancellationToken::new();
        tokens.insert(job_id.to_string(), token.clone());
        Ok(JobGuard {
            job_id: job_id.to_string(),
            token,
            tokens: self.tokens.clone(),
            lock: self.lock.clone(),
            held: None,
            finished: false,
        })
    }

    async fn guarded<T, Fut>(&self, guard: &mut JobGuard, work: Fut) -> Result<T, AppError>
    where
        Fut: Future<Output = Result<T, AppError>>,
    {
        let job_id = guard.job_id.clone();
        let token = guard.token.clone();

        let _permit = tokio::select! {
            _ = token.cancelled() => {
                return Err(AppError::Cancelled(format!("Job {job_id} cancelled while queued")));
            }
            permit = self.permits.acquire() => permit
                .map_err(|e| AppError::Internal(anyhow::anyhow!("worker pool closed: {e}")))?,
        };

        let held = self.lock.try_acquire(&job_id).await?.ok_or_else(|| {
            AppError::Conflict(format!("Job {job_id} is locked by another pass"))
        })?;
        guard.held = Some(held);

        let deadline = async {
            match self.job_timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(result) => result,
                    Err(_) => Err(AppError::TimedOut(format!("Job {job_id} exceeded {limit:?}"))),
                },
                None => work.await,
            }
        };

        tokio::select! {
            _ = token.cancelled() => Err(AppError::Cancelled(format!("Job {job_id} cancelled"))),
            result = deadline => result,
        }
    }
}
