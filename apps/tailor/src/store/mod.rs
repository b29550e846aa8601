//! Storage ports used by the engines, plus their PostgreSQL and in-memory backends.
//!
//! Engines only see the traits; `AppState` carries them as `Arc<dyn …>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::bullet::{BulletRecord, NewBullet};
use crate::models::job::JobPosting;

pub mod lock;
pub mod memory;
pub mod postgres;

pub use lock::{JobLock, LockToken};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fails with `AppError::NotFound` when the posting does not exist.
    async fn get_job(&self, job_id: &str) -> Result<JobPosting, AppError>;

    /// Replaces the whole skill list in one write.
    async fn set_skills(&self, job_id: &str, skills: &[String]) -> Result<(), AppError>;

    async fn mark_tailored(&self, job_id: &str) -> Result<(), AppError>;

    /// Ids of postings that have a description but no skills yet.
    async fn jobs_missing_skills(&self) -> Result<Vec<String>, AppError>;

    /// Postings with skills that have not been tailored and are not general postings.
    async fn untailored_jobs(&self) -> Result<Vec<JobPosting>, AppError>;

    /// Copies an existing skill list onto postings with the same company and role
    /// that have none. Returns the number of postings updated.
    async fn propagate_skills(&self) -> Result<u64, AppError>;
}

/// The canonical skill set. Grows monotonically; `add` is idempotent on the case-folded label.
#[async_trait]
pub trait SkillStore: Send + Sync {
    async fn contains(&self, label: &str) -> Result<bool, AppError>;

    /// Returns `true` when the label was new.
    async fn add(&self, label: &str) -> Result<bool, AppError>;

    async fn list_all(&self) -> Result<Vec<String>, AppError>;
}

#[async_trait]
pub trait BulletRepository: Send + Sync {
    /// Every bullet of the given skills; `skill_rank` is the skill's 1-based position in `skills`.
    async fn query_by_skills(&self, skills: &[String]) -> Result<Vec<BulletRecord>, AppError>;

    /// Stamps `at` as last-referenced on every bullet whose text is in `texts`, across all skills.
    async fn bulk_touch_by_text(&self, texts: &[String], at: DateTime<Utc>)
        -> Result<u64, AppError>;

    /// Fails with `AppError::NotFound` when the skill is not canonical.
    async fn append_bullets(
        &self,
        skill: &str,
        bullets: &[NewBullet],
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn skills_missing_bullets(&self) -> Result<Vec<String>, AppError>;
}

/// What resume assembly consumes for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeDraft {
    pub job_id: String,
    pub company: Option<String>,
    pub role: Option<String>,
    pub profile: String,
    pub skills: Vec<String>,
    pub bullets: Vec<String>,
}

#[async_trait]
pub trait ResumeAssembler: Send + Sync {
    async fn assemble(&self, draft: &ResumeDraft) -> Result<(), AppError>;
}
