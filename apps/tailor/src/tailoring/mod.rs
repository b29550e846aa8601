//! Per-job tailoring: gather bullets, select 5, pick a profile, hand the draft to
//! resume assembly, then stamp the bullets and mark the job tailored.
//!
//! The per-job lifecycle is a typestate, `Unscored → Grouped → Selected → Applied`;
//! each transition consumes the previous stage.

pub mod handlers;
pub mod profile;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::bullets::aggregate::BulletPool;
use crate::bullets::interactive::pick_bullets;
use crate::bullets::scoring::{rank_candidates, select};
use crate::bullets::{prepare_skills_list, SelectedBullet};
use crate::config::Config;
use crate::errors::AppError;
use crate::human::HumanInterface;
use crate::llm_client::TextCompletion;
use crate::models::job::JobPosting;
use crate::retry::RetryPolicy;
use crate::store::{BulletRepository, JobStore, ResumeAssembler, ResumeDraft};

pub use profile::pick_profile;

// ────────────────────────────────────────────────────────────────────────────
// Lifecycle stages
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Unscored {
    job: JobPosting,
    skills: Vec<String>,
}

impl Unscored {
    /// Fails when the job has no reconciled skills yet.
    pub fn new(job: JobPosting) -> Result<Self, AppError> {
        let skills = prepare_skills_list(job.skills.as_deref().unwrap_or_default());
        if skills.is_empty() {
            return Err(AppError::Validation(format!(
                "Job {} has no skills yet",
                job.job_id
            )));
        }
        Ok(Self { job, skills })
    }

    pub async fn group(self, repo: &dyn BulletRepository) -> Result<Grouped, AppError> {
        let pool = BulletPool::gather(repo, &self.skills).await?;
        Ok(Grouped {
            job: self.job,
            skills: self.skills,
            pool,
        })
    }
}

#[derive(Debug)]
pub struct Grouped {
    job: JobPosting,
    skills: Vec<String>,
    pool: BulletPool,
}

impl Grouped {
    pub fn pool(&self) -> &BulletPool {
        &self.pool
    }

    /// Deterministic scoring and verb-diversified selection.
    pub fn score(self) -> Selected {
        let bullets = select(&rank_candidates(&self.pool.records));
        self.into_selected(bullets)
    }

    /// Operator picks verb and skill from the grouped pool.
    pub async fn pick(
        self,
        human: &dyn HumanInterface,
        retry: &RetryPolicy,
    ) -> Result<Selected, AppError> {
        let bullets = pick_bullets(human, self.pool.grouped(), retry).await?;
        Ok(self.into_selected(bullets))
    }

    fn into_selected(self, bullets: Vec<SelectedBullet>) -> Selected {
        Selected {
            job: self.job,
            skills: self.skills,
            top_skills: self.pool.skills,
            candidates: self.pool.records.len(),
            bullets,
        }
    }
}

#[derive(Debug)]
pub struct Selected {
    job: JobPosting,
    skills: Vec<String>,
    top_skills: Vec<String>,
    candidates: usize,
    bullets: Vec<SelectedBullet>,
}

impl Selected {
    pub fn job(&self) -> &JobPosting {
        &self.job
    }

    pub fn bullets(&self) -> &[SelectedBullet] {
        &self.bullets
    }

    pub fn preview(self) -> BulletPreview {
        BulletPreview {
            job_id: self.job.job_id,
            top_skills: self.top_skills,
            candidates: self.candidates,
            bullets: self.bullets,
        }
    }

    /// Hands the draft to assembly, stamps the selected texts and marks the job tailored.
    ///
    /// Marking comes last: a pass that fails earlier leaves the job untailored, and every
    /// write here is safe to repeat, so the next pass redoes all three.
    pub async fn apply(
        self,
        profile: String,
        assembler: &dyn ResumeAssembler,
        bullets: &dyn BulletRepository,
        jobs: &dyn JobStore,
    ) -> Result<Applied, AppError> {
        let texts: Vec<String> = self.bullets.iter().map(|b| b.text.clone()).collect();
        let draft = ResumeDraft {
            job_id: self.job.job_id.clone(),
            company: self.job.company.clone(),
            role: self.job.role.clone(),
            profile: profile.clone(),
            skills: self.skills.clone(),
            bullets: texts.clone(),
        };

        assembler.assemble(&draft).await?;
        let touched = bullets.bulk_touch_by_text(&texts, Utc::now()).await?;
        jobs.mark_tailored(&self.job.job_id).await?;

        info!(
            "Job {} tailored with profile '{profile}' ({touched} bullet rows stamped)",
            self.job.job_id
        );
        Ok(Applied {
            job_id: self.job.job_id,
            profile,
            skills: self.skills,
            bullets: self.bullets,
            touched,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Applied {
    pub job_id: String,
    pub profile: String,
    pub skills: Vec<String>,
    pub bullets: Vec<SelectedBullet>,
    /// Bullet rows whose last-referenced stamp was updated.
    pub touched: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulletPreview {
    pub job_id: String,
    pub top_skills: Vec<String>,
    pub candidates: usize,
    pub bullets: Vec<SelectedBullet>,
}

// ────────────────────────────────────────────────────────────────────────────
// Service
// ────────────────────────────────────────────────────────────────────────────

pub struct Tailor {
    completion: Arc<dyn TextCompletion>,
    jobs: Arc<dyn JobStore>,
    bullets: Arc<dyn BulletRepository>,
    assembler: Arc<dyn ResumeAssembler>,
    profiles: Vec<String>,
    completion_retry: RetryPolicy,
    prompt_retry: RetryPolicy,
    human: Option<Arc<dyn HumanInterface>>,
}

impl Tailor {
    pub fn new(
        completion: Arc<dyn TextCompletion>,
        jobs: Arc<dyn JobStore>,
        bullets: Arc<dyn BulletRepository>,
        assembler: Arc<dyn ResumeAssembler>,
        config: &Config,
    ) -> Self {
        Self {
            completion,
            jobs,
            bullets,
            assembler,
            profiles: config.profiles.clone(),
            completion_retry: config.completion_retry(),
            prompt_retry: config.prompt_retry(),
            human: None,
        }
    }

    /// Bullet selection is then picked by an operator instead of scored.
    pub fn with_human(mut self, human: Arc<dyn HumanInterface>) -> Self {
        self.human = Some(human);
        self
    }

    /// Scored selection for a job, without side effects.
    pub async fn preview(&self, job_id: &str) -> Result<BulletPreview, AppError> {
        let job = self.jobs.get_job(job_id).await?;
        let grouped = Unscored::new(job)?.group(self.bullets.as_ref()).await?;
        Ok(grouped.score().preview())
    }

    pub async fn tailor_job(&self, job_id: &str) -> Result<Applied, AppError> {
        let job = self.jobs.get_job(job_id).await?;
        let grouped = Unscored::new(job)?.group(self.bullets.as_ref()).await?;

        let selected = match &self.human {
            None => grouped.score(),
            Some(human) => grouped.pick(human.as_ref(), &self.prompt_retry).await?,
        };

        let profile = pick_profile(
            self.completion.as_ref(),
            selected.job().role.as_deref(),
            &self.profiles,
            &self.completion_retry,
        )
        .await?;

        selected
            .apply(
                profile,
                self.assembler.as_ref(),
                self.bullets.as_ref(),
                self.jobs.as_ref(),
            )
            .await
    }
}
