//! Autonomous reconciliation: extraction → missing-skill resolution → capitalization.

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::AppError;
use crate::llm_client::prompts::{join_items, skill_collection_input, split_items_raw};
use crate::llm_client::{PromptKind, TextCompletion};
use crate::models::skill::SkillSnapshot;
use crate::retry::{Attempt, RetryPolicy};
use crate::skills::validation::{check_capitalization, check_extraction, check_replacements};
use crate::skills::Reconciled;
use crate::store::{JobStore, SkillStore};

/// Asks for the job's 15 skills until a valid batch comes back.
pub async fn extract_candidates(
    completion: &dyn TextCompletion,
    retry: &RetryPolicy,
    description: &str,
) -> Result<Vec<String>, AppError> {
    retry
        .run("skill extraction", |_| async move {
            let kind = PromptKind::SkillExtraction;
            let text = completion
                .complete(kind, description, kind.default_temperature())
                .await?;
            Ok::<_, AppError>(match check_extraction(split_items_raw(&text)) {
                Ok(candidates) => Attempt::Done(candidates),
                Err(problem) => Attempt::Mismatch(problem),
            })
        })
        .await
}

/// One position of the job's skill list.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// Already canonical; holds the store's spelling.
    Kept(String),
    /// Needs a replacement; holds the extracted candidate.
    Missing(String),
}

/// Candidates partitioned against one store snapshot. Replacements are mapped back
/// by slot position, so repeated candidate strings cannot be confused.
#[derive(Debug, Clone)]
struct ResolutionPlan {
    slots: Vec<Slot>,
}

impl ResolutionPlan {
    fn partition(candidates: &[String], snapshot: &SkillSnapshot) -> Self {
        let slots = candidates
            .iter()
            .map(|candidate| match snapshot.canonical(candidate) {
                Some(stored) => Slot::Kept(stored.to_string()),
                None => Slot::Missing(candidate.clone()),
            })
            .collect();
        Self { slots }
    }

    fn kept(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Kept(label) => Some(label.clone()),
                Slot::Missing(_) => None,
            })
            .collect()
    }

    fn missing(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Missing(candidate) => Some(candidate.clone()),
                Slot::Kept(_) => None,
            })
            .collect()
    }

    /// Fills missing slots with `replacements`, which are in slot order.
    fn apply(self, replacements: Vec<String>) -> Resolution {
        let mut replacements = replacements.into_iter();
        let mut skills = Vec::with_capacity(self.slots.len());
        let mut new_labels = Vec::new();

        for slot in self.slots {
            match slot {
                Slot::Kept(label) => skills.push(label),
                Slot::Missing(_) => {
                    if let Some(replacement) = replacements.next() {
                        let replacement = replacement.trim().to_string();
                        new_labels.push(replacement.clone());
                        skills.push(replacement);
                    }
                }
            }
        }
        Resolution { skills, new_labels }
    }
}

#[derive(Debug)]
struct Resolution {
    skills: Vec<String>,
    new_labels: Vec<String>,
}

pub struct SkillReconciler {
    completion: Arc<dyn TextCompletion>,
    skills: Arc<dyn SkillStore>,
    jobs: Arc<dyn JobStore>,
    retry: RetryPolicy,
}

impl SkillReconciler {
    pub fn new(
        completion: Arc<dyn TextCompletion>,
        skills: Arc<dyn SkillStore>,
        jobs: Arc<dyn JobStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            completion,
            skills,
            jobs,
            retry,
        }
    }

    /// Extracts skills from the stored description, then reconciles them.
    pub async fn reconcile_job(&self, job_id: &str) -> Result<Reconciled, AppError> {
        let job = self.jobs.get_job(job_id).await?;
        let description = job
            .description_text()
            .ok_or_else(|| AppError::NotFound(format!("Job {job_id} has no description")))?;

        info!("Reconciling skills for job {job_id}");
        let candidates =
            extract_candidates(self.completion.as_ref(), &self.retry, description).await?;
        self.resolve(job_id, candidates).await
    }

    /// Reconciles caller-supplied candidates; an invalid batch is a validation error, not a retry.
    pub async fn reconcile_candidates(
        &self,
        job_id: &str,
        raw: &[String],
    ) -> Result<Reconciled, AppError> {
        self.jobs.get_job(job_id).await?;
        let candidates = check_extraction(raw.to_vec()).map_err(AppError::Validation)?;
        info!("Reconciling {} given skills for job {job_id}", candidates.len());
        self.resolve(job_id, candidates).await
    }

    async fn resolve(&self, job_id: &str, candidates: Vec<String>) -> Result<Reconciled, AppError> {
        let resolution = self.resolve_missing(job_id, &candidates).await?;

        let mut added = Vec::new();
        for label in &resolution.new_labels {
            if self.skills.add(label).await? {
                added.push(label.clone());
            }
        }

        let skills = self.capitalize(&resolution.skills).await?;
        self.jobs.set_skills(job_id, &skills).await?;

        info!(
            "Job {job_id} reconciled: {} skills, {} new canonical",
            skills.len(),
            added.len()
        );
        Ok(Reconciled {
            job_id: job_id.to_string(),
            skills,
            added,
        })
    }

    async fn resolve_missing(
        &self,
        job_id: &str,
        candidates: &[String],
    ) -> Result<Resolution, AppError> {
        let completion = self.completion.as_ref();
        let skills = self.skills.as_ref();

        self.retry
            .run("skill collection", |attempt| async move {
                // fresh snapshot per attempt: other jobs may have grown the store meanwhile
                let snapshot = SkillSnapshot::from_labels(skills.list_all().await?);
                let plan = ResolutionPlan::partition(candidates, &snapshot);
                let missing = plan.missing();
                if missing.is_empty() {
                    return Ok(Attempt::Done(plan.apply(Vec::new())));
                }

                let kept = plan.kept();
                debug!(
                    "Job {job_id} attempt {attempt}: {} missing, {} kept, store has {}",
                    missing.len(),
                    kept.len(),
                    snapshot.len()
                );

                let kind = PromptKind::SkillCollection;
                let input = skill_collection_input(&missing, &kept, &snapshot.labels());
                let text = completion
                    .complete(kind, &input, kind.default_temperature())
                    .await?;

                let mut replacements = split_items_raw(&text);
                while replacements.last().is_some_and(|s| s.is_empty()) {
                    replacements.pop();
                }
                Ok::<_, AppError>(
                    match check_replacements(&replacements, missing.len(), &kept, &snapshot) {
                        Ok(()) => Attempt::Done(plan.apply(replacements)),
                        Err(problem) => Attempt::Mismatch(problem),
                    },
                )
            })
            .await
    }

    async fn capitalize(&self, skills: &[String]) -> Result<Vec<String>, AppError> {
        let completion = self.completion.as_ref();
        let input = join_items(skills);
        let input = input.as_str();

        self.retry
            .run("skill capitalization", |_| async move {
                let kind = PromptKind::SkillCapitalization;
                let text = completion
                    .complete(kind, input, kind.default_temperature())
                    .await?;
                let output: Vec<String> = split_items_raw(&text);
                Ok::<_, AppError>(match check_capitalization(skills, &output) {
                    Ok(()) => Attempt::Done(output),
                    Err(problem) => Attempt::Mismatch(problem),
                })
            })
            .await
    }
}
