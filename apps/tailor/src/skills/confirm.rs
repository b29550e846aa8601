//! Human-confirmation reconciliation: an operator confirms or replaces every extracted skill.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::errors::AppError;
use crate::fit::FitPredicate;
use crate::human::HumanInterface;
use crate::llm_client::prompts::split_items;
use crate::llm_client::{PromptKind, TextCompletion};
use crate::models::skill::skill_key;
use crate::retry::RetryPolicy;
use crate::skills::reconcile::extract_candidates;
use crate::skills::Reconciled;
use crate::store::{JobStore, SkillStore};

pub struct SkillConfirmer {
    completion: Arc<dyn TextCompletion>,
    skills: Arc<dyn SkillStore>,
    jobs: Arc<dyn JobStore>,
    human: Arc<dyn HumanInterface>,
    fit: Arc<dyn FitPredicate>,
    limit_em: f32,
    completion_retry: RetryPolicy,
    prompt_retry: RetryPolicy,
}

impl SkillConfirmer {
    pub fn new(
        completion: Arc<dyn TextCompletion>,
        skills: Arc<dyn SkillStore>,
        jobs: Arc<dyn JobStore>,
        human: Arc<dyn HumanInterface>,
        fit: Arc<dyn FitPredicate>,
        config: &Config,
    ) -> Self {
        Self {
            completion,
            skills,
            jobs,
            human,
            fit,
            limit_em: config.limits.skill_em,
            completion_retry: config.completion_retry(),
            prompt_retry: config.prompt_retry(),
        }
    }

    /// Walks the extracted candidates with the operator. The job's list is written
    /// only once every candidate is resolved.
    pub async fn confirm_job(&self, job_id: &str) -> Result<Reconciled, AppError> {
        let job = self.jobs.get_job(job_id).await?;
        let description = job
            .description_text()
            .ok_or_else(|| AppError::NotFound(format!("Job {job_id} has no description")))?;

        let candidates =
            extract_candidates(self.completion.as_ref(), &self.completion_retry, description)
                .await?;

        let title = job.role.as_deref().unwrap_or("untitled role");
        self.human
            .show(&format!("Confirming skills for job {job_id} ({title})"))
            .await?;

        let mut confirmed: Vec<String> = Vec::with_capacity(candidates.len());
        let mut added = Vec::new();
        for (position, candidate) in candidates.iter().enumerate() {
            self.human
                .show(&format!(
                    "[{}/{}] {candidate}",
                    position + 1,
                    candidates.len()
                ))
                .await?;
            let skill = self.confirm_one(candidate, &confirmed).await?;
            if self.skills.add(&skill).await? {
                added.push(skill.clone());
            }
            confirmed.push(skill);
        }

        self.jobs.set_skills(job_id, &confirmed).await?;
        info!(
            "Job {job_id} confirmed by operator: {} skills, {} new canonical",
            confirmed.len(),
            added.len()
        );
        Ok(Reconciled {
            job_id: job_id.to_string(),
            skills: confirmed,
            added,
        })
    }

    /// Asks about the candidate, then about each typed replacement, until the operator
    /// confirms one.
    async fn confirm_one(&self, candidate: &str, confirmed: &[String]) -> Result<String, AppError> {
        let mut budget = self.prompt_retry.budget("skill confirmation");
        let mut current = candidate.to_string();
        loop {
            if is_taken(&current, confirmed) {
                self.human
                    .show(&format!("'{current}' is already in this job's list"))
                    .await?;
            } else if self
                .human
                .confirm(&format!("Do you have the skill '{current}'?"))
                .await?
            {
                return self.fit_to_width(current, confirmed).await;
            }
            budget.spend(format!("'{current}' was not confirmed"))?;

            let suggestions = self.suggest(PromptKind::SkillReplacement, &current).await?;
            self.human
                .show(&format!(
                    "Alternatives to '{current}': {}",
                    suggestions.join(", ")
                ))
                .await?;
            current = self.prompt_label("Replacement skill", confirmed).await?;
        }
    }

    /// Re-prompts until the operator types a non-empty label not yet in the job's list.
    async fn prompt_label(&self, label: &str, confirmed: &[String]) -> Result<String, AppError> {
        let mut budget = self.prompt_retry.budget("skill entry");
        loop {
            let typed = self.human.prompt_text(label).await?;
            let typed = typed.trim();
            let problem = if typed.is_empty() {
                "a skill cannot be empty".to_string()
            } else if is_taken(typed, confirmed) {
                format!("'{typed}' is already in this job's list")
            } else {
                return Ok(typed.to_string());
            };
            self.human.show(&problem).await?;
            budget.spend(problem)?;
        }
    }

    async fn fit_to_width(&self, label: String, confirmed: &[String]) -> Result<String, AppError> {
        let mut label = label;
        let mut budget = self.prompt_retry.budget("skill width");
        while !self.fit.fits(&label, self.limit_em) {
            budget.spend(format!("'{label}' is too wide for the skills column"))?;
            let shorter = self.suggest(PromptKind::ShorterSkill, &label).await?;
            self.human
                .show(&format!(
                    "'{label}' is too long. Shorter options: {}",
                    shorter.join(", ")
                ))
                .await?;
            label = self.prompt_label("Shorter skill", confirmed).await?;
        }
        Ok(label)
    }

    async fn suggest(&self, kind: PromptKind, skill: &str) -> Result<Vec<String>, AppError> {
        let text = self
            .completion
            .complete(kind, skill, kind.default_temperature())
            .await?;
        Ok(split_items(&text))
    }
}

fn is_taken(label: &str, confirmed: &[String]) -> bool {
    let key = skill_key(label);
    confirmed.iter().any(|s| skill_key(s) == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::job::JobPosting;
    use crate::store::memory::{MemoryJobStore, MemorySkillStore};
    use crate::testing::{labels, test_config, AcceptAllFit, ScriptedCompletion, ScriptedHuman, WidthFit};

    struct Fixture {
        confirmer: SkillConfirmer,
        human: Arc<ScriptedHuman>,
        skills: Arc<MemorySkillStore>,
        jobs: Arc<MemoryJobStore>,
    }

    fn fixture(
        completion: ScriptedCompletion,
        answers: Vec<String>,
        fit: Arc<dyn FitPredicate>,
    ) -> Fixture {
        let human = Arc::new(ScriptedHuman::new(answers));
        let skills = Arc::new(MemorySkillStore::default());
        let jobs = Arc::new(MemoryJobStore::with_jobs([JobPosting::new(
            "job-7",
            "Platform engineer, lots of buzzwords.",
        )]));
        let confirmer = SkillConfirmer::new(
            Arc::new(completion),
            skills.clone(),
            jobs.clone(),
            human.clone(),
            fit,
            &test_config(),
        );
        Fixture {
            confirmer,
            human,
            skills,
            jobs,
        }
    }

    fn yes(count: usize) -> Vec<String> {
        vec!["yes".to_string(); count]
    }

    #[tokio::test]
    async fn test_rejected_skill_is_replaced_by_typed_entry() {
        let completion = ScriptedCompletion::new()
            .reply_list(PromptKind::SkillExtraction, &labels("Skill", 15))
            .reply_list(PromptKind::SkillReplacement, &["Rust", "Go"]);
        let mut answers = yes(2);
        answers.extend(["no".to_string(), "Rust".to_string()]);
        answers.extend(yes(13));
        let f = fixture(completion, answers, Arc::new(AcceptAllFit));

        let result = f.confirmer.confirm_job("job-7").await.unwrap();

        assert_eq!(result.skills.len(), 15);
        assert_eq!(result.skills[2], "Rust");
        assert_eq!(f.skills.len().await, 15);
        assert!(f.human.shown().iter().any(|s| s.contains("Rust, Go")));
        assert_eq!(
            f.jobs.get_job("job-7").await.unwrap().skills,
            Some(result.skills)
        );
    }

    #[tokio::test]
    async fn test_typed_replacement_must_be_confirmed_too() {
        let completion = ScriptedCompletion::new()
            .reply_list(PromptKind::SkillExtraction, &labels("Skill", 15))
            .reply_list(PromptKind::SkillReplacement, &["Rust"])
            .reply_list(PromptKind::SkillReplacement, &["Go"]);
        let mut answers: Vec<String> = ["no", "Rust", "no", "Go"].map(String::from).to_vec();
        answers.extend(yes(15));
        let f = fixture(completion, answers, Arc::new(AcceptAllFit));

        let result = f.confirmer.confirm_job("job-7").await.unwrap();

        assert_eq!(result.skills[0], "Go");
        let asked = f.human.asked();
        assert!(asked.iter().any(|q| q == "Do you have the skill 'Rust'?"));
        assert!(asked.iter().any(|q| q == "Do you have the skill 'Go'?"));
        assert!(!f.skills.contains("rust").await.unwrap());
        assert_eq!(f.human.remaining(), 0);
    }

    #[tokio::test]
    async fn test_rejecting_every_replacement_exhausts_the_budget() {
        let completion = ScriptedCompletion::new()
            .reply_list(PromptKind::SkillExtraction, &labels("Skill", 15))
            .reply_list(PromptKind::SkillReplacement, &["Rust"])
            .reply_list(PromptKind::SkillReplacement, &["Go"]);
        let answers = ["no", "Rust", "no", "Go", "no"].map(String::from).to_vec();
        let f = fixture(completion, answers, Arc::new(AcceptAllFit));

        let err = f.confirmer.confirm_job("job-7").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::RetriesExhausted {
                stage: "skill confirmation",
                ..
            }
        ));
        assert!(f.jobs.get_job("job-7").await.unwrap().skills.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_replacement_is_re_prompted() {
        let completion = ScriptedCompletion::new()
            .reply_list(PromptKind::SkillExtraction, &labels("Skill", 15))
            .reply_list(PromptKind::SkillReplacement, &["Go"]);
        let mut answers = yes(1);
        // "maybe" is not an answer; the question is asked again
        answers.extend(["maybe", "no", "skill 1", "Go"].map(String::from));
        answers.extend(yes(14));
        let f = fixture(completion, answers, Arc::new(AcceptAllFit));

        let result = f.confirmer.confirm_job("job-7").await.unwrap();
        assert_eq!(result.skills[1], "Go");
        assert!(f
            .human
            .shown()
            .iter()
            .any(|s| s == "'skill 1' is already in this job's list"));
        assert_eq!(f.human.remaining(), 0);
    }

    #[tokio::test]
    async fn test_too_wide_skill_is_shortened_by_operator() {
        let mut extracted = labels("Skill", 15);
        extracted[0] = "Distributed Systems".to_string();
        let completion = ScriptedCompletion::new()
            .reply_list(PromptKind::SkillExtraction, &extracted)
            .reply_list(PromptKind::ShorterSkill, &["Dist Sys", "DS"]);
        let mut answers = yes(1);
        answers.push("Dist Sys".to_string());
        answers.extend(yes(14));
        let f = fixture(completion, answers, Arc::new(WidthFit { max_chars: 8 }));

        let result = f.confirmer.confirm_job("job-7").await.unwrap();
        assert_eq!(result.skills[0], "Dist Sys");
        assert!(f.skills.contains("dist sys").await.unwrap());
        assert!(!f.skills.contains("Distributed Systems").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_entries_exhaust_the_prompt_budget() {
        let completion = ScriptedCompletion::new()
            .reply_list(PromptKind::SkillExtraction, &labels("Skill", 15))
            .reply_list(PromptKind::SkillReplacement, &["Go"]);
        let answers = ["no", "", " ", ""].map(String::from).to_vec();
        let f = fixture(completion, answers, Arc::new(AcceptAllFit));

        let err = f.confirmer.confirm_job("job-7").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::RetriesExhausted {
                stage: "skill entry",
                ..
            }
        ));
        assert!(f.jobs.get_job("job-7").await.unwrap().skills.is_none());
    }
}
