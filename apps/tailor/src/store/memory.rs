//! In-memory backends for the storage ports. Used by tests and local dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::bullet::{BulletRecord, NewBullet, Verb};
use crate::models::job::JobPosting;
use crate::models::skill::skill_key;
use crate::store::{BulletRepository, JobStore, ResumeAssembler, ResumeDraft, SkillStore};

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<BTreeMap<String, JobPosting>>,
}

impl MemoryJobStore {
    pub fn with_jobs(jobs: impl IntoIterator<Item = JobPosting>) -> Self {
        Self {
            jobs: RwLock::new(jobs.into_iter().map(|j| (j.job_id.clone(), j)).collect()),
        }
    }

    pub async fn insert(&self, job: JobPosting) {
        self.jobs.write().await.insert(job.job_id.clone(), job);
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get_job(&self, job_id: &str) -> Result<JobPosting, AppError> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))
    }

    async fn set_skills(&self, job_id: &str, skills: &[String]) -> Result<(), AppError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;
        job.skills = Some(skills.to_vec());
        Ok(())
    }

    async fn mark_tailored(&self, job_id: &str) -> Result<(), AppError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;
        job.tailored = true;
        Ok(())
    }

    async fn jobs_missing_skills(&self) -> Result<Vec<String>, AppError> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.skills.is_none() && j.description.is_some())
            .map(|j| j.job_id.clone())
            .collect())
    }

    async fn untailored_jobs(&self) -> Result<Vec<JobPosting>, AppError> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| !j.tailored && !j.general && j.skills.is_some())
            .cloned()
            .collect())
    }

    async fn propagate_skills(&self) -> Result<u64, AppError> {
        let mut jobs = self.jobs.write().await;

        let mut donors: BTreeMap<(String, String), (DateTime<Utc>, Vec<String>)> = BTreeMap::new();
        for job in jobs.values() {
            if let (Some(company), Some(role), Some(skills)) = (&job.company, &job.role, &job.skills)
            {
                let key = (company.clone(), role.clone());
                let replace = donors
                    .get(&key)
                    .map_or(true, |(created, _)| job.created_at < *created);
                if replace {
                    donors.insert(key, (job.created_at, skills.clone()));
                }
            }
        }

        let mut updated = 0;
        for job in jobs.values_mut().filter(|j| j.skills.is_none()) {
            if let (Some(company), Some(role)) = (&job.company, &job.role) {
                if let Some((_, skills)) = donors.get(&(company.clone(), role.clone())) {
                    job.skills = Some(skills.clone());
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }
}

/// Keyed by `skill_key`; the write lock makes check-and-insert atomic.
#[derive(Default)]
pub struct MemorySkillStore {
    labels: RwLock<BTreeMap<String, String>>,
}

impl MemorySkillStore {
    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for label in labels {
            let label: String = label.into();
            map.entry(skill_key(&label))
                .or_insert_with(|| label.trim().to_string());
        }
        Self {
            labels: RwLock::new(map),
        }
    }

    pub async fn len(&self) -> usize {
        self.labels.read().await.len()
    }
}

#[async_trait]
impl SkillStore for MemorySkillStore {
    async fn contains(&self, label: &str) -> Result<bool, AppError> {
        Ok(self.labels.read().await.contains_key(&skill_key(label)))
    }

    async fn add(&self, label: &str) -> Result<bool, AppError> {
        let mut labels = self.labels.write().await;
        let key = skill_key(label);
        if labels.contains_key(&key) {
            return Ok(false);
        }
        labels.insert(key, label.trim().to_string());
        Ok(true)
    }

    async fn list_all(&self) -> Result<Vec<String>, AppError> {
        Ok(self.labels.read().await.values().cloned().collect())
    }
}

#[derive(Debug, Clone)]
struct StoredBullet {
    skill: String,
    verb: Verb,
    text: String,
    quality: Option<f64>,
    created_at: DateTime<Utc>,
    resume_reference: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryBulletRepository {
    skills: RwLock<BTreeMap<String, String>>,
    bullets: RwLock<Vec<StoredBullet>>,
}

impl MemoryBulletRepository {
    /// Registers a skill so bullets can be appended to it.
    pub async fn add_skill(&self, label: &str) {
        self.skills
            .write()
            .await
            .entry(skill_key(label))
            .or_insert_with(|| label.trim().to_string());
    }

    /// Seeds a graded bullet directly.
    pub async fn seed(&self, skill: &str, verb: Verb, text: &str, quality: Option<f64>) {
        self.add_skill(skill).await;
        self.bullets.write().await.push(StoredBullet {
            skill: skill_key(skill),
            verb,
            text: text.to_string(),
            quality,
            created_at: Utc::now(),
            resume_reference: None,
        });
    }

    /// Last-referenced stamp of every bullet with this text.
    pub async fn references_of(&self, text: &str) -> Vec<Option<DateTime<Utc>>> {
        self.bullets
            .read()
            .await
            .iter()
            .filter(|b| b.text == text)
            .map(|b| b.resume_reference)
            .collect()
    }
}

#[async_trait]
impl BulletRepository for MemoryBulletRepository {
    async fn query_by_skills(&self, skills: &[String]) -> Result<Vec<BulletRecord>, AppError> {
        let keys: Vec<String> = skills.iter().map(|s| skill_key(s)).collect();
        let labels = self.skills.read().await;
        let bullets = self.bullets.read().await;

        let mut records: Vec<(usize, BulletRecord)> = bullets
            .iter()
            .filter_map(|b| {
                let position = keys.iter().position(|k| *k == b.skill)?;
                Some((
                    position,
                    BulletRecord {
                        skill: labels.get(&b.skill).cloned().unwrap_or_else(|| b.skill.clone()),
                        verb: b.verb,
                        text: b.text.clone(),
                        quality: b.quality,
                        skill_rank: Some(position as i32 + 1),
                        created_at: b.created_at,
                        last_referenced: b.resume_reference,
                    },
                ))
            })
            .collect();

        // same order as the SQL query: rank, then verb, then insertion order
        records.sort_by(|(pa, a), (pb, b)| pa.cmp(pb).then(a.verb.as_str().cmp(b.verb.as_str())));
        Ok(records.into_iter().map(|(_, r)| r).collect())
    }

    async fn bulk_touch_by_text(
        &self,
        texts: &[String],
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut touched = 0;
        for bullet in self.bullets.write().await.iter_mut() {
            if texts.iter().any(|t| *t == bullet.text) {
                bullet.resume_reference = Some(at);
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn append_bullets(
        &self,
        skill: &str,
        bullets: &[NewBullet],
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let key = skill_key(skill);
        if !self.skills.read().await.contains_key(&key) {
            return Err(AppError::NotFound(format!("Skill '{skill}' not found")));
        }
        let mut stored = self.bullets.write().await;
        for bullet in bullets {
            stored.push(StoredBullet {
                skill: key.clone(),
                verb: bullet.verb,
                text: bullet.text.clone(),
                quality: None,
                created_at: at,
                resume_reference: Some(at),
            });
        }
        Ok(())
    }

    async fn skills_missing_bullets(&self) -> Result<Vec<String>, AppError> {
        let labels = self.skills.read().await;
        let bullets = self.bullets.read().await;
        Ok(labels
            .iter()
            .filter(|(key, _)| !bullets.iter().any(|b| &b.skill == *key))
            .map(|(_, label)| label.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryResumeAssembler {
    drafts: RwLock<Vec<ResumeDraft>>,
}

impl MemoryResumeAssembler {
    pub async fn drafts(&self) -> Vec<ResumeDraft> {
        self.drafts.read().await.clone()
    }
}

#[async_trait]
impl ResumeAssembler for MemoryResumeAssembler {
    /// Replaces an earlier draft for the same job.
    async fn assemble(&self, draft: &ResumeDraft) -> Result<(), AppError> {
        let mut drafts = self.drafts.write().await;
        drafts.retain(|d| d.job_id != draft.job_id);
        drafts.push(draft.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_skill_add_is_idempotent_across_case() {
        let store = MemorySkillStore::default();
        assert!(store.add("PostgreSQL").await.unwrap());
        assert!(!store.add("postgresql").await.unwrap());
        assert!(!store.add(" POSTGRESQL ").await.unwrap());
        assert_eq!(store.list_all().await.unwrap(), vec!["PostgreSQL".to_string()]);
        assert!(store.contains("postgreSQL").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_adds_keep_one_spelling() {
        let store = std::sync::Arc::new(MemorySkillStore::default());
        let mut handles = Vec::new();
        for label in ["Kafka", "kafka", "KAFKA", "Kafka"] {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.add(label).await.unwrap() }));
        }
        let mut inserted = 0;
        for h in handles {
            if h.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_job_is_not_found() {
        let store = MemoryJobStore::default();
        let err = store.get_job("404").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(matches!(
            store.set_skills("404", &[]).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_propagate_skills_copies_by_company_and_role() {
        let mut donor = JobPosting::new("1", "jd");
        donor.company = Some("Acme".into());
        donor.role = Some("Data Engineer".into());
        donor.skills = Some(vec!["Rust".into()]);
        let mut same = JobPosting::new("2", "jd");
        same.company = Some("Acme".into());
        same.role = Some("Data Engineer".into());
        let mut other = JobPosting::new("3", "jd");
        other.company = Some("Acme".into());
        other.role = Some("Analyst".into());

        let store = MemoryJobStore::with_jobs([donor, same, other]);
        assert_eq!(store.propagate_skills().await.unwrap(), 1);
        assert_eq!(
            store.get_job("2").await.unwrap().skills,
            Some(vec!["Rust".to_string()])
        );
        assert!(store.get_job("3").await.unwrap().skills.is_none());
    }

    #[tokio::test]
    async fn test_query_ranks_by_requested_order() {
        let repo = MemoryBulletRepository::default();
        repo.seed("sql", Verb::Led, "Led SQL tuning", Some(3.0)).await;
        repo.seed("rust", Verb::Built, "Built a Rust CLI", Some(4.0)).await;
        repo.seed("go", Verb::Built, "Built Go services", Some(5.0)).await;

        let records = repo
            .query_by_skills(&["Rust".to_string(), "SQL".to_string()])
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "Built a Rust CLI");
        assert_eq!(records[0].skill_rank, Some(1));
        assert_eq!(records[1].skill_rank, Some(2));
    }

    #[tokio::test]
    async fn test_append_requires_known_skill() {
        let repo = MemoryBulletRepository::default();
        let bullet = NewBullet {
            verb: Verb::Built,
            text: "Built it".into(),
        };
        let err = repo
            .append_bullets("ghost", &[bullet.clone()], Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        repo.add_skill("ghost").await;
        assert_eq!(repo.skills_missing_bullets().await.unwrap(), vec!["ghost"]);
        repo.append_bullets("Ghost", &[bullet], Utc::now())
            .await
            .unwrap();
        assert!(repo.skills_missing_bullets().await.unwrap().is_empty());
    }
}
