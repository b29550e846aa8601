//! PostgreSQL backends for the storage ports. Schema: `migrations/0001_init.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::bullet::{BulletRecord, BulletRow, NewBullet};
use crate::models::job::JobPosting;
use crate::models::skill::skill_key;
use crate::store::{BulletRepository, JobStore, ResumeAssembler, ResumeDraft, SkillStore};

#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn get_job(&self, job_id: &str) -> Result<JobPosting, AppError> {
        sqlx::query_as::<_, JobPosting>(
            r#"
            SELECT job_id, company, role, description, skills, tailored, general, created_at
            FROM job_postings
            WHERE job_id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))
    }

    async fn set_skills(&self, job_id: &str, skills: &[String]) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE job_postings SET skills = $2 WHERE job_id = $1")
            .bind(job_id)
            .bind(skills)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {job_id} not found")));
        }
        Ok(())
    }

    async fn mark_tailored(&self, job_id: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE job_postings SET tailored = TRUE WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Job {job_id} not found")));
        }
        Ok(())
    }

    async fn jobs_missing_skills(&self) -> Result<Vec<String>, AppError> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT job_id FROM job_postings
            WHERE skills IS NULL AND description IS NOT NULL
            ORDER BY created_at, job_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        info!("Found {} job postings without skills", ids.len());
        Ok(ids)
    }

    async fn untailored_jobs(&self) -> Result<Vec<JobPosting>, AppError> {
        let jobs = sqlx::query_as::<_, JobPosting>(
            r#"
            SELECT job_id, company, role, description, skills, tailored, general, created_at
            FROM job_postings
            WHERE tailored = FALSE AND general = FALSE AND skills IS NOT NULL
            ORDER BY created_at, job_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    async fn propagate_skills(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE job_postings AS target
            SET skills = source.skills
            FROM (
                SELECT DISTINCT ON (company, role) company, role, skills
                FROM job_postings
                WHERE skills IS NOT NULL AND company IS NOT NULL AND role IS NOT NULL
                ORDER BY company, role, created_at
            ) AS source
            WHERE target.skills IS NULL
              AND target.company = source.company
              AND target.role = source.role
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!(
            "Propagated skills onto {} postings with a matching company and role",
            result.rows_affected()
        );
        Ok(result.rows_affected())
    }
}

/// Canonical skills live in `skills`; the unique `skill_key` makes `add` an atomic check-and-insert.
#[derive(Clone)]
pub struct PgSkillStore {
    pool: PgPool,
}

impl PgSkillStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SkillStore for PgSkillStore {
    async fn contains(&self, label: &str) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM skills WHERE skill_key = $1)",
        )
        .bind(skill_key(label))
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn add(&self, label: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO skills (skill_key, label)
            VALUES ($1, $2)
            ON CONFLICT (skill_key) DO NOTHING
            "#,
        )
        .bind(skill_key(label))
        .bind(label.trim())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        if inserted {
            info!("Added canonical skill '{}'", label.trim());
        }
        Ok(inserted)
    }

    async fn list_all(&self) -> Result<Vec<String>, AppError> {
        let labels = sqlx::query_scalar::<_, String>("SELECT label FROM skills ORDER BY skill_key")
            .fetch_all(&self.pool)
            .await?;
        Ok(labels)
    }
}

#[derive(Clone)]
pub struct PgBulletRepository {
    pool: PgPool,
}

impl PgBulletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BulletRepository for PgBulletRepository {
    async fn query_by_skills(&self, skills: &[String]) -> Result<Vec<BulletRecord>, AppError> {
        let keys: Vec<String> = skills.iter().map(|s| skill_key(s)).collect();

        let rows = sqlx::query_as::<_, BulletRow>(
            r#"
            SELECT s.label AS skill,
                   b.verb,
                   b.bullet_text,
                   b.quality,
                   array_position($1::text[], s.skill_key)::int4 AS skill_rank,
                   b.created_at,
                   b.resume_reference
            FROM bullets b
            JOIN skills s ON s.skill_key = b.skill_key
            WHERE s.skill_key = ANY($1)
            ORDER BY skill_rank, b.verb, b.id
            "#,
        )
        .bind(&keys)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match BulletRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping stored bullet: {e}"),
            }
        }
        debug!("Loaded {} bullets for {} skills", records.len(), keys.len());
        Ok(records)
    }

    async fn bulk_touch_by_text(
        &self,
        texts: &[String],
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let result =
            sqlx::query("UPDATE bullets SET resume_reference = $2 WHERE bullet_text = ANY($1)")
                .bind(texts)
                .bind(at)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn append_bullets(
        &self,
        skill: &str,
        bullets: &[NewBullet],
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let key = skill_key(skill);
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM skills WHERE skill_key = $1)",
        )
        .bind(&key)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(AppError::NotFound(format!("Skill '{skill}' not found")));
        }

        for bullet in bullets {
            sqlx::query(
                r#"
                INSERT INTO bullets (skill_key, verb, bullet_text, created_at, resume_reference)
                VALUES ($1, $2, $3, $4, $4)
                "#,
            )
            .bind(&key)
            .bind(bullet.verb.as_str())
            .bind(&bullet.text)
            .bind(at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!("Appended {} bullets to skill '{}'", bullets.len(), skill);
        Ok(())
    }

    async fn skills_missing_bullets(&self) -> Result<Vec<String>, AppError> {
        let labels = sqlx::query_scalar::<_, String>(
            r#"
            SELECT s.label FROM skills s
            WHERE NOT EXISTS (SELECT 1 FROM bullets b WHERE b.skill_key = s.skill_key)
            ORDER BY s.created_at, s.skill_key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(labels)
    }
}

/// Stores the assembled resume draft; document rendering happens downstream.
#[derive(Clone)]
pub struct PgResumeAssembler {
    pool: PgPool,
}

impl PgResumeAssembler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeAssembler for PgResumeAssembler {
    async fn assemble(&self, draft: &ResumeDraft) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO tailored_resumes (job_id, profile, skills, bullets)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_id) DO UPDATE
                SET profile = EXCLUDED.profile,
                    skills = EXCLUDED.skills,
                    bullets = EXCLUDED.bullets,
                    created_at = now()
            "#,
        )
        .bind(&draft.job_id)
        .bind(&draft.profile)
        .bind(&draft.skills)
        .bind(&draft.bullets)
        .execute(&self.pool)
        .await?;

        info!(
            "Stored tailored resume for job {} using profile '{}'",
            draft.job_id, draft.profile
        );
        Ok(())
    }
}
