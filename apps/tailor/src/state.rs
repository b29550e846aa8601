use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::batch::BatchRunner;
use crate::config::Config;
use crate::llm_client::TextCompletion;
use crate::skills::SkillReconciler;
use crate::store::lock::RedisJobLock;
use crate::store::postgres::{PgBulletRepository, PgJobStore, PgResumeAssembler, PgSkillStore};
use crate::store::{BulletRepository, JobLock, JobStore, ResumeAssembler, SkillStore};
use crate::tailoring::Tailor;

/// The collaborators both binaries wire the engines to.
#[derive(Clone)]
pub struct Ports {
    pub completion: Arc<dyn TextCompletion>,
    pub jobs: Arc<dyn JobStore>,
    pub skills: Arc<dyn SkillStore>,
    pub bullets: Arc<dyn BulletRepository>,
    pub assembler: Arc<dyn ResumeAssembler>,
    pub lock: Arc<dyn JobLock>,
}

impl Ports {
    /// PostgreSQL stores with the Redis per-job lock.
    pub fn postgres(
        db: PgPool,
        redis: RedisClient,
        completion: Arc<dyn TextCompletion>,
        config: &Config,
    ) -> Self {
        Self {
            completion,
            jobs: Arc::new(PgJobStore::new(db.clone())),
            skills: Arc::new(PgSkillStore::new(db.clone())),
            bullets: Arc::new(PgBulletRepository::new(db.clone())),
            assembler: Arc::new(PgResumeAssembler::new(db)),
            lock: Arc::new(RedisJobLock::new(redis, config.lock_ttl)),
        }
    }
}

/// Shared application state injected into all route handlers via Axum extractors.
/// The HTTP service always runs the engines autonomously.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub jobs: Arc<dyn JobStore>,
    pub skills: Arc<dyn SkillStore>,
    pub reconciler: Arc<SkillReconciler>,
    pub tailor: Arc<Tailor>,
    pub batch: BatchRunner,
}

impl AppState {
    pub fn new(config: Config, ports: Ports) -> Self {
        let reconciler = SkillReconciler::new(
            ports.completion.clone(),
            ports.skills.clone(),
            ports.jobs.clone(),
            config.completion_retry(),
        );
        let tailor = Tailor::new(
            ports.completion.clone(),
            ports.jobs.clone(),
            ports.bullets.clone(),
            ports.assembler.clone(),
            &config,
        );
        let batch = BatchRunner::new(config.max_concurrency, ports.lock.clone(), config.job_timeout);

        Self {
            jobs: ports.jobs,
            skills: ports.skills,
            reconciler: Arc::new(reconciler),
            tailor: Arc::new(tailor),
            batch,
            config,
        }
    }
}
