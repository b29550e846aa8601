//! Offline run of the whole pipeline: propagate skills, reconcile, build
//! achievements, tailor resumes. `ROBO_TAILOR=false` puts an operator at the terminal.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use tailor::batch::{BatchRunner, JobOutcome};
use tailor::bullets::achievements::AchievementBuilder;
use tailor::config::{Config, Mode};
use tailor::db::create_pool;
use tailor::fit::{FitPredicate, MetricFit};
use tailor::human::{HumanInterface, TerminalHuman};
use tailor::llm_client::{LlmClient, TextCompletion, TimedCompletion};
use tailor::skills::{SkillConfirmer, SkillReconciler};
use tailor::state::Ports;
use tailor::tailoring::Tailor;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tailor::init_tracing(&config.rust_log);

    let mode = config.mode();
    info!("tailor-batch v{} starting in {mode:?} mode", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config).await?;
    let redis = redis::Client::open(config.redis_url.clone())?;
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    let completion: Arc<dyn TextCompletion> = Arc::new(TimedCompletion::new(
        Arc::new(llm),
        config.completion_timeout,
    ));
    let ports = Ports::postgres(db, redis, completion, &config);
    let fit: Arc<dyn FitPredicate> = Arc::new(MetricFit::default());

    // one operator answers one job at a time
    let (human, concurrency): (Option<Arc<dyn HumanInterface>>, usize) = match mode {
        Mode::Autonomous => (None, config.max_concurrency),
        Mode::HumanConfirmation => {
            let terminal: Arc<dyn HumanInterface> =
                Arc::new(TerminalHuman::new(config.prompt_retry()));
            (Some(terminal), 1)
        }
    };
    let mut runner = BatchRunner::new(concurrency, ports.lock.clone(), config.job_timeout);
    if human.is_some() {
        // an operator session is paced by the operator; completions keep their own timeout
        runner = runner.without_deadline();
    }

    // ── 1. Skills ───────────────────────────────────────────────────────────
    let propagated = ports.jobs.propagate_skills().await?;
    info!("Copied skills onto {propagated} postings with a matching company and role");

    let job_ids = ports.jobs.jobs_missing_skills().await?;
    info!("{} postings need skills", job_ids.len());

    let outcomes = match &human {
        None => {
            let reconciler = Arc::new(SkillReconciler::new(
                ports.completion.clone(),
                ports.skills.clone(),
                ports.jobs.clone(),
                config.completion_retry(),
            ));
            runner
                .run(job_ids, move |job_id: String| {
                    let reconciler = reconciler.clone();
                    async move { reconciler.reconcile_job(&job_id).await }
                })
                .await
        }
        Some(human) => {
            let confirmer = Arc::new(SkillConfirmer::new(
                ports.completion.clone(),
                ports.skills.clone(),
                ports.jobs.clone(),
                human.clone(),
                fit.clone(),
                &config,
            ));
            runner
                .run(job_ids, move |job_id: String| {
                    let confirmer = confirmer.clone();
                    async move { confirmer.confirm_job(&job_id).await }
                })
                .await
        }
    };
    report("skills", &outcomes);

    // ── 2. Achievements ─────────────────────────────────────────────────────
    let mut builder = AchievementBuilder::new(
        ports.completion.clone(),
        ports.bullets.clone(),
        fit.clone(),
        &config,
    );
    if let Some(human) = &human {
        builder = builder.with_human(human.clone());
    }
    let achievements = builder.run().await?;
    info!(
        "Achievements: {} bullets for {} skills",
        achievements.bullets, achievements.skills
    );
    for skill in &achievements.failed {
        error!("achievements: skill '{skill}' still has no bullets");
    }

    // ── 3. Tailoring ────────────────────────────────────────────────────────
    let mut tailor = Tailor::new(
        ports.completion.clone(),
        ports.jobs.clone(),
        ports.bullets.clone(),
        ports.assembler.clone(),
        &config,
    );
    if let Some(human) = &human {
        tailor = tailor.with_human(human.clone());
    }
    let tailor = Arc::new(tailor);

    let pending: Vec<String> = ports
        .jobs
        .untailored_jobs()
        .await?
        .into_iter()
        .map(|job| job.job_id)
        .collect();
    info!("{} postings to tailor", pending.len());

    let outcomes = runner
        .run(pending, move |job_id: String| {
            let tailor = tailor.clone();
            async move { tailor.tailor_job(&job_id).await }
        })
        .await;
    report("tailoring", &outcomes);

    Ok(())
}

fn report<T>(stage: &str, outcomes: &[JobOutcome<T>]) {
    let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
    info!("{stage}: {succeeded}/{} jobs succeeded", outcomes.len());
    for outcome in outcomes.iter().filter(|o| !o.succeeded()) {
        error!(
            "{stage}: job {} {:?}{}: {}",
            outcome.job_id,
            outcome.status,
            if outcome.retryable { " (retryable)" } else { "" },
            outcome.error.as_deref().unwrap_or("")
        );
    }
}
