//! Axum route handlers for the skills API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::batch::JobOutcome;
use crate::errors::AppError;
use crate::skills::Reconciled;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileRequest {
    /// Empty: every posting that has a description but no skills.
    #[serde(default)]
    pub job_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<JobOutcome<Reconciled>>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct SkillListResponse {
    pub count: usize,
    pub skills: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/skills/reconcile
///
/// Reconciles the given jobs (or every job missing skills) through the worker pool.
/// Per-job failures are reported in `outcomes`; they never fail the request.
pub async fn handle_reconcile(
    State(state): State<AppState>,
    Json(request): Json<ReconcileRequest>,
) -> Result<Json<ReconcileResponse>, AppError> {
    if request.job_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(AppError::Validation("job_ids cannot contain blank ids".to_string()));
    }

    let job_ids = if request.job_ids.is_empty() {
        state.jobs.jobs_missing_skills().await?
    } else {
        request.job_ids
    };

    let reconciler = state.reconciler.clone();
    let outcomes = state
        .batch
        .run(job_ids, move |job_id: String| {
            let reconciler = reconciler.clone();
            async move { reconciler.reconcile_job(&job_id).await }
        })
        .await;

    let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
    Ok(Json(ReconcileResponse {
        succeeded,
        failed: outcomes.len() - succeeded,
        outcomes,
    }))
}

/// POST /api/v1/skills/reconcile/:job_id/cancel
pub async fn handle_cancel(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<CancelResponse>, AppError> {
    if !state.batch.cancel(&job_id) {
        return Err(AppError::NotFound(format!(
            "No reconciliation running for job {job_id}"
        )));
    }
    Ok(Json(CancelResponse {
        job_id,
        cancelled: true,
    }))
}

/// GET /api/v1/skills
pub async fn handle_list_skills(
    State(state): State<AppState>,
) -> Result<Json<SkillListResponse>, AppError> {
    let skills = state.skills.list_all().await?;
    Ok(Json(SkillListResponse {
        count: skills.len(),
        skills,
    }))
}
