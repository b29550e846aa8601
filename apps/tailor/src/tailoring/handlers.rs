//! Axum route handlers for bullet selection and tailoring.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::errors::AppError;
use crate::state::AppState;
use crate::tailoring::{Applied, BulletPreview};

/// GET /api/v1/jobs/:job_id/bullets
///
/// The scored selection the job would get right now. Nothing is written.
pub async fn handle_bullet_preview(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<BulletPreview>, AppError> {
    let preview = state.tailor.preview(&job_id).await?;
    Ok(Json(preview))
}

/// POST /api/v1/jobs/:job_id/tailor
///
/// Selects bullets, picks a profile, hands the draft to assembly, stamps the bullets
/// and marks the job tailored. Runs under the job's lock and deadline.
pub async fn handle_tailor(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Applied>, AppError> {
    let applied = state
        .batch
        .run_one(&job_id, state.tailor.tailor_job(&job_id))
        .await?;
    Ok(Json(applied))
}
