pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::skills::handlers as skills;
use crate::state::AppState;
use crate::tailoring::handlers as tailoring;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Skill reconciliation
        .route("/api/v1/skills", get(skills::handle_list_skills))
        .route("/api/v1/skills/reconcile", post(skills::handle_reconcile))
        .route(
            "/api/v1/skills/reconcile/:job_id/cancel",
            post(skills::handle_cancel),
        )
        // Bullet selection & tailoring
        .route(
            "/api/v1/jobs/:job_id/bullets",
            get(tailoring::handle_bullet_preview),
        )
        .route("/api/v1/jobs/:job_id/tailor", post(tailoring::handle_tailor))
        .with_state(state)
}
