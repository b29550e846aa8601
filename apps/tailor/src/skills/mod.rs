//! Skill Reconciliation Engine: turns a job's noisy extracted skills into
//! exactly 15 unique canonical labels, autonomously or with an operator.

pub mod confirm;
pub mod handlers;
pub mod reconcile;
pub mod validation;

use serde::{Deserialize, Serialize};

pub use confirm::SkillConfirmer;
pub use reconcile::SkillReconciler;

/// Outcome of one successful reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconciled {
    pub job_id: String,
    /// The 15 labels persisted on the job, in order.
    pub skills: Vec<String>,
    /// Labels this pass inserted into the canonical store.
    pub added: Vec<String>,
}
