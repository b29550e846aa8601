//! Bullet Aggregation & Scoring Engine: picks 5 achievement bullets for a job
//! from the bullets of its top skills, diversified across verbs.

pub mod achievements;
pub mod aggregate;
pub mod interactive;
pub mod scoring;

use serde::{Deserialize, Serialize};

use crate::models::bullet::Verb;
use crate::models::skill::SKILL_COUNT;

/// How many leading skills of a job feed the bullet pool.
pub const TOP_SKILLS: usize = 5;

/// Size of every final selection.
pub const SELECTION_SIZE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    /// First scoring pass: unused verb, unused text.
    Diversified,
    /// Second scoring pass: verb reuse allowed.
    VerbReused,
    /// Generic sentence padding a short pool.
    Fallback,
    /// Chosen by an operator from the pool.
    Picked,
    /// Typed by an operator after the pool ran dry.
    ExtraPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedBullet {
    pub text: String,
    /// `None` for fallback and extra-point entries.
    pub verb: Option<Verb>,
    pub skill: Option<String>,
    pub score: Option<f64>,
    pub source: SelectionSource,
}

/// Brings a stored skill list to exactly 15 entries: shorter lists are cycled,
/// longer ones truncated. An empty list stays empty.
pub fn prepare_skills_list(skills: &[String]) -> Vec<String> {
    if skills.is_empty() {
        return Vec::new();
    }
    skills.iter().cycle().take(SKILL_COUNT).cloned().collect()
}

/// The leading skills, in list order, that bullets are gathered for.
pub fn top_skills(skills: &[String]) -> Vec<String> {
    skills.iter().take(TOP_SKILLS).cloned().collect()
}
