//! Deterministic scoring and verb-diversified selection.

use std::collections::HashSet;

use crate::bullets::{SelectedBullet, SelectionSource, SELECTION_SIZE};
use crate::models::bullet::{BulletRecord, Verb};

pub const WEIGHT_QUALITY: f64 = 2.0;
pub const WEIGHT_SKILL_RANK: f64 = 1.0;
/// Ranks run 1..=5; `RANK_CEILING - rank` turns rank 1 into the largest bonus.
pub const RANK_CEILING: i32 = 6;

/// Generic achievements used only when the pool cannot fill a selection.
pub const FALLBACK_BULLETS: [&str; SELECTION_SIZE] = [
    "Designed data ingestion pipeline for 191 sensor channels over 600,000+ meters, handling 700+ million daily records",
    "Managed daily data ingestion workflows, ensuring the accuracy and reliability of 200GB of data ingested per day",
    "Optimizing data models for smart meter sensors, achieving a 15% increase in data retrieval efficiency",
    "Created an installer, reducing install time by 80% and streamlining the user installation process",
    "Improved data storage solutions, cutting storage costs by 20% while maintaining data integrity",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub score: f64,
    pub text: String,
    pub verb: Verb,
    pub skill: String,
}

/// `quality × 2 + (6 − rank) × 1`. Ungraded bullets count as quality 0, unranked as rank 6.
pub fn score(record: &BulletRecord) -> f64 {
    let quality = record.quality.unwrap_or(0.0);
    let rank = record.skill_rank.unwrap_or(RANK_CEILING);
    quality * WEIGHT_QUALITY + f64::from(RANK_CEILING - rank) * WEIGHT_SKILL_RANK
}

/// Scores every record and sorts descending; ties keep repository order.
pub fn rank_candidates(records: &[BulletRecord]) -> Vec<ScoredCandidate> {
    let mut candidates: Vec<ScoredCandidate> = records
        .iter()
        .map(|r| ScoredCandidate {
            score: score(r),
            text: r.text.clone(),
            verb: r.verb,
            skill: r.skill.clone(),
        })
        .collect();
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}

/// Always returns exactly `SELECTION_SIZE` entries with pairwise distinct texts.
pub fn select(candidates: &[ScoredCandidate]) -> Vec<SelectedBullet> {
    let mut selection: Vec<SelectedBullet> = Vec::with_capacity(SELECTION_SIZE);
    let mut texts: HashSet<&str> = HashSet::new();
    let mut verbs: HashSet<Verb> = HashSet::new();

    for candidate in candidates {
        if selection.len() == SELECTION_SIZE {
            break;
        }
        if verbs.contains(&candidate.verb) || texts.contains(candidate.text.as_str()) {
            continue;
        }
        verbs.insert(candidate.verb);
        texts.insert(&candidate.text);
        selection.push(chosen(candidate, SelectionSource::Diversified));
    }

    for candidate in candidates {
        if selection.len() == SELECTION_SIZE {
            break;
        }
        if texts.insert(&candidate.text) {
            selection.push(chosen(candidate, SelectionSource::VerbReused));
        }
    }

    for fallback in FALLBACK_BULLETS {
        if selection.len() == SELECTION_SIZE {
            break;
        }
        if texts.insert(fallback) {
            selection.push(SelectedBullet {
                text: fallback.to_string(),
                verb: None,
                skill: None,
                score: None,
                source: SelectionSource::Fallback,
            });
        }
    }

    selection
}

fn chosen(candidate: &ScoredCandidate, source: SelectionSource) -> SelectedBullet {
    SelectedBullet {
        text: candidate.text.clone(),
        verb: Some(candidate.verb),
        skill: Some(candidate.skill.clone()),
        score: Some(candidate.score),
        source,
    }
}
