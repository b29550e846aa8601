use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A scraped job posting. `skills` is written once, as a whole, when reconciliation succeeds.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPosting {
    pub job_id: String,
    pub company: Option<String>,
    pub role: Option<String>,
    pub description: Option<String>,
    pub skills: Option<Vec<String>>,
    pub tailored: bool,
    pub general: bool,
    pub created_at: DateTime<Utc>,
}

impl JobPosting {
    /// Minimal posting with just an id and a description, as ingestion creates it.
    pub fn new(job_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            company: None,
            role: None,
            description: Some(description.into()),
            skills: None,
            tailored: false,
            general: false,
            created_at: Utc::now(),
        }
    }

    /// Non-blank description text, if any.
    pub fn description_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}
