//! Gathers the candidate bullets of a job's top skills.

use std::collections::BTreeMap;

use crate::bullets::top_skills;
use crate::errors::AppError;
use crate::models::bullet::{BulletRecord, Verb};
use crate::store::BulletRepository;

/// `verb → skill → bullet texts`, deterministically ordered.
pub type BulletGroups = BTreeMap<Verb, BTreeMap<String, Vec<String>>>;

/// Every bullet of the top skills, in repository order.
#[derive(Debug, Clone, Default)]
pub struct BulletPool {
    pub skills: Vec<String>,
    pub records: Vec<BulletRecord>,
}

impl BulletPool {
    pub async fn gather(
        repo: &dyn BulletRepository,
        job_skills: &[String],
    ) -> Result<Self, AppError> {
        let skills = top_skills(job_skills);
        let records = if skills.is_empty() {
            Vec::new()
        } else {
            repo.query_by_skills(&skills).await?
        };
        Ok(Self { skills, records })
    }

    pub fn grouped(&self) -> BulletGroups {
        let mut groups = BulletGroups::new();
        for record in &self.records {
            let texts = groups
                .entry(record.verb)
                .or_default()
                .entry(record.skill.clone())
                .or_default();
            if !texts.contains(&record.text) {
                texts.push(record.text.clone());
            }
        }
        groups
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Operator-facing listing of the groups.
pub fn render_groups(groups: &BulletGroups) -> String {
    let mut out = String::new();
    for (verb, skills) in groups {
        out.push_str(&format!("{verb}:\n"));
        for (skill, texts) in skills {
            for text in texts {
                out.push_str(&format!("  {skill}: {text}\n"));
            }
        }
    }
    out
}
