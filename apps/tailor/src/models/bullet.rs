use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The fixed action-verb vocabulary achievements are written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Built,
    Led,
    Managed,
    Collaborated,
    Improved,
}

impl Verb {
    /// Generation order: achievement prompts return one sentence per verb in this order.
    pub const ALL: [Verb; 5] = [
        Verb::Built,
        Verb::Led,
        Verb::Managed,
        Verb::Collaborated,
        Verb::Improved,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Built => "built",
            Verb::Led => "led",
            Verb::Managed => "managed",
            Verb::Collaborated => "collaborated",
            Verb::Improved => "improved",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Verb::ALL
            .into_iter()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| format!("unknown verb '{}'", s.trim()))
    }
}

/// A stored achievement sentence for one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletRecord {
    pub skill: String,
    pub verb: Verb,
    pub text: String,
    /// Externally assigned quality; `None` until someone grades it.
    pub quality: Option<f64>,
    /// 1-based position of `skill` in the list the records were queried with.
    pub skill_rank: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub last_referenced: Option<DateTime<Utc>>,
}

/// Row shape returned by the bullet queries; `verb` is validated on conversion.
#[derive(Debug, Clone, FromRow)]
pub struct BulletRow {
    pub skill: String,
    pub verb: String,
    pub bullet_text: String,
    pub quality: Option<f64>,
    pub skill_rank: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub resume_reference: Option<DateTime<Utc>>,
}

impl TryFrom<BulletRow> for BulletRecord {
    type Error = String;

    fn try_from(row: BulletRow) -> Result<Self, Self::Error> {
        Ok(BulletRecord {
            verb: row.verb.parse()?,
            skill: row.skill,
            text: row.bullet_text,
            quality: row.quality,
            skill_rank: row.skill_rank,
            created_at: row.created_at,
            last_referenced: row.resume_reference,
        })
    }
}

/// An accepted achievement waiting to be appended to a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBullet {
    pub verb: Verb,
    pub text: String,
}
