//! Prompt kinds understood by the text-completion port, their system prompts,
//! and the list delimiter used to move item lists through free text.

use serde::{Deserialize, Serialize};

/// Joins and splits item lists exchanged with the model. Chosen because it does
/// not occur in skill labels or achievement sentences.
pub const DELIMITER: &str = "^_^";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    SkillExtraction,
    SkillReplacement,
    ShorterSkill,
    SkillCollection,
    SkillCapitalization,
    AchievementGeneration,
    NewAchievement,
    AchievementShortening,
    ProfileSelection,
}

impl PromptKind {
    pub fn system_prompt(self) -> &'static str {
        match self {
            PromptKind::SkillExtraction => SKILL_EXTRACTION_SYSTEM,
            PromptKind::SkillReplacement => SKILL_REPLACEMENT_SYSTEM,
            PromptKind::ShorterSkill => SHORTER_SKILL_SYSTEM,
            PromptKind::SkillCollection => SKILL_COLLECTION_SYSTEM,
            PromptKind::SkillCapitalization => SKILL_CAPITALIZATION_SYSTEM,
            PromptKind::AchievementGeneration => ACHIEVEMENT_GENERATION_SYSTEM,
            PromptKind::NewAchievement => NEW_ACHIEVEMENT_SYSTEM,
            PromptKind::AchievementShortening => ACHIEVEMENT_SHORTENING_SYSTEM,
            PromptKind::ProfileSelection => PROFILE_SELECTION_SYSTEM,
        }
    }

    pub fn default_temperature(self) -> f32 {
        match self {
            PromptKind::SkillExtraction | PromptKind::SkillCollection => 0.4,
            PromptKind::SkillReplacement | PromptKind::ShorterSkill => 0.7,
            PromptKind::SkillCapitalization => 0.2,
            PromptKind::AchievementGeneration
            | PromptKind::NewAchievement
            | PromptKind::AchievementShortening => 0.8,
            PromptKind::ProfileSelection => 0.4,
        }
    }
}

/// Joins items with the delimiter.
pub fn join_items<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(DELIMITER)
}

/// Splits model output on the delimiter, trimming items and dropping empty ones.
pub fn split_items(text: &str) -> Vec<String> {
    text.split(DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Splits without dropping empty items, for validations that must see them.
pub fn split_items_raw(text: &str) -> Vec<String> {
    text.split(DELIMITER).map(|s| s.trim().to_string()).collect()
}

macro_rules! list_rules {
    () => {
        "Separate items with ^_^ and nothing else. \
         Do NOT number items. Do NOT add commentary, headings, or trailing punctuation."
    };
}

const LIST_RULES: &str = list_rules!();

pub const SKILL_EXTRACTION_SYSTEM: &str = concat!(
    "You are a technical recruiter. \
    Read the job description and return exactly 15 distinct hard skills, \
    most important first. Each skill is a short label of at most four words. ",
    list_rules!()
);

pub const SKILL_REPLACEMENT_SYSTEM: &str = concat!(
    "You suggest alternatives for a resume skill. \
    Given one skill, return five closely related skills a candidate is more likely to have. ",
    list_rules!()
);

pub const SHORTER_SKILL_SYSTEM: &str = concat!(
    "You shorten resume skill labels. \
    Given one skill, return five shorter labels with the same meaning. ",
    list_rules!()
);

pub const SKILL_COLLECTION_SYSTEM: &str = concat!(
    "You map job skills onto a candidate's skill collection. \
    The input has an 'Inputted list' and a 'Skill collection'. \
    For every item of the inputted list, in order, return exactly one replacement skill. \
    Prefer an exact entry of the skill collection, spelled exactly as it appears there. \
    Every replacement must be different from every other replacement and from every skill in 'Already selected'. \
    Return exactly as many items as the inputted list has. ",
    list_rules!()
);

pub const SKILL_CAPITALIZATION_SYSTEM: &str = concat!(
    "You fix capitalization of resume skill labels. \
    Return the same skills, in the same order, with conventional capitalization \
    (e.g. 'PostgreSQL', 'Machine Learning', 'CI/CD'). Do NOT change spelling, \
    do NOT add or remove items. ",
    list_rules!()
);

pub const ACHIEVEMENT_GENERATION_SYSTEM: &str = concat!(
    "You write resume achievement bullet points. \
    Given one skill, write five one-sentence achievements that use it, starting with the verbs \
    'Built', 'Led', 'Managed', 'Collaborated', 'Improved', in that order. \
    Quantify impact where plausible. ",
    list_rules!()
);

pub const NEW_ACHIEVEMENT_SYSTEM: &str = "You write one resume achievement bullet point. \
    The input names a skill and a verb. Write one sentence that starts with the verb and uses the skill. \
    Return only the sentence.";

pub const ACHIEVEMENT_SHORTENING_SYSTEM: &str = "You shorten resume achievement bullet points. \
    Rewrite the sentence to be noticeably shorter while keeping the verb, the skill and the metric. \
    Return only the sentence.";

pub const PROFILE_SELECTION_SYSTEM: &str = "You classify job titles into resume profiles. \
    The input has a role and a list of profiles. Return exactly one profile name from the list, \
    spelled exactly as listed, and nothing else.";

/// Builds the skill-collection request: missing items, already-kept skills and the store snapshot.
pub fn skill_collection_input(missing: &[String], kept: &[String], collection: &[String]) -> String {
    format!(
        "Inputted list: {}\nAlready selected: {}\nSkill collection: {}\n{}",
        join_items(missing),
        join_items(kept),
        join_items(collection),
        LIST_RULES
    )
}

pub fn new_achievement_input(skill: &str, verb: &str) -> String {
    format!("**Skill**: {skill}\n**Verb**: {verb}")
}

pub fn profile_selection_input(role: &str, profiles: &[String]) -> String {
    format!("Role: {role}\nProfiles: {}", profiles.join(", "))
}
