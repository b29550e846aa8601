//! Checks applied to every completion the reconciler consumes.
//!
//! Each check returns the problem as a `String` so the retry policy can log it
//! and re-issue the same request.

use std::collections::HashSet;

use crate::models::skill::{skill_key, SkillSnapshot, SKILL_COUNT};

/// Validates an extraction batch and returns exactly `SKILL_COUNT` trimmed candidates.
///
/// Items past the 15th are ignored. Fewer items, an empty item or a case-insensitive
/// duplicate invalidate the whole batch.
pub fn check_extraction(items: Vec<String>) -> Result<Vec<String>, String> {
    let mut items: Vec<String> = items.into_iter().map(|s| s.trim().to_string()).collect();
    while items.last().is_some_and(|s| s.is_empty()) {
        items.pop();
    }
    items.truncate(SKILL_COUNT);

    if let Some(position) = items.iter().position(|s| s.is_empty()) {
        return Err(format!("empty skill at position {}", position + 1));
    }
    if items.len() < SKILL_COUNT {
        return Err(format!(
            "expected {SKILL_COUNT} skills, got {}",
            items.len()
        ));
    }
    if let Some(duplicate) = first_duplicate(&items) {
        return Err(format!("duplicate skill '{duplicate}'"));
    }
    Ok(items)
}

/// Validates replacements for the missing slots, in slot order.
pub fn check_replacements(
    replacements: &[String],
    missing_count: usize,
    kept: &[String],
    snapshot: &SkillSnapshot,
) -> Result<(), String> {
    if replacements.len() != missing_count {
        return Err(format!(
            "expected {missing_count} replacements, got {}",
            replacements.len()
        ));
    }

    let kept_keys: HashSet<String> = kept.iter().map(|s| skill_key(s)).collect();
    let mut seen = HashSet::new();

    for replacement in replacements {
        let label = replacement.trim();
        if label.is_empty() {
            return Err("empty replacement".to_string());
        }
        let key = skill_key(label);
        if kept_keys.contains(&key) {
            return Err(format!("replacement '{label}' is already in the job's list"));
        }
        if !seen.insert(key) {
            return Err(format!("replacement '{label}' proposed twice"));
        }
        if let Some(stored) = snapshot.canonical(label) {
            if stored != label {
                return Err(format!(
                    "replacement '{label}' is stored as '{stored}'"
                ));
            }
        }
    }
    Ok(())
}

/// The capitalization pass may only change letter case.
pub fn check_capitalization(input: &[String], output: &[String]) -> Result<(), String> {
    if output.len() != input.len() {
        return Err(format!(
            "expected {} skills back, got {}",
            input.len(),
            output.len()
        ));
    }
    for (position, (before, after)) in input.iter().zip(output).enumerate() {
        if after.trim().is_empty() {
            return Err(format!("empty skill at position {}", position + 1));
        }
        if skill_key(before) != skill_key(after) {
            return Err(format!(
                "'{before}' came back as '{after}' at position {}",
                position + 1
            ));
        }
    }
    Ok(())
}

fn first_duplicate(items: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    items
        .iter()
        .find(|item| !seen.insert(skill_key(item)))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::labels;

    #[test]
    fn test_extraction_accepts_exactly_fifteen() {
        let items = labels("Skill", 15);
        assert_eq!(check_extraction(items.clone()).unwrap(), items);
    }

    #[test]
    fn test_extraction_truncates_extra_items() {
        let accepted = check_extraction(labels("Skill", 18)).unwrap();
        assert_eq!(accepted.len(), SKILL_COUNT);
        assert_eq!(accepted.last().unwrap(), "Skill 15");
    }

    #[test]
    fn test_extraction_ignores_trailing_delimiter() {
        let mut items = labels("Skill", 15);
        items.push(String::new());
        assert!(check_extraction(items).is_ok());
    }

    #[test]
    fn test_extraction_rejects_short_batch() {
        let err = check_extraction(labels("Skill", 14)).unwrap_err();
        assert!(err.contains("got 14"));
    }

    #[test]
    fn test_extraction_rejects_empty_item() {
        let mut items = labels("Skill", 15);
        items[3] = "  ".to_string();
        assert_eq!(
            check_extraction(items).unwrap_err(),
            "empty skill at position 4"
        );
    }

    #[test]
    fn test_extraction_rejects_case_insensitive_duplicates() {
        let mut items = labels("Skill", 15);
        items[10] = "SKILL 2".to_string();
        assert!(check_extraction(items).unwrap_err().contains("duplicate"));
    }

    #[test]
    fn test_replacements_must_match_missing_count() {
        let snapshot = SkillSnapshot::default();
        let err = check_replacements(&["Go".into()], 2, &[], &snapshot).unwrap_err();
        assert!(err.contains("expected 2"));
    }

    #[test]
    fn test_replacement_cannot_repeat_kept_skill() {
        let snapshot = SkillSnapshot::default();
        let err =
            check_replacements(&["sql".into()], 1, &["SQL".into()], &snapshot).unwrap_err();
        assert!(err.contains("already in the job's list"));
    }

    #[test]
    fn test_replacements_must_be_unique() {
        let snapshot = SkillSnapshot::default();
        let err = check_replacements(&["Go".into(), "go".into()], 2, &[], &snapshot).unwrap_err();
        assert!(err.contains("proposed twice"));
    }

    #[test]
    fn test_replacement_in_store_under_other_case_is_rejected() {
        let snapshot = SkillSnapshot::from_labels(["PostgreSQL"]);
        assert!(check_replacements(&["postgresql".into()], 1, &[], &snapshot).is_err());
        assert!(check_replacements(&["PostgreSQL".into()], 1, &[], &snapshot).is_ok());
    }

    #[test]
    fn test_capitalization_only_changes_case() {
        let input = vec!["postgresql".to_string(), "ci/cd".to_string()];
        assert!(check_capitalization(&input, &["PostgreSQL".into(), "CI/CD".into()]).is_ok());
        assert!(check_capitalization(&input, &["Postgres".into(), "CI/CD".into()]).is_err());
        assert!(check_capitalization(&input, &["PostgreSQL".into()]).is_err());
    }
}
