use std::collections::BTreeMap;

/// Number of canonical skills every reconciled job carries.
pub const SKILL_COUNT: usize = 15;

/// Comparison key for skill labels: trimmed and case-folded.
/// Display casing is kept separately by whoever owns the label.
pub fn skill_key(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Point-in-time copy of the canonical skill store, keyed by `skill_key`.
#[derive(Debug, Clone, Default)]
pub struct SkillSnapshot {
    by_key: BTreeMap<String, String>,
}

impl SkillSnapshot {
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut by_key = BTreeMap::new();
        for label in labels {
            let label = label.into();
            by_key.entry(skill_key(&label)).or_insert(label);
        }
        Self { by_key }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.by_key.contains_key(&skill_key(label))
    }

    /// The stored spelling of `label`, if the store knows it under any casing.
    pub fn canonical(&self, label: &str) -> Option<&str> {
        self.by_key.get(&skill_key(label)).map(String::as_str)
    }

    pub fn labels(&self) -> Vec<String> {
        self.by_key.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_key_folds_case_and_trims() {
        assert_eq!(skill_key("  PostgreSQL "), "postgresql");
        assert_eq!(skill_key("Überwachung"), "überwachung");
    }

    #[test]
    fn test_snapshot_keeps_first_spelling() {
        let snapshot = SkillSnapshot::from_labels(["Rust", "rust", "SQL"]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.canonical("RUST"), Some("Rust"));
        assert!(snapshot.contains("sql"));
        assert!(!snapshot.contains("Go"));
    }
}
