//! Operator-driven bullet selection: verb, then skill, until 5 are chosen.

use crate::bullets::aggregate::{render_groups, BulletGroups};
use crate::bullets::{SelectedBullet, SelectionSource, SELECTION_SIZE};
use crate::errors::AppError;
use crate::human::HumanInterface;
use crate::models::bullet::Verb;
use crate::models::skill::skill_key;
use crate::retry::RetryPolicy;

/// Every invalid answer (unknown verb or skill, repeated text, empty extra point)
/// spends one attempt of `retry`.
pub async fn pick_bullets(
    human: &dyn HumanInterface,
    groups: BulletGroups,
    retry: &RetryPolicy,
) -> Result<Vec<SelectedBullet>, AppError> {
    let mut groups = groups;
    let mut selection: Vec<SelectedBullet> = Vec::with_capacity(SELECTION_SIZE);
    let mut budget = retry.budget("bullet pick");

    while selection.len() < SELECTION_SIZE && !groups.is_empty() {
        human.show(&render_groups(&groups)).await?;

        let answer = human.prompt_text("Verb").await?;
        let verb = match answer.parse::<Verb>() {
            Ok(verb) if groups.contains_key(&verb) => verb,
            _ => {
                let problem = format!("'{answer}' is not an available verb");
                human.show(&problem).await?;
                budget.spend(problem)?;
                continue;
            }
        };

        let answer = human.prompt_text("Skill").await?;
        let Some(skill) = find_skill(&groups, verb, &answer) else {
            let problem = format!("'{answer}' has no {verb} bullet left");
            human.show(&problem).await?;
            budget.spend(problem)?;
            continue;
        };

        let text = groups
            .get(&verb)
            .and_then(|skills| skills.get(&skill))
            .and_then(|texts| {
                texts
                    .iter()
                    .find(|t| !selection.iter().any(|s| s.text == **t))
                    .cloned()
            });
        remove_skill(&mut groups, &skill);

        match text {
            Some(text) => selection.push(SelectedBullet {
                text,
                verb: Some(verb),
                skill: Some(skill),
                score: None,
                source: SelectionSource::Picked,
            }),
            None => {
                let problem = format!("the {verb} bullet of '{skill}' is already selected");
                human.show(&problem).await?;
                budget.spend(problem)?;
            }
        }
    }

    while selection.len() < SELECTION_SIZE {
        let text = human
            .prompt_text(&format!(
                "Extra point {}/{SELECTION_SIZE}",
                selection.len() + 1
            ))
            .await?;
        let problem = if text.is_empty() {
            "an extra point cannot be empty".to_string()
        } else if selection.iter().any(|s| s.text == text) {
            format!("'{text}' is already selected")
        } else {
            selection.push(SelectedBullet {
                text,
                verb: None,
                skill: None,
                score: None,
                source: SelectionSource::ExtraPoint,
            });
            continue;
        };
        human.show(&problem).await?;
        budget.spend(problem)?;
    }

    Ok(selection)
}

fn find_skill(groups: &BulletGroups, verb: Verb, answer: &str) -> Option<String> {
    let wanted = skill_key(answer);
    groups
        .get(&verb)?
        .keys()
        .find(|skill| skill_key(skill) == wanted)
        .cloned()
}

/// A chosen skill cannot be used again under any verb.
fn remove_skill(groups: &mut BulletGroups, skill: &str) {
    for skills in groups.values_mut() {
        skills.remove(skill);
    }
    groups.retain(|_, skills| !skills.is_empty());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use crate::testing::ScriptedHuman;

    fn groups(entries: &[(Verb, &str, &str)]) -> BulletGroups {
        let mut groups = BulletGroups::new();
        for (verb, skill, text) in entries {
            groups
                .entry(*verb)
                .or_insert_with(BTreeMap::new)
                .entry(skill.to_string())
                .or_insert_with(Vec::new)
                .push(text.to_string());
        }
        groups
    }

    fn retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_picked_skill_is_removed_from_every_verb() {
        let pool = groups(&[
            (Verb::Built, "Rust", "Built a Rust CLI"),
            (Verb::Led, "Rust", "Led Rust adoption"),
            (Verb::Led, "SQL", "Led SQL migration"),
        ]);
        // picking Rust under "built" leaves only SQL under "led"
        let human = ScriptedHuman::new([
            "built", "rust", "led", "Rust", "led", "sql", "Extra one", "Extra two", "Extra three",
        ]);

        let selection = pick_bullets(&human, pool, &retry()).await.unwrap();
        let texts: Vec<&str> = selection.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["Built a Rust CLI", "Led SQL migration", "Extra one", "Extra two", "Extra three"]
        );
        assert_eq!(selection[0].source, SelectionSource::Picked);
        assert_eq!(selection[4].verb, None);
        assert_eq!(selection[4].source, SelectionSource::ExtraPoint);
        assert!(human
            .shown()
            .iter()
            .any(|s| s == "'Rust' has no led bullet left"));
    }

    #[tokio::test]
    async fn test_unknown_verb_spends_the_budget() {
        let pool = groups(&[(Verb::Built, "Rust", "Built a Rust CLI")]);
        let human = ScriptedHuman::new(["architected", "spearheaded", "drove"]);
        let err = pick_bullets(&human, pool, &retry()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::RetriesExhausted {
                stage: "bullet pick",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_extra_point_is_rejected() {
        let human = ScriptedHuman::new(["one", "two", "two", "", "three", "four", "five"]);
        let selection = pick_bullets(&human, BulletGroups::new(), &RetryPolicy::new(5, Duration::ZERO))
            .await
            .unwrap();
        let texts: Vec<&str> = selection.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three", "four", "five"]);
    }

    #[tokio::test]
    async fn test_stops_after_five_picks() {
        let entries: Vec<(Verb, String, String)> = (1..=6)
            .map(|i| (Verb::Built, format!("s{i}"), format!("Built {i}")))
            .collect();
        let refs: Vec<(Verb, &str, &str)> = entries
            .iter()
            .map(|(v, s, t)| (*v, s.as_str(), t.as_str()))
            .collect();
        let human = ScriptedHuman::new([
            "built", "s1", "built", "s2", "built", "s3", "built", "s4", "built", "s5",
        ]);
        let selection = pick_bullets(&human, groups(&refs), &retry()).await.unwrap();
        assert_eq!(selection.len(), SELECTION_SIZE);
        assert_eq!(human.remaining(), 0);
    }
}
