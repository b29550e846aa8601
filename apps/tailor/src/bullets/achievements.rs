//! Builds achievement bullets for canonical skills that have none yet.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::fit::FitPredicate;
use crate::human::HumanInterface;
use crate::llm_client::prompts::{new_achievement_input, split_items};
use crate::llm_client::{PromptKind, TextCompletion};
use crate::models::bullet::{NewBullet, Verb};
use crate::retry::{Attempt, RetryPolicy};
use crate::store::BulletRepository;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AchievementReport {
    pub skills: usize,
    pub bullets: usize,
    /// Skills whose generation or write failed; they stay without bullets for the next run.
    pub failed: Vec<String>,
}

pub struct AchievementBuilder {
    completion: Arc<dyn TextCompletion>,
    bullets: Arc<dyn BulletRepository>,
    fit: Arc<dyn FitPredicate>,
    limit_em: f32,
    completion_retry: RetryPolicy,
    prompt_retry: RetryPolicy,
    human: Option<Arc<dyn HumanInterface>>,
}

impl AchievementBuilder {
    pub fn new(
        completion: Arc<dyn TextCompletion>,
        bullets: Arc<dyn BulletRepository>,
        fit: Arc<dyn FitPredicate>,
        config: &Config,
    ) -> Self {
        Self {
            completion,
            bullets,
            fit,
            limit_em: config.limits.achievement_em,
            completion_retry: config.completion_retry(),
            prompt_retry: config.prompt_retry(),
            human: None,
        }
    }

    /// Routes every decision through an operator instead of keeping generated text.
    pub fn with_human(mut self, human: Arc<dyn HumanInterface>) -> Self {
        self.human = Some(human);
        self
    }

    /// Fills every canonical skill that has no bullets. A skill that fails is logged and
    /// reported; the others still get their bullets.
    pub async fn run(&self) -> Result<AchievementReport, AppError> {
        let skills = self.bullets.skills_missing_bullets().await?;
        info!("{} skills need achievements", skills.len());

        let mut report = AchievementReport::default();
        for skill in skills {
            match self.fill_skill(&skill).await {
                Ok(0) => {}
                Ok(added) => {
                    report.skills += 1;
                    report.bullets += added;
                }
                Err(e) => {
                    error!("Achievements for '{skill}' failed: {e}");
                    report.failed.push(skill);
                }
            }
        }
        info!(
            "Added {} achievements across {} skills, {} skills failed",
            report.bullets,
            report.skills,
            report.failed.len()
        );
        Ok(report)
    }

    async fn fill_skill(&self, skill: &str) -> Result<usize, AppError> {
        let built = self.build_for_skill(skill).await?;
        if !built.is_empty() {
            self.bullets
                .append_bullets(skill, &built, Utc::now())
                .await?;
        }
        Ok(built.len())
    }

    pub async fn build_for_skill(&self, skill: &str) -> Result<Vec<NewBullet>, AppError> {
        let generated = self.generate(skill).await?;
        let mut built = Vec::with_capacity(generated.len());

        for (verb, sentence) in Verb::ALL.into_iter().zip(generated) {
            let text = match &self.human {
                None => self.shorten_to_fit(sentence).await?,
                Some(human) => self.review(human.as_ref(), skill, verb, sentence).await?,
            };
            if let Some(text) = text {
                built.push(NewBullet { verb, text });
            }
        }
        Ok(built)
    }

    /// One sentence per verb, in `Verb::ALL` order.
    async fn generate(&self, skill: &str) -> Result<Vec<String>, AppError> {
        let completion = self.completion.as_ref();
        self.completion_retry
            .run("achievement generation", |_| async move {
                let kind = PromptKind::AchievementGeneration;
                let text = completion
                    .complete(kind, skill, kind.default_temperature())
                    .await?;
                let sentences = split_items(&text);
                Ok::<_, AppError>(if sentences.len() == Verb::ALL.len() {
                    Attempt::Done(sentences)
                } else {
                    Attempt::Mismatch(format!(
                        "expected {} achievements, got {}",
                        Verb::ALL.len(),
                        sentences.len()
                    ))
                })
            })
            .await
    }

    async fn shorten(&self, sentence: &str) -> Result<String, AppError> {
        let kind = PromptKind::AchievementShortening;
        let text = self
            .completion
            .complete(kind, sentence, kind.default_temperature())
            .await?;
        Ok(text.trim().to_string())
    }

    /// `None` when the sentence still does not fit after the retry budget.
    async fn shorten_to_fit(&self, sentence: String) -> Result<Option<String>, AppError> {
        let mut sentence = sentence;
        let mut budget = self.completion_retry.budget("achievement shortening");
        while !self.fit.fits(&sentence, self.limit_em) {
            if let Err(e) = budget.spend(format!("'{sentence}' is too wide")) {
                warn!("Dropping achievement: {e}");
                return Ok(None);
            }
            sentence = self.shorten(&sentence).await?;
        }
        Ok(Some(sentence))
    }

    async fn review(
        &self,
        human: &dyn HumanInterface,
        skill: &str,
        verb: Verb,
        sentence: String,
    ) -> Result<Option<String>, AppError> {
        if !human
            .confirm(&format!("Write a '{verb}' achievement for '{skill}'?"))
            .await?
        {
            return Ok(None);
        }

        human.show(&sentence).await?;
        let mut text = if human.confirm("Keep this achievement?").await? {
            sentence
        } else {
            let kind = PromptKind::NewAchievement;
            let suggestion = self
                .completion
                .complete(
                    kind,
                    &new_achievement_input(skill, verb.as_str()),
                    kind.default_temperature(),
                )
                .await?;
            let suggestion = suggestion.trim().to_string();
            human.show(&format!("Suggestion: {suggestion}")).await?;
            let typed = human
                .prompt_text("Achievement (empty keeps the suggestion)")
                .await?;
            if typed.is_empty() {
                suggestion
            } else {
                typed
            }
        };

        let mut budget = self.prompt_retry.budget("achievement width");
        while !self.fit.fits(&text, self.limit_em) {
            budget.spend(format!("'{text}' is too wide"))?;
            let shorter = self.shorten(&text).await?;
            human
                .show(&format!("Too long. Shorter version: {shorter}"))
                .await?;
            let typed = human
                .prompt_text("Achievement (empty keeps the shorter version)")
                .await?;
            text = if typed.is_empty() { shorter } else { typed };
        }
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::memory::MemoryBulletRepository;
    use crate::testing::{test_config, AcceptAllFit, ScriptedCompletion, ScriptedHuman, WidthFit};

    fn sentences() -> Vec<String> {
        Verb::ALL
            .iter()
            .map(|v| format!("{v} it"))
            .collect()
    }

    #[tokio::test]
    async fn test_autonomous_run_appends_one_bullet_per_verb() {
        let repo = Arc::new(MemoryBulletRepository::default());
        repo.add_skill("Kafka").await;
        let completion = ScriptedCompletion::new()
            .reply_list(PromptKind::AchievementGeneration, &sentences());
        let builder = AchievementBuilder::new(
            Arc::new(completion),
            repo.clone(),
            Arc::new(AcceptAllFit),
            &test_config(),
        );

        let report = builder.run().await.unwrap();
        assert_eq!(report.skills, 1);
        assert_eq!(report.bullets, 5);
        assert!(repo.skills_missing_bullets().await.unwrap().is_empty());

        let records = repo.query_by_skills(&["kafka".into()]).await.unwrap();
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.quality.is_none()));
    }

    #[tokio::test]
    async fn test_failing_skill_does_not_block_the_rest() {
        let repo = Arc::new(MemoryBulletRepository::default());
        repo.add_skill("Kafka").await;
        repo.add_skill("Spark").await;
        let completion = ScriptedCompletion::new()
            .reply_list(PromptKind::AchievementGeneration, &["only one"])
            .reply_list(PromptKind::AchievementGeneration, &["only one"])
            .reply_list(PromptKind::AchievementGeneration, &["only one"])
            .reply_list(PromptKind::AchievementGeneration, &sentences());
        let builder = AchievementBuilder::new(
            Arc::new(completion),
            repo.clone(),
            Arc::new(AcceptAllFit),
            &test_config(),
        );

        let report = builder.run().await.unwrap();
        assert_eq!(report.failed, vec!["Kafka".to_string()]);
        assert_eq!(report.skills, 1);
        assert_eq!(report.bullets, 5);
        assert_eq!(repo.skills_missing_bullets().await.unwrap(), vec!["Kafka"]);
        assert_eq!(repo.query_by_skills(&["spark".into()]).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_wrong_sentence_count_is_regenerated() {
        let completion = ScriptedCompletion::new()
            .reply_list(PromptKind::AchievementGeneration, &["only one"])
            .reply_list(PromptKind::AchievementGeneration, &sentences());
        let completion = Arc::new(completion);
        let builder = AchievementBuilder::new(
            completion.clone(),
            Arc::new(MemoryBulletRepository::default()),
            Arc::new(AcceptAllFit),
            &test_config(),
        );

        let built = builder.build_for_skill("Kafka").await.unwrap();
        assert_eq!(built.len(), 5);
        assert_eq!(built[1].verb, Verb::Led);
        assert_eq!(
            completion.calls_of(PromptKind::AchievementGeneration).len(),
            2
        );
    }

    #[tokio::test]
    async fn test_long_sentences_are_shortened_or_dropped() {
        let mut generated = sentences();
        generated[0] = "built an extremely long thing".to_string();
        generated[1] = "led a hopelessly verbose effort".to_string();
        let completion = ScriptedCompletion::new()
            .reply_list(PromptKind::AchievementGeneration, &generated)
            .reply(PromptKind::AchievementShortening, "built short")
            // never short enough
            .reply(PromptKind::AchievementShortening, "led still far too long")
            .reply(PromptKind::AchievementShortening, "led still far too long")
            .reply(PromptKind::AchievementShortening, "led still far too long");
        let builder = AchievementBuilder::new(
            Arc::new(completion),
            Arc::new(MemoryBulletRepository::default()),
            Arc::new(WidthFit { max_chars: 15 }),
            &test_config(),
        );

        let built = builder.build_for_skill("Kafka").await.unwrap();
        let verbs: Vec<Verb> = built.iter().map(|b| b.verb).collect();
        assert_eq!(
            verbs,
            vec![Verb::Built, Verb::Managed, Verb::Collaborated, Verb::Improved]
        );
        assert_eq!(built[0].text, "built short");
    }

    #[tokio::test]
    async fn test_operator_skips_rewrites_and_keeps() {
        let completion = ScriptedCompletion::new()
            .reply_list(PromptKind::AchievementGeneration, &sentences())
            .reply(PromptKind::NewAchievement, "Led the Kafka rollout")
            .reply(PromptKind::NewAchievement, "Managed Kafka at scale");
        let human = Arc::new(ScriptedHuman::new([
            // built: skip
            "no",
            // led: rewrite, keep the suggestion
            "yes", "no", "",
            // managed: type own text
            "yes", "no", "Managed Kafka clusters",
            // collaborated, improved: keep
            "yes", "yes", "yes", "yes",
        ]));
        let completion = Arc::new(completion);
        let builder = AchievementBuilder::new(
            completion.clone(),
            Arc::new(MemoryBulletRepository::default()),
            Arc::new(AcceptAllFit),
            &test_config(),
        )
        .with_human(human.clone());

        let built = builder.build_for_skill("Kafka").await.unwrap();
        let texts: Vec<&str> = built.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Led the Kafka rollout",
                "Managed Kafka clusters",
                "collaborated it",
                "improved it"
            ]
        );
        assert_eq!(human.remaining(), 0);
        assert!(completion.calls_of(PromptKind::NewAchievement)[0].contains("**Verb**: led"));
    }
}
