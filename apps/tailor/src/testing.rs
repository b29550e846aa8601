//! Scripted fakes for the ports, shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{Config, FitLimits};
use crate::errors::AppError;
use crate::fit::FitPredicate;
use crate::human::{parse_yes_no, HumanInterface};
use crate::llm_client::prompts::{join_items, PromptKind};
use crate::llm_client::TextCompletion;

/// Replies per prompt kind, in order. Running out of replies is an `AppError::Llm`.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<HashMap<PromptKind, VecDeque<String>>>,
    calls: Mutex<Vec<(PromptKind, String)>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, kind: PromptKind, text: impl Into<String>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push_back(text.into());
        self
    }

    /// Scripts a delimiter-joined list reply.
    pub fn reply_list<S: AsRef<str>>(self, kind: PromptKind, items: &[S]) -> Self {
        self.reply(kind, join_items(items))
    }

    pub fn calls(&self) -> Vec<(PromptKind, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: PromptKind) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, input)| input)
            .collect()
    }
}

#[async_trait]
impl TextCompletion for ScriptedCompletion {
    async fn complete(
        &self,
        kind: PromptKind,
        input: &str,
        _temperature: f32,
    ) -> Result<String, AppError> {
        self.calls.lock().unwrap().push((kind, input.to_string()));
        self.replies
            .lock()
            .unwrap()
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| AppError::Llm(format!("no scripted reply for {kind:?}")))
    }
}

/// Answers questions and prompts from one queue; records everything shown.
#[derive(Default)]
pub struct ScriptedHuman {
    answers: Mutex<VecDeque<String>>,
    shown: Mutex<Vec<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedHuman {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().unwrap().len()
    }

    fn next(&self, question: &str) -> Result<String, AppError> {
        self.asked.lock().unwrap().push(question.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Human(format!("script ran out at '{question}'")))
    }
}

#[async_trait]
impl HumanInterface for ScriptedHuman {
    async fn confirm(&self, question: &str) -> Result<bool, AppError> {
        loop {
            if let Some(yes) = parse_yes_no(&self.next(question)?) {
                return Ok(yes);
            }
        }
    }

    async fn prompt_text(&self, label: &str) -> Result<String, AppError> {
        Ok(self.next(label)?.trim().to_string())
    }

    async fn show(&self, text: &str) -> Result<(), AppError> {
        self.shown.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub struct AcceptAllFit;

impl FitPredicate for AcceptAllFit {
    fn fits(&self, _text: &str, _limit_em: f32) -> bool {
        true
    }
}

/// Fits when the trimmed text has at most `max_chars` characters; ignores the em limit.
pub struct WidthFit {
    pub max_chars: usize,
}

impl FitPredicate for WidthFit {
    fn fits(&self, text: &str, _limit_em: f32) -> bool {
        text.trim().chars().count() <= self.max_chars
    }
}

/// `count` distinct labels: `prefix 1`, `prefix 2`, …
pub fn labels(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{prefix} {i}")).collect()
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/tailor_test".to_string(),
        redis_url: "redis://localhost".to_string(),
        anthropic_api_key: "test-key".to_string(),
        port: 0,
        rust_log: "debug".to_string(),
        robo_tailor: true,
        max_concurrency: 2,
        completion_timeout: Duration::from_secs(5),
        max_completion_attempts: 3,
        retry_backoff: Duration::ZERO,
        max_prompt_attempts: 3,
        job_timeout: Duration::from_secs(30),
        lock_ttl: Duration::from_secs(60),
        limits: FitLimits::default(),
        profiles: vec!["data".to_string(), "software".to_string()],
    }
}
