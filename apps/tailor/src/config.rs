use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::retry::RetryPolicy;

/// Application configuration loaded from environment variables.
/// Resolved once at startup and passed explicitly to the engines.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// `true` runs both engines autonomously, `false` asks a human at every decision point.
    pub robo_tailor: bool,
    pub max_concurrency: usize,
    pub completion_timeout: Duration,
    pub max_completion_attempts: u32,
    pub retry_backoff: Duration,
    pub max_prompt_attempts: u32,
    pub job_timeout: Duration,
    pub lock_ttl: Duration,
    pub limits: FitLimits,
    pub profiles: Vec<String>,
}

/// How the engines resolve decisions: on their own, or by asking an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Autonomous,
    HumanConfirmation,
}

/// Rendering-width limits (em units) handed to the fit predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitLimits {
    pub skill_em: f32,
    pub achievement_em: f32,
}

impl Default for FitLimits {
    fn default() -> Self {
        Self {
            skill_em: 12.0,
            achievement_em: 85.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = FitLimits::default();

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            robo_tailor: match std::env::var("ROBO_TAILOR") {
                Ok(raw) => parse_bool(&raw).context("ROBO_TAILOR must be a boolean")?,
                Err(_) => true,
            },
            max_concurrency: parse_env::<usize>("MAX_CONCURRENCY", 4)?.max(1),
            completion_timeout: Duration::from_secs(parse_env("COMPLETION_TIMEOUT_SECS", 60)?),
            max_completion_attempts: parse_env::<u32>("MAX_COMPLETION_ATTEMPTS", 5)?.max(1),
            retry_backoff: Duration::from_millis(parse_env("RETRY_BACKOFF_MS", 500)?),
            max_prompt_attempts: parse_env::<u32>("MAX_PROMPT_ATTEMPTS", 10)?.max(1),
            job_timeout: Duration::from_secs(parse_env("JOB_TIMEOUT_SECS", 600)?),
            lock_ttl: Duration::from_secs(parse_env("LOCK_TTL_SECS", 900)?),
            limits: FitLimits {
                skill_em: parse_env("SKILL_WIDTH_EM", defaults.skill_em)?,
                achievement_em: parse_env("ACHIEVEMENT_WIDTH_EM", defaults.achievement_em)?,
            },
            profiles: parse_list(
                &std::env::var("RESUME_PROFILES").unwrap_or_else(|_| "data,software".to_string()),
            ),
        })
    }

    pub fn mode(&self) -> Mode {
        if self.robo_tailor {
            Mode::Autonomous
        } else {
            Mode::HumanConfirmation
        }
    }

    /// Retry policy for completions whose output fails validation.
    pub fn completion_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_completion_attempts, self.retry_backoff)
    }

    /// Retry policy for human answers. No backoff: the human is the delay.
    pub fn prompt_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_prompt_attempts, Duration::ZERO)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => bail!("'{other}' is not a boolean"),
    }
}

pub(crate) fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
