//! Human-interface port for the confirmation modes, and its terminal implementation.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::errors::AppError;
use crate::retry::RetryPolicy;

/// Line-based, synchronous-from-the-engine's-view interaction with an operator.
#[async_trait]
pub trait HumanInterface: Send + Sync {
    /// Yes/no question. Implementations re-ask on anything else, within their own bound.
    async fn confirm(&self, question: &str) -> Result<bool, AppError>;

    /// Free-text answer, trimmed.
    async fn prompt_text(&self, label: &str) -> Result<String, AppError>;

    /// Displays information (suggestions, grouped bullets, progress).
    async fn show(&self, text: &str) -> Result<(), AppError>;
}

pub fn parse_yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "yes" | "y" => Some(true),
        "no" | "n" => Some(false),
        _ => None,
    }
}

pub struct TerminalHuman {
    lines: Mutex<Lines<BufReader<Stdin>>>,
    retry: RetryPolicy,
}

impl TerminalHuman {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            retry,
        }
    }

    async fn write(&self, text: &str) -> Result<(), AppError> {
        let mut out = tokio::io::stdout();
        out.write_all(text.as_bytes())
            .await
            .map_err(|e| AppError::Human(format!("stdout: {e}")))?;
        out.flush()
            .await
            .map_err(|e| AppError::Human(format!("stdout: {e}")))
    }

    async fn read_line(&self) -> Result<String, AppError> {
        let mut lines = self.lines.lock().await;
        match lines
            .next_line()
            .await
            .map_err(|e| AppError::Human(format!("stdin: {e}")))?
        {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(AppError::Human("stdin closed".to_string())),
        }
    }
}

#[async_trait]
impl HumanInterface for TerminalHuman {
    async fn confirm(&self, question: &str) -> Result<bool, AppError> {
        let mut budget = self.retry.budget("yes/no answer");
        self.write(&format!("{question} (yes/no): ")).await?;
        loop {
            let answer = self.read_line().await?;
            if let Some(yes) = parse_yes_no(&answer) {
                return Ok(yes);
            }
            budget.spend(format!("'{answer}' is not yes or no"))?;
            self.write("Please answer with 'yes' or 'no': ").await?;
        }
    }

    async fn prompt_text(&self, label: &str) -> Result<String, AppError> {
        self.write(&format!("{label}: ")).await?;
        self.read_line().await
    }

    async fn show(&self, text: &str) -> Result<(), AppError> {
        self.write(&format!("{text}\n")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("Yes"), Some(true));
        assert_eq!(parse_yes_no(" n "), Some(false));
        assert_eq!(parse_yes_no("maybe"), None);
        assert_eq!(parse_yes_no(""), None);
    }
}
