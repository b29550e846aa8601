//! Bounded retry policy for completions and human answers that fail validation.
//!
//! An attempt either finishes, reports a mismatch (the same request is re-issued),
//! or fails with an `AppError`, which is propagated immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::AppError;

/// Outcome of a single validated attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    Mismatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff,
            max_backoff: base_backoff * 16,
        }
    }

    /// Delay before retry number `retry` (1-based): base, 2×base, 4×base… capped.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(factor).min(self.max_backoff)
    }

    /// Runs `op` until it returns `Attempt::Done`, an error, or the attempt budget is spent.
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, stage: &'static str, mut op: F) -> Result<T, AppError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Attempt<T>, AppError>>,
    {
        let mut last_problem = String::from("no attempt made");

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay = self.backoff_for(attempt - 1);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            match op(attempt).await? {
                Attempt::Done(value) => return Ok(value),
                Attempt::Mismatch(problem) => {
                    warn!(
                        "{} attempt {}/{} rejected: {}",
                        stage, attempt, self.max_attempts, problem
                    );
                    last_problem = problem;
                }
            }
        }

        Err(AppError::RetriesExhausted {
            stage,
            attempts: self.max_attempts,
            last_problem,
        })
    }

    /// Rejection counter for interactive loops that keep their own state between attempts.
    pub fn budget(&self, stage: &'static str) -> Budget {
        Budget {
            stage,
            max_attempts: self.max_attempts,
            rejected: 0,
        }
    }
}

#[derive(Debug)]
pub struct Budget {
    stage: &'static str,
    max_attempts: u32,
    rejected: u32,
}

impl Budget {
    /// Records one rejected attempt; errors once `max_attempts` attempts were rejected.
    pub fn spend(&mut self, problem: impl Into<String>) -> Result<(), AppError> {
        let problem = problem.into();
        self.rejected += 1;
        if self.rejected >= self.max_attempts {
            return Err(AppError::RetriesExhausted {
                stage: self.stage,
                attempts: self.rejected,
                last_problem: problem,
            });
        }
        warn!(
            "{} attempt {}/{} rejected: {}",
            self.stage, self.rejected, self.max_attempts, problem
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(9), Duration::from_millis(1600));
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_mismatches() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let policy = RetryPolicy::new(4, Duration::from_millis(50));

        let value = policy
            .run("test stage", |attempt| async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                if attempt < 3 {
                    Ok(Attempt::Mismatch(format!("attempt {attempt} bad")))
                } else {
                    Ok(Attempt::Done(attempt))
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_last_problem() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let err = policy
            .run("skill extraction", |attempt| async move {
                Ok::<Attempt<()>, AppError>(Attempt::Mismatch(format!("count off on {attempt}")))
            })
            .await
            .unwrap_err();

        match err {
            AppError::RetriesExhausted {
                stage,
                attempts,
                last_problem,
            } => {
                assert_eq!(stage, "skill extraction");
                assert_eq!(attempts, 2);
                assert_eq!(last_problem, "count off on 2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_budget_allows_max_minus_one_rejections() {
        let mut budget = RetryPolicy::new(3, Duration::ZERO).budget("yes/no answer");
        assert!(budget.spend("maybe").is_ok());
        assert!(budget.spend("perhaps").is_ok());
        let err = budget.spend("dunno").unwrap_err();
        assert!(err.to_string().contains("dunno"));
    }

    #[tokio::test]
    async fn test_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let err = policy
            .run("store write", |_| async move {
                calls_ref.fetch_add(1, Ordering::SeqCst);
                Err::<Attempt<()>, _>(AppError::NotFound("job 1".into()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
