//! Per-job exclusivity: no two passes over the same job may run at once,
//! across tasks (memory lock) or across processes (Redis lock).

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use redis::Client as RedisClient;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::AppError;

/// Proof of holding a job's lock; hand it back to `release`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    pub job_id: String,
    token: String,
}

#[async_trait]
pub trait JobLock: Send + Sync {
    /// `None` when another pass already holds the job.
    async fn try_acquire(&self, job_id: &str) -> Result<Option<LockToken>, AppError>;

    async fn release(&self, token: LockToken) -> Result<(), AppError>;
}

const LOCK_PREFIX: &str = "tailor:job-lock:";

/// Deletes the key only if it still holds our token, so an expired-then-retaken lock survives.
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct RedisJobLock {
    client: RedisClient,
    ttl: Duration,
}

impl RedisJobLock {
    pub fn new(client: RedisClient, ttl: Duration) -> Self {
        Self { client, ttl }
    }
}

#[async_trait]
impl JobLock for RedisJobLock {
    async fn try_acquire(&self, job_id: &str) -> Result<Option<LockToken>, AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let token = Uuid::new_v4().to_string();
        let key = format!("{LOCK_PREFIX}{job_id}");

        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        if reply.is_none() {
            debug!("Lock for job {job_id} is held elsewhere");
            return Ok(None);
        }
        Ok(Some(LockToken {
            job_id: job_id.to_string(),
            token,
        }))
    }

    async fn release(&self, token: LockToken) -> Result<(), AppError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let deleted: i32 = redis::Script::new(RELEASE_SCRIPT)
            .key(format!("{LOCK_PREFIX}{}", token.job_id))
            .arg(&token.token)
            .invoke_async(&mut conn)
            .await?;

        if deleted == 0 {
            warn!(
                "Lock for job {} expired before release; the pass outlived LOCK_TTL_SECS",
                token.job_id
            );
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryJobLock {
    held: Mutex<HashSet<String>>,
}

#[async_trait]
impl JobLock for MemoryJobLock {
    async fn try_acquire(&self, job_id: &str) -> Result<Option<LockToken>, AppError> {
        if !self.held.lock().await.insert(job_id.to_string()) {
            return Ok(None);
        }
        Ok(Some(LockToken {
            job_id: job_id.to_string(),
            token: Uuid::new_v4().to_string(),
        }))
    }

    async fn release(&self, token: LockToken) -> Result<(), AppError> {
        self.held.lock().await.remove(&token.job_id);
        Ok(())
    }
}
