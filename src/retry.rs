//! Bounded retries around a page fetch.
//!
//! Every attempt opens a fresh session and closes it before the result is
//! inspected. Attempts are separated by a fixed backoff. Errors that are not
//! retryable end the loop immediately.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::session::{PageSession, SessionLauncher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// One unit of work performed inside a session.
#[async_trait]
pub trait PageFetch: Send + Sync {
    type Output: Send;

    async fn fetch(&self, session: &mut dyn PageSession) -> Result<Self::Output, FetchError>;
}

#[derive(Debug, Clone)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Returns the last error once attempts are exhausted or a final error
    /// is hit.
    pub async fn run<F: PageFetch>(
        &self,
        launcher: &dyn SessionLauncher,
        op: &F,
    ) -> Result<F::Output, FetchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match attempt_once(launcher, op).await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "fetch succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::warn!(attempt, error = %err, "fetch failed; not retryable");
                return Err(err);
            }
            if attempt >= max_attempts {
                tracing::warn!(attempt, error = %err, "fetch failed; attempts exhausted");
                return Err(err);
            }

            tracing::warn!(
                attempt,
                max_attempts,
                backoff_ms = self.policy.backoff.as_millis() as u64,
                error = %err,
                "fetch failed; retrying"
            );
            tokio::time::sleep(self.policy.backoff).await;
            attempt += 1;
        }
    }

    /// Soft-failure form of [`RetryController::run`].
    pub async fn run_soft<F: PageFetch>(
        &self,
        launcher: &dyn SessionLauncher,
        op: &F,
    ) -> Option<F::Output> {
        self.run(launcher, op).await.ok()
    }
}

async fn attempt_once<F: PageFetch>(
    launcher: &dyn SessionLauncher,
    op: &F,
) -> Result<F::Output, FetchError> {
    let mut session = launcher.open().await?;
    let result = op.fetch(session.as_mut()).await;
    session.close().await;
    result
}
