//! Bounded retry loop around a fallible async operation.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::backoff::BackoffPolicy;

pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// One scheduled retry: which attempt comes next and how long we wait for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    pub attempt: u32,
    pub delay: Duration,
}

/// Runs an operation, retrying failures up to `max_retries` times.
///
/// Retries are strictly sequential. The error returned after exhaustion is
/// the last one the operation produced, unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExecutor {
    max_retries: u32,
    policy: BackoffPolicy,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            policy: BackoffPolicy::default(),
        }
    }
}

impl RetryExecutor {
    pub fn new(max_retries: u32, policy: BackoffPolicy) -> Self {
        Self { max_retries, policy }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Call `operation` until it succeeds or retries run out.
    ///
    /// At most `max_retries + 1` calls are made.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(err);
                    }

                    let next = RetryAttempt {
                        attempt,
                        delay: self.policy.delay(attempt),
                    };
                    warn!(
                        attempt = next.attempt,
                        max_retries = self.max_retries,
                        delay_ms = next.delay.as_millis() as u64,
                        error = %err,
                        "operation failed, retrying"
                    );
                    tokio::time::sleep(next.delay).await;
                }
            }
        }
    }
}
