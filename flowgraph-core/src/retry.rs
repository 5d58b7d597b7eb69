//! 重试控制：有限次数 + 固定间隔 + 兜底

use crate::error::{FlowError, FlowResult};
use futures::future::BoxFuture;
use std::time::Duration;

/// Bounded retry around a node's compute phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first try, so it must be at least 1.
    pub fn new(max_attempts: u32, wait: Duration) -> FlowResult<Self> {
        if max_attempts == 0 {
            return Err(FlowError::Config(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self { max_attempts, wait })
    }

    /// A single attempt; failures go straight to the fallback.
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            wait: Duration::ZERO,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// Invoke `compute` with the same input until it succeeds or the attempt
    /// budget is spent, then hand the last error to `fallback` exactly once.
    pub async fn run<'a, I, T, C, F>(
        &self,
        node: &str,
        input: &'a I,
        mut compute: C,
        fallback: F,
    ) -> FlowResult<T>
    where
        I: ?Sized,
        C: FnMut(&'a I) -> BoxFuture<'a, anyhow::Result<T>>,
        F: FnOnce(&'a I, anyhow::Error) -> BoxFuture<'a, anyhow::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match compute(input).await {
                Ok(output) => return Ok(output),
                Err(error) if attempt < self.max_attempts => {
                    tracing::warn!(
                        node = %node,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "compute failed, retrying"
                    );
                    if !self.wait.is_zero() {
                        tokio::time::sleep(self.wait).await;
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        node = %node,
                        attempts = attempt,
                        error = %error,
                        "retries exhausted, running fallback"
                    );
                    return fallback(input, error).await.map_err(|source| {
                        FlowError::Fallback {
                            node: node.to_string(),
                            attempts: attempt,
                            source,
                        }
                    });
                }
            }
        }
    }
}
