//! # Retry Mechanism
//!
//! Exponential backoff used by the `retry` remediation. The failed
//! operation is handed in as a [`RecoveryOperation`] and re-invoked; there is
//! no retry without something to re-run.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::types::panic_message;

/// A resumable closure re-running the operation that failed
pub type RecoveryOperation = Arc<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Wraps an async closure as a [`RecoveryOperation`]
pub fn recovery<F, Fut>(operation: F) -> RecoveryOperation
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), String>> + Send + 'static,
{
    Arc::new(move || -> BoxFuture<'static, Result<(), String>> { Box::pin(operation()) })
}

/// The result of a retry run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryResult {
    /// The operation succeeded on the given attempt (1-based)
    Recovered { attempts: u32 },
    /// All attempts failed, carrying the final error
    Exhausted { attempts: u32, last_error: String },
}

impl RetryResult {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Recovered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Recovered { attempts } | RetryResult::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Configuration for a retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Delay before the first attempt, doubled for each following one
    pub base_backoff: Duration,
    /// Upper bound for a single delay
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Deterministic exponential backoff policy
#[derive(Clone)]
pub struct RetryPolicy {
    name: String,
    config: RetryConfig,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}

impl RetryPolicy {
    pub fn new<S: Into<String>>(name: S, config: Option<RetryConfig>) -> Self {
        Self {
            name: name.into(),
            config: config.unwrap_or_default(),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Delay before `attempt` (1-based): `base * 2^(attempt - 1)`, capped
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.config.base_backoff.saturating_mul(1u32 << exponent);
        delay.min(self.config.max_backoff)
    }

    /// Re-invokes `operation` until it succeeds or attempts run out
    pub async fn execute(&self, operation: &RecoveryOperation) -> RetryResult {
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            let delay = self.calculate_backoff(attempt);
            debug!(policy = %self.name, attempt, delay_ms = delay.as_millis() as u64, "Retrying after backoff");
            sleep(delay).await;

            // a panicking operation counts as a failed attempt
            let outcome = AssertUnwindSafe(async { operation().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(format!("operation panicked: {}", panic_message(payload.as_ref()))));

            match outcome {
                Ok(()) => {
                    counter!("error_intelligence.retry.recovered", 1, "policy" => self.name.clone());
                    info!(policy = %self.name, attempt, "Retried operation recovered");
                    return RetryResult::Recovered { attempts: attempt };
                }
                Err(e) => {
                    warn!(policy = %self.name, attempt, error = %e, "Retry attempt failed");
                    last_error = e;
                }
            }
        }

        counter!("error_intelligence.retry.exhausted", 1, "policy" => self.name.clone());
        RetryResult::Exhausted {
            attempts: self.config.max_attempts,
            last_error,
        }
    }
}
