//! ============================================================================
//! Retry Logic - Exponential Backoff for Idempotent Reads
//! ============================================================================
//! Provides read retries with:
//! - Exponential backoff with jitter
//! - Error classification (retryable, rate limited, permanent)
//! - A hard attempt ceiling
//!
//! State-changing calls (create, transitions, sends) never go through here.
//! ============================================================================

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::backend::BackendError;

/// Configuration for read retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay between retries (multiplied by 2^attempt)
    pub base_delay_ms: u64,
    /// Maximum delay between retries, also used as the rate-limit pause
    pub max_delay_ms: u64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 8000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: false,
        }
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Likely transient, should retry
    Retryable,
    /// Rate limited, back off more aggressively
    RateLimited,
    /// Will fail again, don't retry
    Permanent,
}

/// Classify an HTTP status code
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        429 => ErrorKind::RateLimited,
        408 => ErrorKind::Retryable,
        500..=599 => ErrorKind::Retryable,
        _ => ErrorKind::Permanent,
    }
}

/// Calculate delay with exponential backoff and optional jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let multiplier = 2u64.saturating_pow(attempt.min(63));
    let base_delay = config.base_delay_ms.saturating_mul(multiplier);
    let capped_delay = base_delay.min(config.max_delay_ms);

    let final_delay = if config.jitter {
        // 0-50% on top of the capped delay
        let jitter_factor = 1.0 + rand::thread_rng().gen_range(0.0..=0.5);
        (capped_delay as f64 * jitter_factor) as u64
    } else {
        capped_delay
    };

    Duration::from_millis(final_delay)
}

/// Run an idempotent read, retrying transient failures.
/// Returns the last error once attempts are exhausted.
pub async fn retry_read<T, F, Fut>(
    label: &str,
    config: &RetryConfig,
    mut op: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let attempts = config.max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        if attempt > 0 {
            let delay = calculate_delay(attempt - 1, config);
            debug!("{}: retry attempt {} after {:?} delay", label, attempt, delay);
            sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let kind = e.kind();
                warn!("{}: attempt {} failed ({:?}): {}", label, attempt + 1, kind, e);

                match kind {
                    ErrorKind::Permanent => return Err(e),
                    ErrorKind::RateLimited => {
                        let pause = Duration::from_millis(config.max_delay_ms);
                        warn!("{}: rate limited, waiting {:?}", label, pause);
                        sleep(pause).await;
                    }
                    ErrorKind::Retryable => {}
                }

                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        BackendError::Network(format!("{}: no attempts were made", label))
    }))
}
