//! Backoff between retries, shared by discovery and command execution.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::DEFAULT_RETRY_STEP_MS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// `step * attempt`
    Linear { step_ms: u64 },
    /// `min(base * factor^(attempt - 1), max)` plus up to `jitter * delay` extra
    Exponential {
        base_ms: u64,
        factor: f64,
        max_ms: u64,
        jitter: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Linear {
            step_ms: DEFAULT_RETRY_STEP_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `attempt` (1-based). Attempt 0 is
    /// the first try and never waits.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        match *self {
            Self::Linear { step_ms } => Duration::from_millis(step_ms.saturating_mul(u64::from(attempt))),
            Self::Exponential {
                base_ms,
                factor,
                max_ms,
                jitter,
            } => {
                let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
                let raw = (base_ms as f64) * factor.max(1.0).powi(exponent);
                let capped = raw.min(max_ms as f64);
                let spread = capped * jitter.clamp(0.0, 1.0);
                let extra = if spread > 0.0 {
                    rand::thread_rng().gen_range(0.0..=spread)
                } else {
                    0.0
                };
                Duration::from_millis((capped + extra) as u64)
            }
        }
    }

    /// Sleeps for [`Self::delay`].
    pub async fn wait(&self, attempt: u32) {
        let delay = self.delay(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
