//! Capped exponential backoff.
//!
//! No jitter is applied, so a given attempt count always maps to the same
//! wait.

use std::time::Duration;

/// Wait before the first retry.
pub const DEFAULT_BASE: Duration = Duration::from_secs(1);

/// Upper bound for any single wait.
pub const DEFAULT_MAX: Duration = Duration::from_secs(10);

/// Attempt counts above this are clamped before exponentiation.
const MAX_EXPONENT: u32 = 30;

/// Wait duration for retry attempt `attempt` under the default policy:
/// `min(2^attempt s, 10 s)`.
pub fn backoff(attempt: u32) -> Duration {
    Backoff::default().delay(attempt)
}

/// `min(base * 2^attempt, max)` with `attempt` clamped to `[0, 30]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(MAX_EXPONENT);
        self.base.saturating_mul(1u32 << exponent).min(self.max)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_BASE, DEFAULT_MAX)
    }
}
