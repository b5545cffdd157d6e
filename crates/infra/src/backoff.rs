//! Backoff policies: attempt number in, wait duration out.

use std::time::Duration;

use invsync_core::RetrySettings;

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
pub const DEFAULT_FIXED_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackoffError {
    #[error("unknown backoff strategy: {0}")]
    UnknownStrategy(String),

    #[error("invalid backoff parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How long to wait before retry number `attempt` (1-based).
///
/// Policies are pure, so one value can be shared across any number of
/// executors.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffPolicy {
    /// `initial_delay * backoff_factor^(attempt - 1)`.
    Exponential {
        initial_delay: Duration,
        backoff_factor: f64,
    },
    /// The same delay for every attempt.
    Fixed { delay: Duration },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Exponential {
            initial_delay: DEFAULT_INITIAL_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl BackoffPolicy {
    pub fn exponential(initial_delay: Duration, backoff_factor: f64) -> Result<Self, BackoffError> {
        if !backoff_factor.is_finite() || backoff_factor < 0.0 {
            return Err(BackoffError::InvalidParameter {
                name: "backoff_factor",
                reason: format!("must be a finite, non-negative number (got {backoff_factor})"),
            });
        }
        Ok(Self::Exponential {
            initial_delay,
            backoff_factor,
        })
    }

    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed { delay }
    }

    /// Build a policy from a strategy name, filling omitted parameters with
    /// the defaults.
    pub fn from_name(
        strategy: &str,
        initial_delay: Option<Duration>,
        backoff_factor: Option<f64>,
        fixed_delay: Option<Duration>,
    ) -> Result<Self, BackoffError> {
        match strategy {
            "exponential" => Self::exponential(
                initial_delay.unwrap_or(DEFAULT_INITIAL_DELAY),
                backoff_factor.unwrap_or(DEFAULT_BACKOFF_FACTOR),
            ),
            "fixed" => Ok(Self::fixed(fixed_delay.unwrap_or(DEFAULT_FIXED_DELAY))),
            other => Err(BackoffError::UnknownStrategy(other.to_string())),
        }
    }

    /// Policy described by a tenant's retry settings.
    pub fn from_settings(settings: &RetrySettings) -> Result<Self, BackoffError> {
        Self::from_name(
            &settings.strategy,
            settings.initial_delay_ms.map(Duration::from_millis),
            settings.backoff_factor,
            settings.delay_ms.map(Duration::from_millis),
        )
    }

    /// Delay before retry `attempt`. Attempt 0 (the initial call) never waits.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        match *self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                initial_delay,
                backoff_factor,
            } => {
                let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let nanos = initial_delay.as_nanos() as f64 * backoff_factor.powi(exp);
                // `as` saturates at u64::MAX (and maps NaN to 0).
                Duration::from_nanos(nanos.round() as u64)
            }
        }
    }
}
