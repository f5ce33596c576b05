//! Service configuration.
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::time::Duration as StdDuration;

use chrono::Duration;
use proof_core::attribution::{AttributionValidator, ATTRIBUTION_WINDOW_DAYS};
use proof_core::context::{RECENT_SALES_WINDOW_HOURS, RECENT_SALE_LOOKBACK_HOURS};
use proof_core::cookie::{COOKIE_LIFETIME_DAYS, COOKIE_PREFIX};
use proof_observability::LoggingConfig;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::retry::{BackoffStrategy, RetryPolicy};

/// Longest attribution window or cookie lifetime accepted, in days.
pub const MAX_DAYS: i64 = 3650;
/// Longest context lookback accepted, in hours.
pub const MAX_HOURS: i64 = MAX_DAYS * 24;
/// Most tries allowed per counter increment.
pub const MAX_COUNTER_ATTEMPTS: u32 = 10;
/// Longest single backoff between counter retries, in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProofConfig {
    pub attribution: AttributionConfig,
    pub context: ContextConfig,
    pub counters: CounterConfig,
    pub logging: LoggingConfig,
}

impl ProofConfig {
    /// Reject values no service can work with.
    ///
    /// Every duration is bounded so converting it to a `chrono::Duration`
    /// cannot overflow.
    pub fn validate(&self) -> ServiceResult<()> {
        let a = &self.attribution;
        check_range("attribution.window_days", a.window_days, 1, MAX_DAYS)?;
        check_range("attribution.cookie_lifetime_days", a.cookie_lifetime_days, 1, MAX_DAYS)?;
        if a.cookie_prefix.trim().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "attribution.cookie_prefix must not be empty".to_string(),
            ));
        }
        let c = &self.context;
        check_range("context.recent_sale_lookback_hours", c.recent_sale_lookback_hours, 1, MAX_HOURS)?;
        check_range("context.recent_sales_window_hours", c.recent_sales_window_hours, 1, MAX_HOURS)?;
        let n = &self.counters;
        check_range("counters.max_attempts", n.max_attempts, 1, MAX_COUNTER_ATTEMPTS)?;
        check_range("counters.backoff_base_ms", n.backoff_base_ms, 0, MAX_BACKOFF_MS)?;
        check_range("counters.backoff_max_ms", n.backoff_max_ms, 0, MAX_BACKOFF_MS)?;
        if a.cookie_lifetime_days < a.window_days {
            tracing::warn!(
                window_days = a.window_days,
                cookie_lifetime_days = a.cookie_lifetime_days,
                "attribution cookie expires before the attribution window closes"
            );
        }
        Ok(())
    }
}

fn check_range<T>(field: &str, value: T, min: T, max: T) -> ServiceResult<()>
where
    T: PartialOrd + std::fmt::Display,
{
    if value < min || value > max {
        return Err(ServiceError::InvalidConfig(format!(
            "{} must be between {} and {}, got {}",
            field, min, max, value
        )));
    }
    Ok(())
}

/// `[attribution]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Days a purchase may follow the click and still be credited.
    pub window_days: i64,
    /// Days the click cookie lives in the browser.
    pub cookie_lifetime_days: i64,
    pub cookie_prefix: String,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            window_days: ATTRIBUTION_WINDOW_DAYS,
            cookie_lifetime_days: COOKIE_LIFETIME_DAYS,
            cookie_prefix: COOKIE_PREFIX.to_string(),
        }
    }
}

impl AttributionConfig {
    /// Attribution window, clamped to `0..=MAX_DAYS`.
    pub fn window(&self) -> Duration {
        Duration::days(self.window_days.clamp(0, MAX_DAYS))
    }

    /// Cookie lifetime, clamped to `0..=MAX_DAYS`.
    pub fn cookie_lifetime(&self) -> Duration {
        Duration::days(self.cookie_lifetime_days.clamp(0, MAX_DAYS))
    }

    /// Validator using this window.
    pub fn validator(&self) -> AttributionValidator {
        AttributionValidator::new(self.window())
    }
}

/// `[context]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub recent_sale_lookback_hours: i64,
    pub recent_sales_window_hours: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recent_sale_lookback_hours: RECENT_SALE_LOOKBACK_HOURS,
            recent_sales_window_hours: RECENT_SALES_WINDOW_HOURS,
        }
    }
}

impl ContextConfig {
    /// How far back the most recent sale is looked up, clamped to `0..=MAX_HOURS`.
    pub fn lookback(&self) -> Duration {
        Duration::hours(self.recent_sale_lookback_hours.clamp(0, MAX_HOURS))
    }

    /// Span of the recent sales count, clamped to `0..=MAX_HOURS`.
    pub fn sales_window(&self) -> Duration {
        Duration::hours(self.recent_sales_window_hours.clamp(0, MAX_HOURS))
    }
}

/// `[counters]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Total tries per increment, first one included.
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 25,
            backoff_max_ms: 250,
        }
    }
}

impl CounterConfig {
    /// Exponential backoff policy for counter increments.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_backoff(BackoffStrategy::Exponential {
            base: StdDuration::from_millis(self.backoff_base_ms),
            max: StdDuration::from_millis(self.backoff_max_ms),
        })
    }
}
