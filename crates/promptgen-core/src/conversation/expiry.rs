//! Age-based expiry of stored sessions
//!
//! There is no background timer. The store runs the sweep on every write, so
//! an idle deployment does no work and a stale record can outlive its TTL
//! until the next write to any session.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Default session lifetime
pub const DEFAULT_MAX_AGE_HOURS: u64 = 24;

/// Render a timestamp in the fixed-width form stored in `updated_at`.
///
/// Always UTC, always microseconds, always `Z`: string order is time order,
/// which the sweep relies on.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Expiry policy bound to a maximum session age
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    max_age: Option<Duration>,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::from_hours(DEFAULT_MAX_AGE_HOURS)
    }
}

impl ExpiryPolicy {
    /// Build a policy from an age in hours; `0` disables expiry
    pub fn from_hours(hours: u64) -> Self {
        let max_age = match i64::try_from(hours) {
            Ok(0) => None,
            Ok(h) => Duration::try_hours(h),
            Err(_) => None,
        };
        Self { max_age }
    }

    pub fn disabled() -> Self {
        Self { max_age: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_age.is_some()
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age
    }

    /// Records updated strictly before this instant are stale
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_age.and_then(|age| now.checked_sub_signed(age))
    }

    pub fn is_expired(&self, updated_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.cutoff(now).map_or(false, |cutoff| updated_at < cutoff)
    }
}
