use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const SECS_PER_DAY: i64 = 86_400;
const NANOS_PER_DAY: i64 = SECS_PER_DAY * 1_000_000_000;

/// Below this many days a certificate is [`Urgency::Critical`].
pub const CRITICAL_DAYS: i64 = 10;
/// Below this many days a certificate is [`Urgency::Warning`].
pub const WARNING_DAYS: i64 = 30;

/// Whole days from `now` until `not_after`, rounded toward negative infinity.
///
/// A certificate that expired twelve hours ago is `-1` days out, not `0`.
///
/// # Examples
///
/// ```
/// use certwatch_common::days_until;
/// use chrono::{Duration, TimeZone, Utc};
///
/// let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
/// assert_eq!(days_until(now + Duration::hours(36), now), 1);
/// assert_eq!(days_until(now - Duration::hours(12), now), -1);
/// assert_eq!(days_until(now - Duration::milliseconds(500), now), -1);
/// ```
pub fn days_until(not_after: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining = not_after - now;
    match remaining.num_nanoseconds() {
        Some(nanos) => nanos.div_euclid(NANOS_PER_DAY),
        // i64 nanoseconds overflow past ~292 years.
        None => remaining.num_seconds().div_euclid(SECS_PER_DAY),
    }
}

/// The current certificate status of one monitored host.
///
/// There is at most one `Observation` per `domain`; a newer successful probe
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub domain: String,
    pub expiry_date: NaiveDate,
    pub days_left: i64,
    pub last_checked: DateTime<Utc>,
}

impl Observation {
    /// Builds the observation for a successful probe of `domain` at `now`.
    ///
    /// `last_checked` is truncated to whole seconds, which is the precision
    /// the store persists.
    pub fn from_expiry(
        domain: impl Into<String>,
        not_after: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let last_checked = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        Self {
            domain: domain.into(),
            expiry_date: not_after.date_naive(),
            days_left: days_until(not_after, now),
            last_checked,
        }
    }

    pub fn urgency(&self) -> Urgency {
        Urgency::classify(self.days_left)
    }
}

/// Three-tier bucketing of `days_left`, used for presentation only.
///
/// # Examples
///
/// ```
/// use certwatch_common::Urgency;
///
/// assert_eq!(Urgency::classify(9), Urgency::Critical);
/// assert_eq!(Urgency::classify(10), Urgency::Warning);
/// assert_eq!(Urgency::classify(30), Urgency::Healthy);
/// assert_eq!(Urgency::Warning.to_string(), "warning");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Critical,
    Warning,
    Healthy,
}

impl Urgency {
    pub fn classify(days_left: i64) -> Self {
        if days_left < CRITICAL_DAYS {
            Urgency::Critical
        } else if days_left < WARNING_DAYS {
            Urgency::Warning
        } else {
            Urgency::Healthy
        }
    }

    /// CSS class used by the status page for rows of this urgency.
    pub fn css_class(self) -> &'static str {
        match self {
            Urgency::Critical => "danger",
            Urgency::Warning => "warn",
            Urgency::Healthy => "safe",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Urgency::Critical => write!(f, "critical"),
            Urgency::Warning => write!(f, "warning"),
            Urgency::Healthy => write!(f, "healthy"),
        }
    }
}
