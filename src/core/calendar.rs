//! Business calendar arithmetic.
//!
//! Pure functions over a [`BusinessCalendarPolicy`]: membership tests,
//! next start/end boundaries, and business time between two instants. All
//! arithmetic happens on local calendar days in the policy timezone and is
//! converted back to UTC instants, so weekday and DST handling follow the
//! timezone database.
//!
//! Business windows are inclusive at `start` and exclusive at `end`.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::core::error::{EngineError, EngineResult};

/// Upper bound on how far a non-existent local time is pushed forward (DST gaps).
const MAX_GAP_MINUTES: i64 = 180;

/// Recurring weekly business hours in one timezone.
///
/// Construction validates the policy; an instance is always usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessCalendarPolicy {
    timezone: Tz,
    business_days: [bool; 7],
    start: NaiveTime,
    end: NaiveTime,
}

impl BusinessCalendarPolicy {
    /// Validate and build a policy.
    ///
    /// Fails with [`EngineError::PolicyMisconfigured`] when `start >= end` or
    /// no weekday is a business day.
    pub fn new(
        timezone: Tz,
        business_days: impl IntoIterator<Item = Weekday>,
        start: NaiveTime,
        end: NaiveTime,
    ) -> EngineResult<Self> {
        if start >= end {
            return Err(EngineError::PolicyMisconfigured(format!(
                "start {} must be before end {}",
                start.format("%H:%M"),
                end.format("%H:%M")
            )));
        }
        let mut days = [false; 7];
        for day in business_days {
            days[day.num_days_from_monday() as usize] = true;
        }
        if !days.iter().any(|d| *d) {
            return Err(EngineError::PolicyMisconfigured(
                "business weekday set is empty".into(),
            ));
        }
        Ok(Self {
            timezone,
            business_days: days,
            start,
            end,
        })
    }

    /// Policy timezone.
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Daily opening time.
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    /// Daily closing time.
    pub const fn end(&self) -> NaiveTime {
        self.end
    }

    /// Whether `day` is a business weekday.
    pub fn is_business_weekday(&self, day: Weekday) -> bool {
        self.business_days[day.num_days_from_monday() as usize]
    }

    /// Business weekdays, Monday first.
    pub fn business_weekdays(&self) -> Vec<Weekday> {
        let mut day = Weekday::Mon;
        let mut out = Vec::new();
        for _ in 0..7 {
            if self.is_business_weekday(day) {
                out.push(day);
            }
            day = day.succ();
        }
        out
    }

    fn is_business_date(&self, date: NaiveDate) -> bool {
        self.is_business_weekday(date.weekday())
    }

    fn local_date(&self, t: DateTime<Utc>) -> NaiveDate {
        t.with_timezone(&self.timezone).date_naive()
    }

    /// UTC instant of `time` on local `date`.
    fn at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        resolve_local(self.timezone, date.and_time(time))
    }

    /// UTC instant of local midnight opening `date`.
    fn midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        self.at(date, NaiveTime::MIN)
    }
}

impl fmt::Display for BusinessCalendarPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<String> = self
            .business_weekdays()
            .iter()
            .map(ToString::to_string)
            .collect();
        write!(
            f,
            "{} {}-{} {}",
            days.join(","),
            self.start.format("%H:%M"),
            self.end.format("%H:%M"),
            self.timezone.name()
        )
    }
}

/// Map a local wall-clock time to UTC.
///
/// Ambiguous times (DST fall-back) take the earliest instant. Times inside a
/// DST gap move forward to the first wall-clock minute that exists.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    let mut probe = naive;
    for _ in 0..=MAX_GAP_MINUTES {
        if let Some(resolved) = tz.from_local_datetime(&probe).earliest() {
            return resolved.with_timezone(&Utc);
        }
        probe += Duration::minutes(1);
    }
    Utc.from_utc_datetime(&naive)
}

/// True iff `t` falls on a business weekday inside `[start, end)` local time.
pub fn is_business_instant(policy: &BusinessCalendarPolicy, t: DateTime<Utc>) -> bool {
    let local = t.with_timezone(&policy.timezone);
    if !policy.is_business_weekday(local.weekday()) {
        return false;
    }
    let time = local.time();
    time >= policy.start && time < policy.end
}

/// Opening instant at or after `t`.
///
/// Returns today's opening when `t` is at or before it on a business day,
/// otherwise the opening of the next business day. Non-business weekdays are
/// skipped entirely.
pub fn next_business_start(policy: &BusinessCalendarPolicy, t: DateTime<Utc>) -> DateTime<Utc> {
    next_boundary(policy, t, policy.start)
}

/// Closing instant of the current or next business day.
///
/// Returns today's closing when `t` is before it on a business day,
/// otherwise the closing of the next business day.
pub fn next_business_end(policy: &BusinessCalendarPolicy, t: DateTime<Utc>) -> DateTime<Utc> {
    next_boundary(policy, t, policy.end)
}

fn next_boundary(
    policy: &BusinessCalendarPolicy,
    t: DateTime<Utc>,
    boundary: NaiveTime,
) -> DateTime<Utc> {
    let mut day = policy.local_date(t);
    if policy.is_business_date(day) {
        let candidate = policy.at(day, boundary);
        if candidate >= t {
            return candidate;
        }
    }
    // a non-empty weekday set guarantees a hit within a week
    for _ in 0..7 {
        let Some(next) = day.succ_opt() else {
            break;
        };
        day = next;
        if policy.is_business_date(day) {
            return policy.at(day, boundary);
        }
    }
    t
}

/// Business time overlapping `[from, to)`.
///
/// Walks local days from `from` to `to`, adding the overlap of each business
/// day's window with the interval. Zero when `to <= from`.
pub fn business_duration_between(
    policy: &BusinessCalendarPolicy,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Duration {
    if to <= from {
        return Duration::zero();
    }
    let last = policy.local_date(to);
    let mut day = policy.local_date(from);
    let mut total = Duration::zero();
    loop {
        if policy.is_business_date(day) {
            let open = policy.at(day, policy.start).max(from);
            let close = policy.at(day, policy.end).min(to);
            if close > open {
                total += close - open;
            }
        }
        if day >= last {
            break;
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    total
}

/// Whole business minutes in `[from, to)`; partial minutes are truncated.
pub fn business_minutes_between(
    policy: &BusinessCalendarPolicy,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> i64 {
    business_duration_between(policy, from, to).num_minutes()
}

/// Paused time in `[from, to)`, walked one local day at a time.
///
/// Every minute counts, business or not: the clock pauses when business
/// ends, so a resume that arrives late must still credit the whole gap.
pub fn paused_duration_between(
    policy: &BusinessCalendarPolicy,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Duration {
    let mut total = Duration::zero();
    let mut cursor = from;
    while cursor < to {
        let tomorrow = policy
            .local_date(cursor)
            .succ_opt()
            .map(|d| policy.midnight(d))
            .filter(|m| *m > cursor)
            .unwrap_or(to);
        let segment_end = tomorrow.min(to);
        total += segment_end - cursor;
        cursor = segment_end;
    }
    total
}

/// Whole paused minutes in `[from, to)`; partial minutes are truncated.
pub fn paused_minutes_between(
    policy: &BusinessCalendarPolicy,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> i64 {
    paused_duration_between(policy, from, to).num_minutes()
}
