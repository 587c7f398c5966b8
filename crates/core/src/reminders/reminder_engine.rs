//! Pure computation of reminder instants.
//!
//! Deterministic given its inputs and the supplied "now": no hidden state,
//! no ambient build flags. The timing mode is injected at construction so
//! accelerated-test behavior can never leak into a shipped build silently.

use chrono::{DateTime, Days, Duration, NaiveTime, Utc};

use crate::bills::ReminderPreference;

/// Timing mode for reminder offsets.
///
/// `AcceleratedTest` substitutes sub-minute offsets from the record's
/// last-touched instant so end-to-end delivery can be observed without
/// waiting real days. It must be wired to an explicit build/runtime flag by
/// the embedding app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderMode {
    Real,
    AcceleratedTest,
}

/// Fallback applied to already-past targets: fire this many seconds from now.
pub const PAST_TARGET_FALLBACK_SECS: i64 = 5;

const ACCELERATED_DAY_BEFORE_SECS: i64 = 60;
const ACCELERATED_SAME_DAY_SECS: i64 = 30;

/// Maps a bill's due date and reminder preference to at most one absolute
/// notification instant.
#[derive(Debug, Clone, Copy)]
pub struct ReminderEngine {
    mode: ReminderMode,
}

impl ReminderEngine {
    pub fn new(mode: ReminderMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ReminderMode {
        self.mode
    }

    /// The raw notification instant, possibly in the past. `None` when the
    /// preference is `None` or the reminder time-of-day is out of range.
    ///
    /// Real mode pins the instant to `hour:minute:00` on the due date's
    /// calendar day (or the day before). Accelerated-test mode offsets from
    /// `reference` (the record's last-touched instant) by a sub-day amount,
    /// deliberately ignoring the real due date.
    pub fn notification_time(
        &self,
        due_date: DateTime<Utc>,
        preference: ReminderPreference,
        reminder_hour: u32,
        reminder_minute: u32,
        reference: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if preference == ReminderPreference::None {
            return None;
        }

        match self.mode {
            ReminderMode::Real => {
                let day = match preference {
                    ReminderPreference::OneDayBefore => {
                        due_date.date_naive().checked_sub_days(Days::new(1))?
                    }
                    _ => due_date.date_naive(),
                };
                let time = NaiveTime::from_hms_opt(reminder_hour, reminder_minute, 0)?;
                Some(day.and_time(time).and_utc())
            }
            ReminderMode::AcceleratedTest => {
                let secs = match preference {
                    ReminderPreference::OneDayBefore => ACCELERATED_DAY_BEFORE_SECS,
                    _ => ACCELERATED_SAME_DAY_SECS,
                };
                Some(reference + Duration::seconds(secs))
            }
        }
    }

    /// Like [`notification_time`](Self::notification_time), but a target
    /// strictly before `now` is replaced with a near-future instant so every
    /// scheduling attempt yields a firable alarm.
    pub fn notification_time_with_fallback(
        &self,
        due_date: DateTime<Utc>,
        preference: ReminderPreference,
        reminder_hour: u32,
        reminder_minute: u32,
        reference: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.notification_time(due_date, preference, reminder_hour, reminder_minute, reference)
            .map(|target| clamp_to_future(target, now))
    }
}

/// Replace a target strictly before `now` with `now + 5s`.
pub fn clamp_to_future(target: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if target < now {
        now + Duration::seconds(PAST_TARGET_FALLBACK_SECS)
    } else {
        target
    }
}

/// Humanize the lead time until `target` as "In N unit(s)" using the largest
/// nonzero unit, or "Immediately" for targets at or before `now`.
pub fn describe_lead_time(target: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = target.signed_duration_since(now);
    if delta <= Duration::zero() {
        return "Immediately".to_string();
    }

    let (count, unit) = if delta.num_days() > 0 {
        (delta.num_days(), "day")
    } else if delta.num_hours() > 0 {
        (delta.num_hours(), "hour")
    } else if delta.num_minutes() > 0 {
        (delta.num_minutes(), "minute")
    } else {
        (delta.num_seconds().max(1), "second")
    };

    if count == 1 {
        format!("In 1 {unit}")
    } else {
        format!("In {count} {unit}s")
    }
}
