//! Scheduling constants and the retry backoff policy.

use chrono::{DateTime, Utc};

use super::sync_model::RetryQueueEntry;

/// Debounce window coalescing bursts of local edits into one upload.
pub const SYNC_DEBOUNCE_SECS: u64 = 30;

/// Settle delay before syncing after the app returns to the foreground.
pub const SYNC_RESUME_SETTLE_SECS: u64 = 2;

/// Delay before resuming work interrupted by a prior crash/kill at startup.
pub const SYNC_STARTUP_DELAY_SECS: u64 = 5;

/// Backoff schedule, indexed by 0-based attempt count after the first
/// failure.
pub const RETRY_BACKOFF_SCHEDULE_SECS: [i64; 5] = [5, 10, 30, 60, 120];

/// Failures tracked by the backoff schedule. Beyond this an entry is a
/// standing failure, retried only by an explicit manual sync.
pub const RETRY_MAX_TRACKED_ATTEMPTS: i32 = 5;

/// Backoff for an entry with `attempts` recorded failures. `Some(0)` for a
/// record that has never failed, `None` once the entry is a standing
/// failure.
pub fn backoff_seconds(attempts: i32) -> Option<i64> {
    if attempts <= 0 {
        return Some(0);
    }
    if attempts > RETRY_MAX_TRACKED_ATTEMPTS {
        return None;
    }
    Some(RETRY_BACKOFF_SCHEDULE_SECS[(attempts - 1) as usize])
}

/// Whether an automatic pass may retry this entry: the elapsed time since
/// its last attempt must have reached its backoff value.
pub fn retry_eligible(entry: &RetryQueueEntry, now: DateTime<Utc>) -> bool {
    match backoff_seconds(entry.attempts) {
        Some(backoff) => {
            now.signed_duration_since(entry.last_attempt_at)
                .num_seconds()
                >= backoff
        }
        None => false,
    }
}
