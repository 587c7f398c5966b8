//! The bill record and its sync-state transitions.
//!
//! Sync bookkeeping (`version`, timestamps, `sync_status`) only changes
//! through the explicit `mark_*` transition methods; nothing here mutates it
//! as a side effect of an unrelated field write.

use chrono::{DateTime, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How often a bill recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    OneTime,
    Monthly,
}

/// When, relative to the due date, the user wants to be reminded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderPreference {
    None,
    OneDayBefore,
    SameDay,
}

/// Local sync lifecycle of a record.
///
/// `Created` is sticky: local edits before the first successful upload must
/// not downgrade the record to `Updated`, so the remote store receives a
/// full create on first contact. `Deleted` is a tombstone; the row is only
/// physically removed once the remote delete is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Clean,
    Created,
    Updated,
    Deleted,
}

/// Derived display status. Computed on read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Paid,
    Overdue,
    Upcoming,
}

/// A bill record. The authoritative copy lives in the local store; the sync
/// engine mirrors it to the remote document collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: String,
    pub name: String,
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    pub due_date: DateTime<Utc>,
    pub repeat_mode: RepeatMode,
    pub paid: bool,
    pub reminder_preference: ReminderPreference,
    /// Wall-clock hour (0-23) the reminder should fire at.
    pub reminder_hour: u32,
    /// Wall-clock minute (0-59) the reminder should fire at.
    pub reminder_minute: u32,
    pub sync_status: SyncStatus,
    /// Strictly increases on every dirtying mutation; never changes on the
    /// transition to `Clean`.
    pub version: i64,
    /// Last field mutation; the incremental-pull filter field.
    pub last_modified: DateTime<Utc>,
    /// User-facing "last touched"; also the reference instant for
    /// accelerated-test reminder timing.
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// Create a fresh record pending its first upload.
    pub fn new(
        name: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
        due_date: DateTime<Utc>,
        repeat_mode: RepeatMode,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7().to_string(),
            name: name.into(),
            amount,
            currency: currency.into(),
            due_date,
            repeat_mode,
            paid: false,
            reminder_preference: ReminderPreference::None,
            reminder_hour: 9,
            reminder_minute: 0,
            sync_status: SyncStatus::Created,
            version: 1,
            last_modified: now,
            updated_at: now,
        }
    }

    /// True when local changes have not been confirmed remotely.
    pub fn is_dirty(&self) -> bool {
        self.sync_status != SyncStatus::Clean
    }

    /// Record a local edit: bumps the version and timestamps. A record that
    /// is still `Created` stays `Created`.
    pub fn mark_updated(&mut self) {
        if self.sync_status != SyncStatus::Created {
            self.sync_status = SyncStatus::Updated;
        }
        self.touch();
    }

    /// Tombstone the record for remote deletion.
    pub fn mark_deleted(&mut self) {
        self.sync_status = SyncStatus::Deleted;
        self.touch();
    }

    /// Upload confirmed: the record is in sync with the remote store. Does
    /// not bump the version.
    pub fn mark_synced(&mut self) {
        self.sync_status = SyncStatus::Clean;
    }

    fn touch(&mut self) {
        let now = Utc::now();
        self.version += 1;
        self.last_modified = now;
        self.updated_at = now;
    }

    /// Derived status for `today`, comparing calendar days and ignoring the
    /// time of day.
    pub fn status_on(&self, today: NaiveDate) -> BillStatus {
        if self.paid {
            BillStatus::Paid
        } else if self.due_date.date_naive() < today {
            BillStatus::Overdue
        } else {
            BillStatus::Upcoming
        }
    }

    /// Set the paid flag. For a monthly bill this also returns the rollover
    /// successor: due one calendar month later, unpaid, with a fresh id and
    /// inherited name/amount/currency/reminder settings.
    pub fn mark_paid(&mut self) -> Option<Bill> {
        self.paid = true;
        self.mark_updated();
        match self.repeat_mode {
            RepeatMode::Monthly => Some(self.next_occurrence()),
            RepeatMode::OneTime => None,
        }
    }

    /// The next occurrence of a recurring bill. The day-of-month clamps to
    /// the last day of shorter months (Jan 31 -> Feb 29 in a leap year).
    pub fn next_occurrence(&self) -> Bill {
        let now = Utc::now();
        let next_due = self
            .due_date
            .checked_add_months(Months::new(1))
            .unwrap_or(self.due_date);
        Bill {
            id: Uuid::now_v7().to_string(),
            name: self.name.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            due_date: next_due,
            repeat_mode: self.repeat_mode,
            paid: false,
            reminder_preference: self.reminder_preference,
            reminder_hour: self.reminder_hour,
            reminder_minute: self.reminder_minute,
            sync_status: SyncStatus::Created,
            version: 1,
            last_modified: now,
            updated_at: now,
        }
    }
}
