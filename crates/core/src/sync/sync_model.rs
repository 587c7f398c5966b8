//! Sync domain models and the wire shape of a bill.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bills::{Bill, ReminderPreference, RepeatMode, SyncStatus};

/// Maximum documents per atomic remote batch write.
pub const REMOTE_MAX_BATCH_WRITE: usize = 400;

/// Engine-global sync state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Success,
    Failed,
}

/// Snapshot of the engine for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEngineStatus {
    pub state: SyncState,
    pub pending_count: usize,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Lightweight cycle metrics returned by sync entry points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncCycleMetrics {
    pub pushed_count: usize,
    pub pulled_count: usize,
    pub duration_ms: i64,
    pub status: String,
}

/// What asked for a sync. Logging/diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Startup,
    LocalMutation,
    Foreground,
    Background,
    Connectivity,
    Manual,
}

/// The pending remote action recorded in the retry queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

impl SyncAction {
    /// The action a dirty record's status implies. `Clean` implies none.
    pub fn for_status(status: SyncStatus) -> Option<SyncAction> {
        match status {
            SyncStatus::Clean => None,
            SyncStatus::Created => Some(SyncAction::Create),
            SyncStatus::Updated => Some(SyncAction::Update),
            SyncStatus::Deleted => Some(SyncAction::Delete),
        }
    }
}

/// Durable per-record retry bookkeeping. An observability/backoff aid only:
/// the authoritative dirty set is always recomputed from the records' own
/// sync status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryQueueEntry {
    pub bill_id: String,
    pub action: SyncAction,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub last_attempt_at: DateTime<Utc>,
}

/// One operation inside an atomic remote batch write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum RemoteWriteOp {
    Upsert { document: RemoteBillDocument },
    Delete { id: String },
}

impl RemoteWriteOp {
    pub fn bill_id(&self) -> &str {
        match self {
            Self::Upsert { document } => &document.id,
            Self::Delete { id } => id,
        }
    }
}

/// The remote document shape of a bill: every field except the local sync
/// status. `lastModified` is the incremental-pull filter field on both the
/// write and query paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBillDocument {
    pub id: String,
    pub name: String,
    pub amount: Decimal,
    pub currency: String,
    pub due_date: DateTime<Utc>,
    pub repeat_mode: RepeatMode,
    pub paid: bool,
    pub reminder_preference: ReminderPreference,
    pub reminder_hour: u32,
    pub reminder_minute: u32,
    pub version: i64,
    pub last_modified: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RemoteBillDocument {
    pub fn from_bill(bill: &Bill) -> Self {
        Self {
            id: bill.id.clone(),
            name: bill.name.clone(),
            amount: bill.amount,
            currency: bill.currency.clone(),
            due_date: bill.due_date,
            repeat_mode: bill.repeat_mode,
            paid: bill.paid,
            reminder_preference: bill.reminder_preference,
            reminder_hour: bill.reminder_hour,
            reminder_minute: bill.reminder_minute,
            version: bill.version,
            last_modified: bill.last_modified,
            updated_at: bill.updated_at,
        }
    }

    /// Reconstruct the local record. A record materialized from the remote
    /// store has, by definition, nothing pending upload.
    pub fn into_bill(self) -> Bill {
        Bill {
            id: self.id,
            name: self.name,
            amount: self.amount,
            currency: self.currency,
            due_date: self.due_date,
            repeat_mode: self.repeat_mode,
            paid: self.paid,
            reminder_preference: self.reminder_preference,
            reminder_hour: self.reminder_hour,
            reminder_minute: self.reminder_minute,
            sync_status: SyncStatus::Clean,
            version: self.version,
            last_modified: self.last_modified,
            updated_at: self.updated_at,
        }
    }
}

/// Whole-record last-write-wins: an incoming remote record overwrites the
/// local one iff its version is strictly greater. Otherwise the local copy
/// is presumed dirty-and-newer and will be pushed on the next upload pass.
pub fn should_overwrite_local(local_version: i64, remote_version: i64) -> bool {
    remote_version > local_version
}
