//! Adapter contracts between the sync core and its collaborators.
//!
//! The core owns the orchestration; storage, transport, connectivity, and
//! platform alarms are injected behind these traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::bills::Bill;
use crate::errors::Result;

use super::sync_model::{RemoteBillDocument, RemoteWriteOp, RetryQueueEntry, SyncAction};

/// The authoritative on-device store of bill records, scoped to one user
/// namespace at a time. Writes must be atomic and crash-durable; a failed
/// write must surface as an error, never as silent success.
#[async_trait]
pub trait LocalBillStore: Send + Sync {
    /// Bind the store to a user-scoped namespace. Switching users must not
    /// leak records across namespaces.
    async fn initialize(&self, user_id: &str) -> Result<()>;

    /// All records in the active namespace. No ordering guarantee.
    async fn get_all(&self) -> Result<Vec<Bill>>;

    /// Records whose sync status is not clean.
    async fn get_dirty(&self) -> Result<Vec<Bill>>;

    async fn get(&self, bill_id: &str) -> Result<Option<Bill>>;
    async fn insert(&self, bill: Bill) -> Result<()>;
    async fn update(&self, bill: Bill) -> Result<()>;

    /// Physically remove a row. Only called once a tombstone is confirmed
    /// remotely, or for pure-local data that was never uploaded.
    async fn delete(&self, bill_id: &str) -> Result<()>;

    /// The persisted incremental-pull checkpoint.
    async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>>;
    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<()>;

    /// Retry-queue bookkeeping. Recording a failure increments the attempt
    /// counter and stamps the error and attempt time.
    async fn get_retry_entry(&self, bill_id: &str) -> Result<Option<RetryQueueEntry>>;
    async fn list_retry_queue(&self) -> Result<Vec<RetryQueueEntry>>;
    async fn record_retry_failure(
        &self,
        bill_id: &str,
        action: SyncAction,
        error: &str,
    ) -> Result<()>;
    async fn clear_retry_entry(&self, bill_id: &str) -> Result<()>;

    /// Drop the active user namespace entirely (account teardown step 4).
    async fn clear_user_data(&self) -> Result<()>;
}

/// The passive per-user remote document collection.
#[async_trait]
pub trait RemoteBillStore: Send + Sync {
    /// One atomic multi-document write of at most
    /// [`REMOTE_MAX_BATCH_WRITE`](super::REMOTE_MAX_BATCH_WRITE) operations.
    async fn batch_write(&self, user_id: &str, ops: &[RemoteWriteOp]) -> Result<()>;

    /// Documents with `lastModified` strictly greater than `since`; the full
    /// collection when `since` is `None`.
    async fn query_modified_since(
        &self,
        user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteBillDocument>>;

    async fn get(&self, user_id: &str, bill_id: &str) -> Result<Option<RemoteBillDocument>>;

    /// Delete every document for the user (account teardown step 2).
    /// Implementations batch deletes under the same per-batch cap as
    /// uploads.
    async fn delete_all(&self, user_id: &str) -> Result<()>;
}

/// Device reachability. Gates sync attempts only; queueing and retry are the
/// engine's responsibility, not the transport's.
pub trait NetworkMonitor: Send + Sync {
    fn is_online(&self) -> bool;

    /// Connectivity transitions, `true` on regaining a connection.
    fn connectivity_events(&self) -> BoxStream<'static, bool>;
}

/// Platform alarm scheduler. Alarms survive app termination and device
/// idle; at most one pending alarm exists per bill id, so callers cancel
/// before scheduling a replacement.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    async fn schedule(
        &self,
        bill_id: &str,
        fire_at: DateTime<Utc>,
        title: &str,
        body: &str,
    ) -> Result<()>;
    async fn cancel(&self, bill_id: &str) -> Result<()>;
    async fn cancel_all(&self) -> Result<()>;
}

/// The remote identity/auth record (account teardown step 3).
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn delete_account(&self, user_id: &str) -> Result<()>;
}

/// Process-wide preference storage (account teardown step 5).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn clear(&self) -> Result<()>;
}
