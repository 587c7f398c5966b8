//! Scenario tests for the sync engine over in-memory adapters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use rust_decimal_macros::dec;

use crate::bills::{Bill, RepeatMode, SyncStatus};
use crate::errors::{DatabaseError, RemoteError, Result};

use super::*;

// ─────────────────────────────────────────────────────────────────────────
// In-memory adapters
// ─────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryBillStore {
    bills: StdMutex<HashMap<String, Bill>>,
    retries: StdMutex<HashMap<String, RetryQueueEntry>>,
    last_sync: StdMutex<Option<DateTime<Utc>>>,
}

impl MemoryBillStore {
    fn seed(&self, bills: impl IntoIterator<Item = Bill>) {
        let mut guard = self.bills.lock().unwrap();
        for bill in bills {
            guard.insert(bill.id.clone(), bill);
        }
    }
}

#[async_trait]
impl LocalBillStore for MemoryBillStore {
    async fn initialize(&self, _user_id: &str) -> Result<()> {
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Bill>> {
        Ok(self.bills.lock().unwrap().values().cloned().collect())
    }

    async fn get_dirty(&self) -> Result<Vec<Bill>> {
        let mut dirty: Vec<Bill> = self
            .bills
            .lock()
            .unwrap()
            .values()
            .filter(|bill| bill.is_dirty())
            .cloned()
            .collect();
        dirty.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(dirty)
    }

    async fn get(&self, bill_id: &str) -> Result<Option<Bill>> {
        Ok(self.bills.lock().unwrap().get(bill_id).cloned())
    }

    async fn insert(&self, bill: Bill) -> Result<()> {
        let mut guard = self.bills.lock().unwrap();
        if guard.contains_key(&bill.id) {
            return Err(DatabaseError::Internal(format!("duplicate id {}", bill.id)).into());
        }
        guard.insert(bill.id.clone(), bill);
        Ok(())
    }

    async fn update(&self, bill: Bill) -> Result<()> {
        let mut guard = self.bills.lock().unwrap();
        if !guard.contains_key(&bill.id) {
            return Err(DatabaseError::NotFound(bill.id.clone()).into());
        }
        guard.insert(bill.id.clone(), bill);
        Ok(())
    }

    async fn delete(&self, bill_id: &str) -> Result<()> {
        self.bills.lock().unwrap().remove(bill_id);
        Ok(())
    }

    async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(*self.last_sync.lock().unwrap())
    }

    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<()> {
        *self.last_sync.lock().unwrap() = Some(at);
        Ok(())
    }

    async fn get_retry_entry(&self, bill_id: &str) -> Result<Option<RetryQueueEntry>> {
        Ok(self.retries.lock().unwrap().get(bill_id).cloned())
    }

    async fn list_retry_queue(&self) -> Result<Vec<RetryQueueEntry>> {
        Ok(self.retries.lock().unwrap().values().cloned().collect())
    }

    async fn record_retry_failure(
        &self,
        bill_id: &str,
        action: SyncAction,
        error: &str,
    ) -> Result<()> {
        let mut guard = self.retries.lock().unwrap();
        let entry = guard
            .entry(bill_id.to_string())
            .or_insert_with(|| RetryQueueEntry {
                bill_id: bill_id.to_string(),
                action,
                attempts: 0,
                last_error: None,
                last_attempt_at: Utc::now(),
            });
        entry.action = action;
        entry.attempts += 1;
        entry.last_error = Some(error.to_string());
        entry.last_attempt_at = Utc::now();
        Ok(())
    }

    async fn clear_retry_entry(&self, bill_id: &str) -> Result<()> {
        self.retries.lock().unwrap().remove(bill_id);
        Ok(())
    }

    async fn clear_user_data(&self) -> Result<()> {
        self.bills.lock().unwrap().clear();
        self.retries.lock().unwrap().clear();
        *self.last_sync.lock().unwrap() = None;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RemoteCall {
    Batch(usize),
    Query,
}

#[derive(Default)]
struct ScriptedRemoteStore {
    calls: StdMutex<Vec<RemoteCall>>,
    batches: StdMutex<Vec<Vec<RemoteWriteOp>>>,
    documents: StdMutex<Vec<RemoteBillDocument>>,
    /// Fail batch writes starting at this 0-based call index.
    fail_batches_from: StdMutex<Option<usize>>,
}

impl ScriptedRemoteStore {
    fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    fn call_log(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteBillStore for ScriptedRemoteStore {
    async fn batch_write(&self, _user_id: &str, ops: &[RemoteWriteOp]) -> Result<()> {
        let batch_index = {
            let mut batches = self.batches.lock().unwrap();
            batches.push(ops.to_vec());
            batches.len() - 1
        };
        self.calls.lock().unwrap().push(RemoteCall::Batch(ops.len()));
        if let Some(fail_from) = *self.fail_batches_from.lock().unwrap() {
            if batch_index >= fail_from {
                return Err(RemoteError::Unavailable("scripted failure".to_string()).into());
            }
        }
        Ok(())
    }

    async fn query_modified_since(
        &self,
        _user_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteBillDocument>> {
        self.calls.lock().unwrap().push(RemoteCall::Query);
        let documents = self.documents.lock().unwrap().clone();
        Ok(match since {
            Some(checkpoint) => documents
                .into_iter()
                .filter(|doc| doc.last_modified > checkpoint)
                .collect(),
            None => documents,
        })
    }

    async fn get(&self, _user_id: &str, bill_id: &str) -> Result<Option<RemoteBillDocument>> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|doc| doc.id == bill_id)
            .cloned())
    }

    async fn delete_all(&self, _user_id: &str) -> Result<()> {
        self.documents.lock().unwrap().clear();
        Ok(())
    }
}

struct StaticNetwork {
    online: AtomicBool,
}

impl StaticNetwork {
    fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }
}

impl NetworkMonitor for StaticNetwork {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn connectivity_events(&self) -> BoxStream<'static, bool> {
        futures::stream::pending().boxed()
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────

struct Harness {
    local: Arc<MemoryBillStore>,
    remote: Arc<ScriptedRemoteStore>,
    engine: SyncEngine,
}

fn harness_with(online: bool, config: SyncEngineConfig) -> Harness {
    let local = Arc::new(MemoryBillStore::default());
    let remote = Arc::new(ScriptedRemoteStore::default());
    let engine = SyncEngine::new(
        local.clone(),
        remote.clone(),
        Arc::new(StaticNetwork::new(online)),
        config,
    );
    engine.bind_user("user-1");
    Harness {
        local,
        remote,
        engine,
    }
}

fn harness() -> Harness {
    harness_with(true, SyncEngineConfig::default())
}

fn dirty_bill(name: &str) -> Bill {
    Bill::new(
        name,
        dec!(25),
        "USD",
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
        RepeatMode::OneTime,
    )
}

fn remote_doc(id: &str, version: i64) -> RemoteBillDocument {
    let mut bill = dirty_bill("Remote");
    bill.id = id.to_string();
    bill.version = version;
    RemoteBillDocument::from_bill(&bill)
}

// ─────────────────────────────────────────────────────────────────────────
// Upload
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_chunks_850_dirty_records_into_three_batches() {
    let h = harness();
    h.local.seed((0..850).map(|i| dirty_bill(&format!("Bill {i}"))));

    let metrics = h.engine.execute_batch_sync().await.unwrap();

    assert_eq!(h.remote.batch_sizes(), vec![400, 400, 50]);
    assert_eq!(metrics.pushed_count, 850);
    assert_eq!(metrics.status, "success");
    assert!(h.local.get_dirty().await.unwrap().is_empty());
    assert!(h.local.last_sync_time().await.unwrap().is_some());
}

#[tokio::test]
async fn rerunning_upload_on_clean_set_makes_no_remote_calls() {
    let h = harness();
    h.local.seed([dirty_bill("Rent")]);

    h.engine.execute_batch_sync().await.unwrap();
    let calls_after_first = h.remote.call_log().len();

    let metrics = h.engine.execute_batch_sync().await.unwrap();
    assert_eq!(metrics.status, "success");
    assert_eq!(metrics.pushed_count, 0);
    assert_eq!(h.remote.call_log().len(), calls_after_first);
}

#[tokio::test]
async fn tombstones_issue_deletes_and_are_removed_once_confirmed() {
    let h = harness();
    let mut bill = dirty_bill("Old gym");
    bill.mark_synced();
    bill.mark_deleted();
    let bill_id = bill.id.clone();
    h.local.seed([bill]);

    h.engine.execute_batch_sync().await.unwrap();

    let batches = h.remote.batches.lock().unwrap().clone();
    assert_eq!(
        batches[0][0],
        RemoteWriteOp::Delete {
            id: bill_id.clone()
        }
    );
    assert!(h.local.get(&bill_id).await.unwrap().is_none());
}

#[tokio::test]
async fn partial_batch_failure_preserves_committed_chunks() {
    let h = harness();
    h.local.seed((0..850).map(|i| dirty_bill(&format!("Bill {i}"))));
    *h.remote.fail_batches_from.lock().unwrap() = Some(1);

    let metrics = h.engine.execute_batch_sync().await.unwrap();

    // First chunk committed and cleaned; the rest stayed dirty.
    assert_eq!(metrics.status, "failed");
    assert_eq!(metrics.pushed_count, 400);
    let remaining = h.local.get_dirty().await.unwrap();
    assert_eq!(remaining.len(), 450);

    let status = h.engine.status().await.unwrap();
    assert_eq!(status.state, SyncState::Failed);
    assert!(status.last_error.unwrap().contains("scripted failure"));

    // The failed chunk's records gained retry entries; committed ones did not.
    let retry_ids: Vec<String> = h
        .local
        .list_retry_queue()
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.bill_id)
        .collect();
    assert_eq!(retry_ids.len(), 400);
    for bill in &remaining[..400.min(remaining.len())] {
        if retry_ids.contains(&bill.id) {
            let entry = h.local.get_retry_entry(&bill.id).await.unwrap().unwrap();
            assert_eq!(entry.attempts, 1);
            assert_eq!(entry.action, SyncAction::Create);
        }
    }

    // Re-running after the remote recovers drains the remainder.
    *h.remote.fail_batches_from.lock().unwrap() = None;
    let retry_metrics = h.engine.sync_now().await.unwrap();
    assert_eq!(retry_metrics.status, "success");
    assert!(h.local.get_dirty().await.unwrap().is_empty());
}

#[tokio::test]
async fn offline_device_skips_upload_without_error() {
    let h = harness_with(false, SyncEngineConfig::default());
    h.local.seed([dirty_bill("Rent")]);

    let metrics = h.engine.execute_batch_sync().await.unwrap();

    assert_eq!(metrics.status, "skipped");
    assert!(h.remote.call_log().is_empty());
    assert_eq!(h.local.get_dirty().await.unwrap().len(), 1);
    assert_eq!(h.engine.status().await.unwrap().state, SyncState::Idle);
}

#[tokio::test]
async fn unbound_engine_never_touches_the_remote() {
    let h = harness();
    h.engine.unbind_user().await;
    h.local.seed([dirty_bill("Rent")]);

    let metrics = h.engine.execute_batch_sync().await.unwrap();
    assert_eq!(metrics.status, "skipped");
    assert!(h.remote.call_log().is_empty());
}

#[tokio::test]
async fn backoff_gates_automatic_retries_but_not_manual_sync() {
    let h = harness();
    let bill = dirty_bill("Flaky");
    let bill_id = bill.id.clone();
    h.local.seed([bill]);
    h.local
        .record_retry_failure(&bill_id, SyncAction::Create, "remote unavailable")
        .await
        .unwrap();

    // Automatic pass: the entry's 5s backoff has not elapsed.
    let metrics = h.engine.execute_batch_sync().await.unwrap();
    assert_eq!(metrics.pushed_count, 0);
    assert!(h.remote.batch_sizes().is_empty());

    // Manual sync is the explicit retry and bypasses the gate.
    let manual = h.engine.sync_now().await.unwrap();
    assert_eq!(manual.pushed_count, 1);
    assert!(h.local.get_retry_entry(&bill_id).await.unwrap().is_none());
}

// ─────────────────────────────────────────────────────────────────────────
// Download
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pull_applies_lww_by_version() {
    let h = harness();

    let mut local_winner = dirty_bill("Local newer");
    local_winner.id = "bill-local".to_string();
    local_winner.version = 3;
    local_winner.mark_synced();
    let mut local_loser = dirty_bill("Remote newer");
    local_loser.id = "bill-remote".to_string();
    local_loser.version = 3;
    local_loser.mark_synced();
    h.local.seed([local_winner, local_loser]);

    *h.remote.documents.lock().unwrap() = vec![
        remote_doc("bill-local", 2),
        remote_doc("bill-remote", 5),
        remote_doc("bill-new", 1),
    ];

    let metrics = h.engine.download_bills(true).await.unwrap();
    assert_eq!(metrics.pulled_count, 2);

    // Local version 3 vs remote 2: untouched.
    let kept = h.local.get("bill-local").await.unwrap().unwrap();
    assert_eq!(kept.version, 3);
    assert_eq!(kept.name, "Local newer");

    // Remote version 5 replaces the whole record.
    let replaced = h.local.get("bill-remote").await.unwrap().unwrap();
    assert_eq!(replaced.version, 5);
    assert_eq!(replaced.name, "Remote");
    assert_eq!(replaced.sync_status, SyncStatus::Clean);

    // Unknown ids are inserted clean.
    let inserted = h.local.get("bill-new").await.unwrap().unwrap();
    assert_eq!(inserted.sync_status, SyncStatus::Clean);
}

#[tokio::test]
async fn incremental_pull_respects_the_checkpoint() {
    let h = harness();
    let checkpoint = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    h.local.set_last_sync_time(checkpoint).await.unwrap();

    let mut stale = remote_doc("bill-old", 1);
    stale.last_modified = checkpoint - Duration::hours(1);
    let mut fresh = remote_doc("bill-fresh", 1);
    fresh.last_modified = checkpoint + Duration::hours(1);
    *h.remote.documents.lock().unwrap() = vec![stale, fresh];

    let metrics = h.engine.download_bills(false).await.unwrap();

    assert_eq!(metrics.pulled_count, 1);
    assert!(h.local.get("bill-old").await.unwrap().is_none());
    assert!(h.local.get("bill-fresh").await.unwrap().is_some());
}

// ─────────────────────────────────────────────────────────────────────────
// Triggers and coalescing
// ─────────────────────────────────────────────────────────────────────────

fn fast_config() -> SyncEngineConfig {
    SyncEngineConfig {
        debounce: StdDuration::from_millis(80),
        resume_settle: StdDuration::from_millis(40),
        startup_delay: StdDuration::from_millis(40),
        max_batch_size: REMOTE_MAX_BATCH_WRITE,
    }
}

#[tokio::test]
async fn debounce_coalesces_rapid_schedules_into_one_upload() {
    let h = harness_with(true, fast_config());
    h.local.seed([dirty_bill("Rent")]);

    for _ in 0..5 {
        h.engine.schedule_debounced_sync().await;
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    tokio::time::sleep(StdDuration::from_millis(300)).await;

    assert_eq!(h.remote.batch_sizes(), vec![1]);
}

#[tokio::test]
async fn manual_sync_cancels_the_pending_debounce_timer() {
    let h = harness_with(true, fast_config());
    h.local.seed([dirty_bill("Rent")]);

    h.engine.schedule_debounced_sync().await;
    let metrics = h.engine.sync_now().await.unwrap();
    assert_eq!(metrics.pushed_count, 1);

    tokio::time::sleep(StdDuration::from_millis(300)).await;
    // One batch from the manual run; the debounced one never fired (and a
    // fired timer would have been a no-op anyway on the clean set).
    assert_eq!(h.remote.batch_sizes(), vec![1]);
}

#[tokio::test]
async fn startup_resumes_interrupted_work_only_when_dirty() {
    let h = harness_with(true, fast_config());
    h.engine.on_startup().await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(150)).await;
    assert!(h.remote.batch_sizes().is_empty());

    h.local.seed([dirty_bill("Rent")]);
    h.engine.on_startup().await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(150)).await;
    assert_eq!(h.remote.batch_sizes(), vec![1]);
}

#[tokio::test]
async fn background_flush_bypasses_the_debounce() {
    let h = harness_with(true, fast_config());
    h.local.seed([dirty_bill("Rent")]);

    h.engine.schedule_debounced_sync().await;
    let metrics = h.engine.handle_app_background().await.unwrap();

    assert_eq!(metrics.pushed_count, 1);
    assert_eq!(metrics.status, "success");
}

#[tokio::test]
async fn full_cycle_pushes_before_pulling() {
    let h = harness();
    h.local.seed([dirty_bill("Rent")]);
    // Stamp the incoming document ahead of the push-side checkpoint so the
    // chained pull is guaranteed to see it.
    let mut incoming = remote_doc("bill-incoming", 1);
    incoming.last_modified = Utc::now() + Duration::hours(1);
    *h.remote.documents.lock().unwrap() = vec![incoming];

    let metrics = h.engine.sync_now().await.unwrap();

    assert_eq!(metrics.pushed_count, 1);
    assert_eq!(metrics.pulled_count, 1);
    let calls = h.remote.call_log();
    assert_eq!(calls[0], RemoteCall::Batch(1));
    assert!(calls.contains(&RemoteCall::Query));
}
