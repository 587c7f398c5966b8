//! The offline-first sync engine: debounced batch upload, incremental pull
//! with last-write-wins merge, lifecycle triggers, and retry bookkeeping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration as StdDuration, Instant};

use chrono::Utc;
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;

use crate::bills::{Bill, SyncStatus};
use crate::errors::{Error, Result};

use super::adapters::{LocalBillStore, NetworkMonitor, RemoteBillStore};
use super::sync_model::{
    should_overwrite_local, RemoteBillDocument, RemoteWriteOp, SyncAction, SyncCycleMetrics,
    SyncEngineStatus, SyncState, SyncTrigger, REMOTE_MAX_BATCH_WRITE,
};
use super::sync_scheduler::{
    retry_eligible, SYNC_DEBOUNCE_SECS, SYNC_RESUME_SETTLE_SECS, SYNC_STARTUP_DELAY_SECS,
};

/// Engine tunables. Defaults match production behavior; tests shrink the
/// delays.
#[derive(Debug, Clone)]
pub struct SyncEngineConfig {
    pub debounce: StdDuration,
    pub resume_settle: StdDuration,
    pub startup_delay: StdDuration,
    pub max_batch_size: usize,
}

impl Default for SyncEngineConfig {
    fn default() -> Self {
        Self {
            debounce: StdDuration::from_secs(SYNC_DEBOUNCE_SECS),
            resume_settle: StdDuration::from_secs(SYNC_RESUME_SETTLE_SECS),
            startup_delay: StdDuration::from_secs(SYNC_STARTUP_DELAY_SECS),
            max_batch_size: REMOTE_MAX_BATCH_WRITE,
        }
    }
}

#[derive(Debug, Default)]
struct EngineState {
    state: SyncState,
    last_error: Option<String>,
}

struct EngineInner {
    local: Arc<dyn LocalBillStore>,
    remote: Arc<dyn RemoteBillStore>,
    network: Arc<dyn NetworkMonitor>,
    config: SyncEngineConfig,
    user_id: StdMutex<Option<String>>,
    state: StdMutex<EngineState>,
    in_flight: AtomicBool,
    debounce_timer: TokioMutex<Option<JoinHandle<()>>>,
}

/// Orchestrates movement of dirty records to the remote store and remote
/// changes back, without ever blocking a user-facing operation.
///
/// Cloning is cheap and every clone shares the same state: the engine
/// exclusively owns its debounce timer and in-flight flag. At most one
/// upload/download pass executes at a time; triggers that arrive while one
/// is running are skipped (the records stay dirty and a later trigger picks
/// them up).
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn new(
        local: Arc<dyn LocalBillStore>,
        remote: Arc<dyn RemoteBillStore>,
        network: Arc<dyn NetworkMonitor>,
        config: SyncEngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                local,
                remote,
                network,
                config,
                user_id: StdMutex::new(None),
                state: StdMutex::new(EngineState::default()),
                in_flight: AtomicBool::new(false),
                debounce_timer: TokioMutex::new(None),
            }),
        }
    }

    /// Bind the engine to a signed-in user. Sync is a no-op until bound.
    pub fn bind_user(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        debug!("[SyncEngine] Bound to user {user_id}");
        *self.inner.user_id.lock().expect("user lock poisoned") = Some(user_id);
    }

    /// Unbind on sign-out and drop any pending debounce timer.
    pub async fn unbind_user(&self) {
        self.cancel_pending_debounce().await;
        *self.inner.user_id.lock().expect("user lock poisoned") = None;
    }

    fn bound_user(&self) -> Option<String> {
        self.inner.user_id.lock().expect("user lock poisoned").clone()
    }

    fn set_state(&self, state: SyncState, last_error: Option<String>) {
        let mut guard = self.inner.state.lock().expect("state lock poisoned");
        guard.state = state;
        guard.last_error = last_error;
    }

    /// Snapshot for the presentation layer.
    pub async fn status(&self) -> Result<SyncEngineStatus> {
        let (state, last_error) = {
            let guard = self.inner.state.lock().expect("state lock poisoned");
            (guard.state, guard.last_error.clone())
        };
        let (pending_count, last_sync_time) = if self.bound_user().is_some() {
            (
                self.inner.local.get_dirty().await?.len(),
                self.inner.local.last_sync_time().await?,
            )
        } else {
            (0, None)
        };
        Ok(SyncEngineStatus {
            state,
            pending_count,
            last_sync_time,
            last_error,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Triggers
    // ─────────────────────────────────────────────────────────────────────

    /// (Re)arm the single debounce timer. Each call cancels the previous
    /// timer; only a timer that fires without a later reschedule executes
    /// the batch upload.
    pub async fn schedule_debounced_sync(&self) {
        debug!(
            "[SyncEngine] Debounce timer armed ({}s)",
            self.inner.config.debounce.as_secs()
        );
        self.arm_timer(self.inner.config.debounce, SyncTrigger::LocalMutation)
            .await;
    }

    /// Drop the pending debounce timer, if any.
    pub async fn cancel_pending_debounce(&self) {
        let mut guard = self.inner.debounce_timer.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }

    /// App is going to the background or terminating: flush immediately,
    /// bypassing the debounce.
    pub async fn handle_app_background(&self) -> Result<SyncCycleMetrics> {
        self.cancel_pending_debounce().await;
        debug!("[SyncEngine] App backgrounded, flushing dirty records");
        self.execute_batch_sync().await
    }

    /// App returned to the foreground: if dirty records exist, sync after a
    /// short settle delay.
    pub async fn handle_app_foreground(&self) -> Result<()> {
        if self.has_dirty_records().await? {
            self.arm_timer(self.inner.config.resume_settle, SyncTrigger::Foreground)
                .await;
        }
        Ok(())
    }

    /// Startup: dirty records mean work was interrupted by a crash or kill;
    /// resume it after a short delay.
    pub async fn on_startup(&self) -> Result<()> {
        if self.has_dirty_records().await? {
            info!("[SyncEngine] Dirty records found at startup, resuming interrupted sync");
            self.arm_timer(self.inner.config.startup_delay, SyncTrigger::Startup)
                .await;
        }
        Ok(())
    }

    /// Connectivity transition. Regaining a connection with pending work
    /// schedules a sync after the settle delay.
    pub async fn handle_connectivity_change(&self, online: bool) -> Result<()> {
        if online && self.has_dirty_records().await? {
            info!("[SyncEngine] Connectivity restored with pending changes, scheduling sync");
            self.arm_timer(self.inner.config.resume_settle, SyncTrigger::Connectivity)
                .await;
        }
        Ok(())
    }

    /// Consume the network monitor's connectivity event stream for the life
    /// of the returned task.
    pub fn watch_connectivity(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let mut events = self.inner.network.connectivity_events();
        tokio::spawn(async move {
            while let Some(online) = events.next().await {
                if let Err(err) = engine.handle_connectivity_change(online).await {
                    warn!("[SyncEngine] Connectivity-triggered sync failed: {err}");
                }
            }
        })
    }

    /// User-initiated "sync now": cancels any pending debounce timer and
    /// runs a full cycle (upload then download) immediately. Manual runs
    /// bypass retry-backoff gating — this is the explicit retry for
    /// standing failures.
    pub async fn sync_now(&self) -> Result<SyncCycleMetrics> {
        self.cancel_pending_debounce().await;
        self.run_cycle(SyncTrigger::Manual).await
    }

    async fn arm_timer(&self, delay: StdDuration, trigger: SyncTrigger) {
        let mut guard = self.inner.debounce_timer.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        let engine = self.clone();
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!("[SyncEngine] Timer fired ({trigger:?})");
            if let Err(err) = engine.execute_batch_sync().await {
                warn!("[SyncEngine] Scheduled sync failed: {err}");
            }
        }));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Passes
    // ─────────────────────────────────────────────────────────────────────

    /// Upload pass only. Used by timers and the background flush.
    pub async fn execute_batch_sync(&self) -> Result<SyncCycleMetrics> {
        let started = Instant::now();
        let Some(user_id) = self.try_begin() else {
            return Ok(Self::skipped_metrics(started));
        };
        let mut pushed = 0;
        let result = self.push_dirty(&user_id, false, &mut pushed).await;
        self.inner.in_flight.store(false, Ordering::SeqCst);
        self.conclude(started, result, pushed, 0)
    }

    /// Download pass only. `full_resync` ignores the checkpoint and pulls
    /// the entire remote collection.
    pub async fn download_bills(&self, full_resync: bool) -> Result<SyncCycleMetrics> {
        let started = Instant::now();
        let Some(user_id) = self.try_begin() else {
            return Ok(Self::skipped_metrics(started));
        };
        let mut pulled = 0;
        let result = self.pull_remote(&user_id, full_resync, &mut pulled).await;
        self.inner.in_flight.store(false, Ordering::SeqCst);
        self.conclude(started, result, 0, pulled)
    }

    /// Full cycle: upload, then download, sequenced under one in-flight
    /// guard so the passes never interleave for the same user.
    async fn run_cycle(&self, trigger: SyncTrigger) -> Result<SyncCycleMetrics> {
        let started = Instant::now();
        let Some(user_id) = self.try_begin() else {
            return Ok(Self::skipped_metrics(started));
        };
        debug!("[SyncEngine] Sync cycle started ({trigger:?})");
        let manual = matches!(trigger, SyncTrigger::Manual);
        let mut pushed = 0;
        let mut pulled = 0;
        let mut result = self.push_dirty(&user_id, manual, &mut pushed).await;
        if result.is_ok() {
            result = self.pull_remote(&user_id, false, &mut pulled).await;
        }
        self.inner.in_flight.store(false, Ordering::SeqCst);
        self.conclude(started, result, pushed, pulled)
    }

    /// Guard shared by every pass: a bound user, network reachability, and
    /// no execution already in flight.
    fn try_begin(&self) -> Option<String> {
        let Some(user_id) = self.bound_user() else {
            debug!("[SyncEngine] Skipping sync, no user bound");
            return None;
        };
        if !self.inner.network.is_online() {
            debug!("[SyncEngine] Skipping sync, device is offline");
            return None;
        }
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("[SyncEngine] Skipping sync, another execution is in flight");
            return None;
        }
        Some(user_id)
    }

    fn skipped_metrics(started: Instant) -> SyncCycleMetrics {
        SyncCycleMetrics {
            pushed_count: 0,
            pulled_count: 0,
            duration_ms: started.elapsed().as_millis() as i64,
            status: "skipped".to_string(),
        }
    }

    /// Fold a pass result into engine state and metrics. Remote failures are
    /// retained as state (the records stay dirty and will be retried);
    /// local storage failures propagate to the caller.
    fn conclude(
        &self,
        started: Instant,
        result: Result<()>,
        pushed_count: usize,
        pulled_count: usize,
    ) -> Result<SyncCycleMetrics> {
        let duration_ms = started.elapsed().as_millis() as i64;
        match result {
            Ok(()) => {
                self.set_state(SyncState::Success, None);
                Ok(SyncCycleMetrics {
                    pushed_count,
                    pulled_count,
                    duration_ms,
                    status: "success".to_string(),
                })
            }
            Err(Error::Remote(err)) => {
                let message = err.to_string();
                warn!("[SyncEngine] Sync failed: {message}");
                self.set_state(SyncState::Failed, Some(message));
                Ok(SyncCycleMetrics {
                    pushed_count,
                    pulled_count,
                    duration_ms,
                    status: "failed".to_string(),
                })
            }
            Err(err) => {
                self.set_state(SyncState::Failed, Some(err.to_string()));
                Err(err)
            }
        }
    }

    async fn push_dirty(&self, user_id: &str, manual: bool, pushed: &mut usize) -> Result<()> {
        self.set_state(SyncState::Syncing, None);
        let dirty = self.inner.local.get_dirty().await?;
        if dirty.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut eligible = Vec::with_capacity(dirty.len());
        for bill in dirty {
            if !manual {
                if let Some(entry) = self.inner.local.get_retry_entry(&bill.id).await? {
                    if !retry_eligible(&entry, now) {
                        debug!(
                            "[SyncEngine] Holding {} back ({} failed attempts)",
                            bill.id, entry.attempts
                        );
                        continue;
                    }
                }
            }
            eligible.push(bill);
        }
        if eligible.is_empty() {
            return Ok(());
        }

        let chunk_count = eligible.len().div_ceil(self.inner.config.max_batch_size);
        for (index, chunk) in eligible.chunks(self.inner.config.max_batch_size).enumerate() {
            let ops: Vec<RemoteWriteOp> = chunk.iter().map(Self::op_for_bill).collect();
            if let Err(err) = self.inner.remote.batch_write(user_id, &ops).await {
                warn!(
                    "[SyncEngine] Batch {}/{chunk_count} failed: {err}",
                    index + 1
                );
                let message = err.to_string();
                for bill in chunk {
                    if let Some(action) = SyncAction::for_status(bill.sync_status) {
                        self.inner
                            .local
                            .record_retry_failure(&bill.id, action, &message)
                            .await?;
                    }
                }
                // Committed chunks keep their local transitions; whatever is
                // still dirty is re-batched on the next run.
                return Err(err);
            }

            for bill in chunk {
                match bill.sync_status {
                    SyncStatus::Deleted => self.inner.local.delete(&bill.id).await?,
                    _ => {
                        let mut synced = bill.clone();
                        synced.mark_synced();
                        self.inner.local.update(synced).await?;
                    }
                }
                self.inner.local.clear_retry_entry(&bill.id).await?;
            }
            *pushed += chunk.len();
            debug!(
                "[SyncEngine] Committed batch {}/{chunk_count} ({} records)",
                index + 1,
                chunk.len()
            );
        }

        self.inner.local.set_last_sync_time(Utc::now()).await?;
        Ok(())
    }

    async fn pull_remote(
        &self,
        user_id: &str,
        full_resync: bool,
        pulled: &mut usize,
    ) -> Result<()> {
        self.set_state(SyncState::Syncing, None);
        let checkpoint = if full_resync {
            None
        } else {
            self.inner.local.last_sync_time().await?
        };
        let documents = self
            .inner
            .remote
            .query_modified_since(user_id, checkpoint)
            .await?;
        debug!(
            "[SyncEngine] Pulled {} remote documents (checkpoint: {checkpoint:?})",
            documents.len()
        );

        for document in documents {
            match self.inner.local.get(&document.id).await? {
                None => {
                    self.inner.local.insert(document.into_bill()).await?;
                    *pulled += 1;
                }
                Some(existing) => {
                    if should_overwrite_local(existing.version, document.version) {
                        self.inner.local.update(document.into_bill()).await?;
                        *pulled += 1;
                    } else {
                        debug!(
                            "[SyncEngine] Keeping local {} (local v{} >= remote v{})",
                            existing.id, existing.version, document.version
                        );
                    }
                }
            }
        }

        self.inner.local.set_last_sync_time(Utc::now()).await?;
        Ok(())
    }

    fn op_for_bill(bill: &Bill) -> RemoteWriteOp {
        match bill.sync_status {
            SyncStatus::Deleted => RemoteWriteOp::Delete {
                id: bill.id.clone(),
            },
            _ => RemoteWriteOp::Upsert {
                document: RemoteBillDocument::from_bill(bill),
            },
        }
    }

    async fn has_dirty_records(&self) -> Result<bool> {
        if self.bound_user().is_none() {
            return Ok(false);
        }
        Ok(!self.inner.local.get_dirty().await?.is_empty())
    }
}
