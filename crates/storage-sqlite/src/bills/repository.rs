//! The SQLite-backed implementation of the core's `LocalBillStore`.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::debug;

use billfolio_core::bills::{Bill, SyncStatus};
use billfolio_core::errors::{DatabaseError, Error, Result};
use billfolio_core::sync::{LocalBillStore, RetryQueueEntry, SyncAction};

use crate::db::{create_pool, get_connection, init, run_migrations, spawn_writer, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{bills, sync_checkpoint, sync_retry_queue};

use super::model::{enum_to_db, BillDB, RetryQueueEntryDB, SyncCheckpointDB};

#[derive(Clone)]
struct ActiveNamespace {
    user_id: String,
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

/// Per-user bill storage over one SQLite file per user namespace.
///
/// Exactly one instance should exist per process; all reads and writes for
/// a namespace go through it, with writes serialized by the writer actor.
pub struct SqliteBillStore {
    app_data_dir: PathBuf,
    active: Mutex<Option<ActiveNamespace>>,
}

impl SqliteBillStore {
    pub fn new(app_data_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_data_dir: app_data_dir.into(),
            active: Mutex::new(None),
        }
    }

    fn active(&self) -> Result<ActiveNamespace> {
        self.active
            .lock()
            .map_err(|_| Error::Database(DatabaseError::Internal("Store lock poisoned".to_string())))?
            .clone()
            .ok_or_else(|| Error::Database(DatabaseError::NotInitialized))
    }

    fn take_active(&self) -> Result<Option<ActiveNamespace>> {
        Ok(self
            .active
            .lock()
            .map_err(|_| Error::Database(DatabaseError::Internal("Store lock poisoned".to_string())))?
            .take())
    }

    fn set_active(&self, namespace: ActiveNamespace) -> Result<()> {
        *self
            .active
            .lock()
            .map_err(|_| Error::Database(DatabaseError::Internal("Store lock poisoned".to_string())))? =
            Some(namespace);
        Ok(())
    }

    fn load_bill_rows(&self, rows: Vec<BillDB>) -> Result<Vec<Bill>> {
        rows.into_iter().map(BillDB::into_domain).collect()
    }
}

#[async_trait]
impl LocalBillStore for SqliteBillStore {
    async fn initialize(&self, user_id: &str) -> Result<()> {
        let db_path = init(&self.app_data_dir, user_id)?;
        run_migrations(&db_path)?;
        let pool = create_pool(&db_path)?;
        let writer = spawn_writer(pool.as_ref().clone());
        debug!("[Storage] Bound bill store to user namespace {user_id}");
        self.set_active(ActiveNamespace {
            user_id: user_id.to_string(),
            pool,
            writer,
        })
    }

    async fn get_all(&self) -> Result<Vec<Bill>> {
        let ns = self.active()?;
        let mut conn = get_connection(&ns.pool)?;
        let rows = bills::table
            .load::<BillDB>(&mut conn)
            .map_err(StorageError::from)?;
        self.load_bill_rows(rows)
    }

    async fn get_dirty(&self) -> Result<Vec<Bill>> {
        let ns = self.active()?;
        let mut conn = get_connection(&ns.pool)?;
        let clean = enum_to_db(&SyncStatus::Clean)?;
        let rows = bills::table
            .filter(bills::sync_status.ne(clean))
            .load::<BillDB>(&mut conn)
            .map_err(StorageError::from)?;
        self.load_bill_rows(rows)
    }

    async fn get(&self, bill_id: &str) -> Result<Option<Bill>> {
        let ns = self.active()?;
        let mut conn = get_connection(&ns.pool)?;
        let row = bills::table
            .find(bill_id)
            .first::<BillDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(BillDB::into_domain).transpose()
    }

    async fn insert(&self, bill: Bill) -> Result<()> {
        let ns = self.active()?;
        let row = BillDB::from_domain(&bill)?;
        ns.writer
            .exec(move |conn| {
                diesel::insert_into(bills::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn update(&self, bill: Bill) -> Result<()> {
        let ns = self.active()?;
        let row = BillDB::from_domain(&bill)?;
        let bill_id = bill.id.clone();
        ns.writer
            .exec(move |conn| {
                let affected = diesel::update(bills::table.find(&bill_id))
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if affected == 0 {
                    return Err(Error::Database(DatabaseError::NotFound(bill_id)));
                }
                Ok(())
            })
            .await
    }

    async fn delete(&self, bill_id: &str) -> Result<()> {
        let ns = self.active()?;
        let bill_id = bill_id.to_string();
        ns.writer
            .exec(move |conn| {
                diesel::delete(bills::table.find(&bill_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                // A removed row has no pending action left to retry.
                diesel::delete(sync_retry_queue::table.find(&bill_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        let ns = self.active()?;
        let mut conn = get_connection(&ns.pool)?;
        let row = sync_checkpoint::table
            .find(1)
            .first::<SyncCheckpointDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        let Some(value) = row.and_then(|r| r.last_sync_at) else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_rfc3339(&value)
            .map_err(|e| StorageError::CorruptRow(format!("last_sync_at: {e}")))?;
        Ok(Some(parsed.with_timezone(&Utc)))
    }

    async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<()> {
        let ns = self.active()?;
        ns.writer
            .exec(move |conn| {
                let now = Utc::now().to_rfc3339();
                let row = SyncCheckpointDB {
                    id: 1,
                    last_sync_at: Some(at.to_rfc3339()),
                    updated_at: now.clone(),
                };
                diesel::insert_into(sync_checkpoint::table)
                    .values(&row)
                    .on_conflict(sync_checkpoint::id)
                    .do_update()
                    .set((
                        sync_checkpoint::last_sync_at.eq(row.last_sync_at.clone()),
                        sync_checkpoint::updated_at.eq(now),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn get_retry_entry(&self, bill_id: &str) -> Result<Option<RetryQueueEntry>> {
        let ns = self.active()?;
        let mut conn = get_connection(&ns.pool)?;
        let row = sync_retry_queue::table
            .find(bill_id)
            .first::<RetryQueueEntryDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(RetryQueueEntryDB::into_domain).transpose()
    }

    async fn list_retry_queue(&self) -> Result<Vec<RetryQueueEntry>> {
        let ns = self.active()?;
        let mut conn = get_connection(&ns.pool)?;
        let rows = sync_retry_queue::table
            .load::<RetryQueueEntryDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(RetryQueueEntryDB::into_domain)
            .collect()
    }

    async fn record_retry_failure(
        &self,
        bill_id: &str,
        action: SyncAction,
        error: &str,
    ) -> Result<()> {
        let ns = self.active()?;
        let bill_id = bill_id.to_string();
        let error = error.to_string();
        ns.writer
            .exec(move |conn| {
                let existing = sync_retry_queue::table
                    .find(&bill_id)
                    .first::<RetryQueueEntryDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;
                let attempts = existing.map(|row| row.attempts).unwrap_or(0) + 1;
                let row = RetryQueueEntryDB {
                    bill_id: bill_id.clone(),
                    action: enum_to_db(&action)?,
                    attempts,
                    last_error: Some(error.clone()),
                    last_attempt_at: Utc::now().to_rfc3339(),
                };
                diesel::insert_into(sync_retry_queue::table)
                    .values(&row)
                    .on_conflict(sync_retry_queue::bill_id)
                    .do_update()
                    .set((
                        sync_retry_queue::action.eq(row.action.clone()),
                        sync_retry_queue::attempts.eq(row.attempts),
                        sync_retry_queue::last_error.eq(row.last_error.clone()),
                        sync_retry_queue::last_attempt_at.eq(row.last_attempt_at.clone()),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn clear_retry_entry(&self, bill_id: &str) -> Result<()> {
        let ns = self.active()?;
        let bill_id = bill_id.to_string();
        ns.writer
            .exec(move |conn| {
                diesel::delete(sync_retry_queue::table.find(&bill_id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn clear_user_data(&self) -> Result<()> {
        let Some(ns) = self.take_active()? else {
            return Ok(());
        };
        let user_dir = self.app_data_dir.join(&ns.user_id);
        drop(ns);
        fs::remove_dir_all(&user_dir).map_err(StorageError::from)?;
        debug!("[Storage] Removed user namespace at {}", user_dir.display());
        Ok(())
    }
}
