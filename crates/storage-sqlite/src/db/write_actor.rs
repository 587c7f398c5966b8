//! Single-writer actor serializing all database mutations.
//!
//! Every write runs inside an immediate transaction on one dedicated
//! thread. Mutations are atomic at the storage-engine level and serialized
//! with respect to each other, so a job's error rolls the whole transaction
//! back.

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use tokio::sync::{mpsc, oneshot};

use billfolio_core::errors::{DatabaseError, Error, Result};

use crate::errors::StorageError;

type WriteJob = Box<dyn FnOnce(&Pool<ConnectionManager<SqliteConnection>>) + Send + 'static>;

/// Transaction error carrier: either the job's own error or one raised by
/// diesel's transaction machinery.
enum TxError {
    Db(diesel::result::Error),
    App(Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Db(err)
    }
}

/// Cloneable handle submitting write jobs to the writer thread. The thread
/// exits once every handle has been dropped.
#[derive(Clone)]
pub struct WriteHandle {
    sender: mpsc::UnboundedSender<WriteJob>,
}

impl WriteHandle {
    /// Run `job` inside an immediate transaction on the writer thread,
    /// rolling back when the job returns an error.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel::<Result<T>>();
        let wrapped: WriteJob = Box::new(move |pool| {
            let outcome = pool
                .get()
                .map_err(|e| Error::from(StorageError::Pool(e.to_string())))
                .and_then(|mut conn| {
                    conn.immediate_transaction::<T, TxError, _>(|tx| {
                        job(tx).map_err(TxError::App)
                    })
                    .map_err(|err| match err {
                        TxError::App(err) => err,
                        TxError::Db(err) => StorageError::from(err).into(),
                    })
                });
            let _ = reply_tx.send(outcome);
        });

        self.sender.send(wrapped).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Writer thread is no longer running".to_string(),
            ))
        })?;
        reply_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Writer thread dropped the reply".to_string(),
            ))
        })?
    }
}

/// Spawn the writer thread for a pool.
pub fn spawn_writer(pool: Pool<ConnectionManager<SqliteConnection>>) -> WriteHandle {
    let (sender, mut receiver) = mpsc::unbounded_channel::<WriteJob>();
    std::thread::spawn(move || {
        while let Some(job) = receiver.blocking_recv() {
            job(&pool);
        }
    });
    WriteHandle { sender }
}
