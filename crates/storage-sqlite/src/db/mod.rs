//! Database initialization, pooling, and migrations.

pub mod write_actor;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use billfolio_core::errors::Result;

use crate::errors::StorageError;

pub use write_actor::{spawn_writer, WriteHandle};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

const DB_FILE_NAME: &str = "billfolio.db";

/// Resolve (and create) the per-user database path. One SQLite file per
/// user id keeps namespaces physically isolated, so switching users can
/// never leak records.
pub fn init(app_data_dir: &Path, user_id: &str) -> Result<PathBuf> {
    let dir = app_data_dir.join(user_id);
    fs::create_dir_all(&dir).map_err(StorageError::from)?;
    Ok(dir.join(DB_FILE_NAME))
}

pub fn run_migrations(db_path: &Path) -> Result<()> {
    let mut conn = SqliteConnection::establish(&db_path.to_string_lossy())
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    Ok(())
}

pub fn create_pool(db_path: &Path) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path.to_string_lossy());
    let pool = Pool::builder()
        .max_size(5)
        .build(manager)
        .map_err(|e| StorageError::Pool(e.to_string()))?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &Arc<DbPool>) -> Result<DbConnection> {
    pool.get()
        .map_err(|e| StorageError::Pool(e.to_string()).into())
}
