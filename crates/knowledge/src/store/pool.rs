//! Bounded pool of SQLite connections.
//!
//! A semaphore caps the number of connections in use; idle connections are
//! kept for reuse. Connections are handed out as [`PooledConnection`]
//! guards, which put the connection back when dropped, including when the
//! holder unwinds.

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use topica_core::{AppError, AppResult};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a connection configured for shared use.
pub(crate) fn open_connection(path: &Path) -> AppResult<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| AppError::Store(format!("Failed to open SQLite store {:?}: {}", path, e)))?;

    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| AppError::Store(format!("Failed to set busy timeout: {}", e)))?;

    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
        .map_err(|e| AppError::Store(format!("Failed to enable WAL journal: {}", e)))?;

    Ok(conn)
}

#[derive(Debug)]
pub(crate) struct ConnectionPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl ConnectionPool {
    pub(crate) fn new(path: impl Into<PathBuf>, size: usize) -> AppResult<Self> {
        if size == 0 {
            return Err(AppError::Config(
                "Connection pool size must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            path: path.into(),
            idle: Mutex::new(Vec::with_capacity(size)),
            permits: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Wait for a free slot and hand out a guard for it.
    ///
    /// Only the permit and an idle connection are taken here. Opening a
    /// new connection blocks, so it is deferred to the first
    /// [`PooledConnection::connection_mut`] call.
    pub(crate) async fn acquire(self: &Arc<Self>) -> AppResult<PooledConnection> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| AppError::Store(format!("Connection pool closed: {}", e)))?;

        Ok(PooledConnection {
            conn: self.take_idle(),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    pub(crate) fn idle_count(&self) -> usize {
        match self.idle.lock() {
            Ok(idle) => idle.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn take_idle(&self) -> Option<Connection> {
        match self.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        }
    }

    fn give_back(&self, conn: Connection) {
        match self.idle.lock() {
            Ok(mut idle) => idle.push(conn),
            Err(poisoned) => poisoned.into_inner().push(conn),
        }
    }
}

/// A connection borrowed from the pool.
///
/// Fields drop in declaration order, so the connection is back in the idle
/// list before the permit is released.
pub(crate) struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// The pooled connection, opened on first use. Call from blocking code.
    pub(crate) fn connection_mut(&mut self) -> AppResult<&mut Connection> {
        if self.conn.is_none() {
            tracing::debug!("Opening new pooled connection to {:?}", self.pool.path);
            self.conn = Some(open_connection(&self.pool.path)?);
        }

        self.conn
            .as_mut()
            .ok_or_else(|| AppError::Store("Pooled connection unavailable".to_string()))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.give_back(conn);
        }
    }
}
