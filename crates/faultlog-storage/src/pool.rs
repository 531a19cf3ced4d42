//! Database connection pool.
//!
//! A single Mutex-protected connection. Every caller holds the lock for the
//! duration of one unit of work, which serializes writers across threads.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, StorageError};
use crate::schema::run_migrations;

/// Thread-safe database connection pool.
#[derive(Clone)]
pub struct ConnectionPool {
    conn: Arc<Mutex<Connection>>,
}

impl ConnectionPool {
    /// Create a new connection pool with a file-based database.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::setup_connection(&conn)?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new connection pool with an in-memory database.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::setup_connection(&conn)?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get a connection from the pool.
    pub fn get(&self) -> Result<PooledConnection<'_>> {
        let guard = self.conn.lock().map_err(|_| StorageError::Poisoned)?;

        Ok(PooledConnection { guard })
    }

    /// Setup connection pragmas.
    fn setup_connection(conn: &Connection) -> Result<()> {
        // WAL keeps readers from blocking the single writer
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;

        Ok(())
    }
}

/// A connection borrowed from the pool.
pub struct PooledConnection<'a> {
    guard: MutexGuard<'a, Connection>,
}

impl std::ops::Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl std::ops::DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
