//! High-level error store interface.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::emergency::EmergencyLog;
use crate::error::{Result, StorageError};
use crate::models::{ErrorRecord, ErrorSummary};
use crate::pool::ConnectionPool;
use crate::repository::ErrorLogRepo;
use crate::schema::run_migrations;

/// Default database file, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "errors.db";

/// Where a saved record ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    /// Committed to the `error_log` table.
    Stored,
    /// The write was rolled back and the record went to the emergency log.
    Fallback,
}

/// Durable store of captured errors.
///
/// Cheap to clone; clones share one connection, so a single store can be
/// constructed at startup and handed to every capture site.
#[derive(Clone)]
pub struct ErrorStore {
    pool: ConnectionPool,
    emergency: EmergencyLog,
}

impl ErrorStore {
    /// Open (or create) a store at a specific path.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening error store at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self {
            pool,
            emergency: EmergencyLog::default(),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self {
            pool,
            emergency: EmergencyLog::default(),
        })
    }

    /// Replace the emergency log used when a save fails.
    pub fn with_emergency_log(mut self, emergency: EmergencyLog) -> Self {
        self.emergency = emergency;
        self
    }

    /// The emergency log used when a save fails.
    pub fn emergency_log(&self) -> &EmergencyLog {
        &self.emergency
    }

    /// Ensure the schema exists. Idempotent.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.pool.get()?;
        run_migrations(&conn)
    }

    /// Insert a record in its own transaction, returning the raw failure.
    pub fn try_save(&self, record: &ErrorRecord) -> Result<()> {
        let mut conn = self.pool.get()?;

        // Dropping an uncommitted transaction rolls it back.
        let tx = conn.transaction()?;
        ErrorLogRepo::insert(&tx, record)?;
        tx.commit()?;

        Ok(())
    }

    /// Insert a record. Never fails: if the write does not commit, the record
    /// and its traceback are appended to the emergency log instead.
    pub fn save(&self, record: &ErrorRecord) -> Persisted {
        match self.try_save(record) {
            Ok(()) => {
                debug!("Stored error record {}", record.identifier);
                Persisted::Stored
            }
            Err(e) => {
                warn!(
                    "Failed to store error record {}, using emergency log {:?}: {}",
                    record.identifier,
                    self.emergency.path(),
                    e
                );
                self.emergency.append(&self.fallback_diagnostic(record, &e));
                Persisted::Fallback
            }
        }
    }

    /// Get a record by identifier.
    pub fn get(&self, identifier: &str) -> Result<Option<ErrorRecord>> {
        let conn = self.pool.get()?;
        ErrorLogRepo::get_by_id(&conn, identifier)
    }

    /// Get the printable summary of a stored record.
    pub fn summary(&self, identifier: &str) -> Result<Option<ErrorSummary>> {
        Ok(self.get(identifier)?.map(|record| record.summary()))
    }

    /// Count stored records.
    pub fn count(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        ErrorLogRepo::count(&conn)
    }

    fn fallback_diagnostic(&self, record: &ErrorRecord, cause: &StorageError) -> String {
        let mut text = format!(
            "Failed to store error record: {cause}\n\
             identifier: {}\n\
             error_file: {}\n\
             error_lnno: {}\n\
             error_text: {}\n\
             error_func: {}\n\
             error_type: {}\n\
             error_tbck: {}\n\
             created_at: {}\n",
            record.identifier,
            record.error_file,
            record.error_lnno,
            record.error_text,
            record.error_func,
            record.error_type,
            record.error_tbck,
            record.created_at,
        );

        // The traceback may already live in the emergency log itself.
        let tbck = Path::new(&record.error_tbck);
        if tbck != self.emergency.path() {
            if let Ok(trace) = std::fs::read_to_string(tbck) {
                text.push('\n');
                text.push_str(&trace);
            }
        }

        text
    }
}
