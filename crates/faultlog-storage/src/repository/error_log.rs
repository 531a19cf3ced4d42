//! Error log repository.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StorageError};
use crate::models::{ErrorRecord, STORED_TIME_FORMAT};

/// Repository for `error_log` operations.
pub struct ErrorLogRepo;

impl ErrorLogRepo {
    /// Insert a new record.
    pub fn insert(conn: &Connection, record: &ErrorRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO error_log (identifier, error_file, error_lnno, error_text, error_func, error_type, error_tbck, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.identifier,
                record.error_file,
                record.error_lnno,
                record.error_text,
                record.error_func,
                record.error_type,
                record.error_tbck,
                record.created_at.format(STORED_TIME_FORMAT).to_string(),
            ],
        )?;

        Ok(())
    }

    /// Get a record by identifier.
    pub fn get_by_id(conn: &Connection, identifier: &str) -> Result<Option<ErrorRecord>> {
        let mut stmt = conn.prepare(
            "SELECT identifier, error_file, error_lnno, error_text, error_func, error_type, error_tbck, created_at
             FROM error_log WHERE identifier = ?1",
        )?;

        let row = stmt
            .query_row([identifier], |row| {
                Ok(StoredRow {
                    identifier: row.get(0)?,
                    error_file: row.get(1)?,
                    error_lnno: row.get(2)?,
                    error_text: row.get(3)?,
                    error_func: row.get(4)?,
                    error_type: row.get(5)?,
                    error_tbck: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })
            .optional()?;

        row.map(StoredRow::into_record).transpose()
    }

    /// Count stored records.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM error_log", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Raw `error_log` row before timestamp decoding.
struct StoredRow {
    identifier: String,
    error_file: String,
    error_lnno: u32,
    error_text: String,
    error_func: String,
    error_type: String,
    error_tbck: String,
    created_at: String,
}

impl StoredRow {
    fn into_record(self) -> Result<ErrorRecord> {
        let created_at =
            parse_datetime(&self.created_at).ok_or_else(|| StorageError::Corrupt {
                identifier: self.identifier.clone(),
                reason: format!("unparseable created_at {:?}", self.created_at),
            })?;

        Ok(ErrorRecord {
            identifier: self.identifier,
            error_file: self.error_file,
            error_lnno: self.error_lnno,
            error_text: self.error_text,
            error_func: self.error_func,
            error_type: self.error_type,
            error_tbck: self.error_tbck,
            created_at,
        })
    }
}

/// Parse a timestamp written either by this crate or by the column default.
fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()
}
