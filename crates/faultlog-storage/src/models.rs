//! Data models for storage.

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Timestamp layout used in summaries.
pub const SUMMARY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp layout persisted in `error_log.created_at`.
pub(crate) const STORED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One captured failure, as stored in the `error_log` table.
///
/// Records are created once, never updated and never deleted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Random v4 UUID, primary key.
    pub identifier: String,
    /// Source file the failure originated in.
    pub error_file: String,
    /// Line number of the origin.
    pub error_lnno: u32,
    /// Human-readable failure message.
    pub error_text: String,
    /// Enclosing function of the origin.
    pub error_func: String,
    /// Failure kind (panic class or error type name).
    pub error_type: String,
    /// Path of the traceback dump for this record.
    pub error_tbck: String,
    /// Local capture time, microsecond precision.
    pub created_at: NaiveDateTime,
}

/// Parameters for creating a new error record.
#[derive(Debug, Clone)]
pub struct NewErrorRecord {
    pub error_file: String,
    pub error_lnno: u32,
    pub error_text: String,
    pub error_func: String,
    pub error_type: String,
    pub error_tbck: String,
}

impl ErrorRecord {
    /// Build a record with a fresh identifier, stamped with the current local time.
    pub fn new(new: NewErrorRecord) -> Self {
        Self {
            identifier: generate_identifier(),
            error_file: new.error_file,
            error_lnno: new.error_lnno,
            error_text: new.error_text,
            error_func: new.error_func,
            error_type: new.error_type,
            error_tbck: new.error_tbck,
            created_at: now_micros(),
        }
    }

    /// Printable view of the record.
    pub fn summary(&self) -> ErrorSummary {
        ErrorSummary {
            identifier: self.identifier.clone(),
            error_file: self.error_file.clone(),
            error_lnno: self.error_lnno,
            error_text: self.error_text.clone(),
            error_func: self.error_func.clone(),
            error_type: self.error_type.clone(),
            error_tbck: self.error_tbck.clone(),
            created_at: self.created_at.format(SUMMARY_TIME_FORMAT).to_string(),
        }
    }
}

/// Printable summary of an [`ErrorRecord`], returned to callers in place of
/// the failed operation's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub identifier: String,
    pub error_file: String,
    pub error_lnno: u32,
    pub error_text: String,
    pub error_func: String,
    pub error_type: String,
    pub error_tbck: String,
    /// Formatted as `YYYY-MM-DD HH:MM:SS`.
    pub created_at: String,
}

impl ErrorSummary {
    /// Field mapping of the summary, keyed by column name.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("identifier".into(), Value::from(self.identifier.as_str()));
        map.insert("error_file".into(), Value::from(self.error_file.as_str()));
        map.insert("error_lnno".into(), Value::from(self.error_lnno));
        map.insert("error_text".into(), Value::from(self.error_text.as_str()));
        map.insert("error_func".into(), Value::from(self.error_func.as_str()));
        map.insert("error_type".into(), Value::from(self.error_type.as_str()));
        map.insert("error_tbck".into(), Value::from(self.error_tbck.as_str()));
        map.insert("created_at".into(), Value::from(self.created_at.as_str()));
        map
    }
}

impl std::fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} in {} at {}:{}: {} [{}]",
            self.error_type,
            self.error_func,
            self.error_file,
            self.error_lnno,
            self.error_text,
            self.identifier
        )
    }
}

/// Generate a fresh unique identifier.
pub fn generate_identifier() -> String {
    Uuid::new_v4().to_string()
}

/// Current local time truncated to what the store persists.
fn now_micros() -> NaiveDateTime {
    let now = Local::now().naive_local();
    let micros = now.nanosecond() / 1_000 * 1_000;
    now.with_nanosecond(micros).unwrap_or(now)
}
