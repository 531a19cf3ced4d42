//! Faultlog Storage - SQLite persistence for captured errors.
//!
//! This crate owns everything that touches disk on behalf of a capture:
//!
//! - The `error_log` table, one row per captured failure
//! - Transaction-scoped saves that never fail the caller
//! - The emergency log that receives records the database rejected
//! - The delimited block format shared by traceback dumps and the emergency log
//!
//! # Example
//!
//! ```no_run
//! use faultlog_storage::{ErrorRecord, ErrorStore, NewErrorRecord};
//!
//! let store = ErrorStore::open("errors.db").unwrap();
//!
//! let record = ErrorRecord::new(NewErrorRecord {
//!     error_file: "src/main.rs".to_string(),
//!     error_lnno: 10,
//!     error_text: "attempt to divide by zero".to_string(),
//!     error_func: "divide".to_string(),
//!     error_type: "DivisionByZero".to_string(),
//!     error_tbck: "logs/20240101120000-0d6f.log".to_string(),
//! });
//! store.save(&record);
//!
//! let summary = store.summary(&record.identifier).unwrap();
//! ```

pub mod block;
mod database;
pub mod emergency;
pub mod error;
pub mod models;
mod pool;
pub mod repository;
mod schema;

pub use block::delimited_block;
pub use database::{ErrorStore, Persisted, DEFAULT_DB_PATH};
pub use emergency::{EmergencyLog, DEFAULT_EMERGENCY_LOG};
pub use error::{Result, StorageError};
pub use models::{generate_identifier, ErrorRecord, ErrorSummary, NewErrorRecord};
pub use pool::ConnectionPool;
pub use schema::SCHEMA_VERSION;
